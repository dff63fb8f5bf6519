use tracing::debug;

use crate::driver::Driver;
use crate::selectors::{ExtractMode, FieldSpec, LocatorChain};

/// Walk `spec`'s locators in order and return the first value found under
/// `node`, or `None` once the chain is exhausted.
///
/// In attribute mode an element that matches but carries none of the wanted
/// attributes does not stop the search; the next locator gets its turn.
pub fn first_match<'a, D: Driver>(driver: &'a D, node: &D::Node<'a>, spec: &FieldSpec) -> Option<String> {
    spec.locators.iter().find_map(|locator| {
        let target = driver.query_first(node, locator)?;
        match spec.mode {
            ExtractMode::Text => Some(driver.text(&target).trim().to_string()),
            ExtractMode::Attribute(names) => names
                .iter()
                .filter_map(|name| driver.attribute(&target, name))
                .find(|value| !value.is_empty()),
        }
    })
}

/// Like [`first_match`] but never comes back empty-handed: a missing field
/// resolves to the field's sentinel default.
pub fn extract_field<'a, D: Driver>(driver: &'a D, node: &D::Node<'a>, spec: &FieldSpec) -> String {
    first_match(driver, node, spec).unwrap_or_else(|| spec.default.to_string())
}

/// Result containers from the first strategy that matches anything.
///
/// An empty vec means the page genuinely listed nothing; rendering failures
/// are caught earlier by the readiness check.
pub fn enumerate_candidates<'a, D: Driver>(driver: &'a D, strategies: &LocatorChain) -> Vec<D::Node<'a>> {
    for locator in strategies.iter() {
        let nodes = driver.query_all(locator);
        if !nodes.is_empty() {
            debug!("Strategy {:?} matched {} candidates", locator, nodes.len());
            return nodes;
        }
        debug!("Strategy {:?} matched nothing", locator);
    }
    Vec::new()
}
