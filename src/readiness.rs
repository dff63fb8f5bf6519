use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::driver::{Driver, DriverError};
use crate::selectors::LocatorChain;

/// None of the container locators became visible in time.
#[derive(Debug, Error)]
#[error("no result container became visible (tried {tried:?})")]
pub struct RenderTimeout {
    pub tried: Vec<String>,
    #[source]
    pub last_cause: DriverError,
}

/// Block until any locator in `candidates` is visible.
///
/// Locators are tried one at a time, in order, each for at most
/// `per_attempt`. The whole call never waits longer than `aggregate`: later
/// attempts get whatever budget is left, and once it is gone the remaining
/// locators are not tried.
pub fn await_ready<D: Driver>(
    driver: &D,
    candidates: &LocatorChain,
    per_attempt: Duration,
    aggregate: Duration,
) -> Result<(), RenderTimeout> {
    let started = Instant::now();
    let mut tried = Vec::new();
    let mut last_cause = None;

    for locator in candidates.iter() {
        let remaining = aggregate.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            debug!("Readiness budget of {:?} spent before trying {:?}", aggregate, locator);
            break;
        }
        let wait = per_attempt.min(remaining);
        tried.push(locator.to_string());

        match driver.wait_for_selector_visible(locator, wait) {
            Ok(()) => {
                info!("Results rendered ({:?} visible after {:?})", locator, started.elapsed());
                return Ok(());
            }
            Err(e) => {
                debug!("Readiness attempt {:?} failed: {}", locator, e);
                last_cause = Some(e);
            }
        }
    }

    Err(RenderTimeout {
        tried,
        last_cause: last_cause.unwrap_or_else(|| DriverError::timeout("result containers", aggregate)),
    })
}
