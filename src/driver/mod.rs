//! Browser-automation capabilities the extraction pipeline relies on.
//!
//! The pipeline only talks to a page through [`Driver`]. `chrome` drives a
//! real headless Chrome; `snapshot` answers the same calls from a parsed HTML
//! document and is what the tests run against.

pub mod chrome;
pub mod snapshot;

use std::time::Duration;
use thiserror::Error;

pub use chrome::ChromeDriver;
pub use snapshot::HtmlSnapshot;

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("browser error: {0}")]
    Browser(String),
    #[error("session already closed")]
    Closed,
}

impl DriverError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        DriverError::Timeout { what: what.into(), after }
    }

    pub fn browser(err: impl std::fmt::Display) -> Self {
        DriverError::Browser(format!("{:#}", err))
    }
}

/// One page's worth of automation. Every method may block; none of them are
/// called concurrently.
///
/// `Node<'a>` is an opaque handle into the current document. Handles borrow
/// the driver, so they cannot outlive the session that produced them.
pub trait Driver {
    type Node<'a>
    where
        Self: 'a;

    fn navigate(&mut self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<(), DriverError>;

    /// Best-effort wait for the page to stop loading.
    fn wait_for_network_settle(&self, timeout: Duration) -> Result<(), DriverError>;

    fn wait_for_selector_visible(&self, locator: &str, timeout: Duration) -> Result<(), DriverError>;

    /// All matches in document order. Unparseable locators match nothing.
    fn query_all(&self, locator: &str) -> Vec<Self::Node<'_>>;

    /// First descendant of `node` matching `locator`.
    fn query_first<'a>(&'a self, node: &Self::Node<'a>, locator: &str) -> Option<Self::Node<'a>>;

    fn text<'a>(&'a self, node: &Self::Node<'a>) -> String;

    fn attribute<'a>(&'a self, node: &Self::Node<'a>, name: &str) -> Option<String>;

    fn evaluate_script(&self, code: &str) -> Result<(), DriverError>;

    /// Release everything the session holds. Safe to call more than once.
    fn close(&mut self);
}
