//! Driver over an already-rendered HTML document.
//!
//! There is no browser behind it: navigation is recorded and accepted, a
//! selector counts as "visible" as soon as it matches something, and text is
//! read straight from the parsed tree. Used to replay saved result pages and
//! as the deterministic double in tests. The builder switches below make it
//! misbehave the way a live page can.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{Driver, DriverError, WaitUntil};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

pub struct HtmlSnapshot {
    document: Html,
    navigations: Vec<String>,
    scripts: RefCell<Vec<String>>,
    close_count: Cell<usize>,
    fail_navigation: bool,
    fail_settle: bool,
    fail_scripts: bool,
    slow_waits: bool,
}

impl HtmlSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            navigations: Vec::new(),
            scripts: RefCell::new(Vec::new()),
            close_count: Cell::new(0),
            fail_navigation: false,
            fail_settle: false,
            fail_scripts: false,
            slow_waits: false,
        }
    }

    /// Make every `navigate` call fail, as an unreachable host would.
    pub fn unreachable(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// Never report the network as idle.
    pub fn unsettled(mut self) -> Self {
        self.fail_settle = true;
        self
    }

    /// Record scripts but report every one as failed.
    pub fn failing_scripts(mut self) -> Self {
        self.fail_scripts = true;
        self
    }

    /// Spend the whole timeout on a selector that never shows up, like a
    /// browser polling for it would.
    pub fn slow_waits(mut self) -> Self {
        self.slow_waits = true;
        self
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.borrow().clone()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.get()
    }

    fn selector(locator: &str) -> Option<Selector> {
        match Selector::parse(locator) {
            Ok(selector) => Some(selector),
            Err(e) => {
                debug!("Ignoring unparseable locator {:?}: {:?}", locator, e);
                None
            }
        }
    }
}

impl Driver for HtmlSnapshot {
    type Node<'a> = ElementRef<'a>;

    fn navigate(&mut self, url: &str, _wait_until: WaitUntil, timeout: Duration) -> Result<(), DriverError> {
        self.navigations.push(url.to_string());
        if self.fail_navigation {
            return Err(DriverError::timeout(format!("navigation to {}", url), timeout));
        }
        Ok(())
    }

    fn wait_for_network_settle(&self, timeout: Duration) -> Result<(), DriverError> {
        if self.fail_settle {
            return Err(DriverError::timeout("network idle", timeout));
        }
        Ok(())
    }

    fn wait_for_selector_visible(&self, locator: &str, timeout: Duration) -> Result<(), DriverError> {
        let matched = Self::selector(locator)
            .map(|selector| self.document.select(&selector).next().is_some())
            .unwrap_or(false);
        if matched {
            Ok(())
        } else {
            if self.slow_waits {
                std::thread::sleep(timeout);
            }
            Err(DriverError::timeout(format!("selector {:?}", locator), timeout))
        }
    }

    fn query_all(&self, locator: &str) -> Vec<ElementRef<'_>> {
        match Self::selector(locator) {
            Some(selector) => self.document.select(&selector).collect(),
            None => Vec::new(),
        }
    }

    fn query_first<'a>(&'a self, node: &ElementRef<'a>, locator: &str) -> Option<ElementRef<'a>> {
        let selector = Self::selector(locator)?;
        // descendants only, the way Element.querySelector behaves
        node.select(&selector).find(|found| found.id() != node.id())
    }

    fn text<'a>(&'a self, node: &ElementRef<'a>) -> String {
        let raw = node.text().collect::<String>();
        WHITESPACE.replace_all(&raw, " ").trim().to_string()
    }

    fn attribute<'a>(&'a self, node: &ElementRef<'a>, name: &str) -> Option<String> {
        node.value().attr(name).map(|s| s.to_string())
    }

    fn evaluate_script(&self, code: &str) -> Result<(), DriverError> {
        self.scripts.borrow_mut().push(code.to_string());
        if self.fail_scripts {
            return Err(DriverError::browser(format!("script rejected: {}", code)));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.close_count.set(self.close_count.get() + 1);
    }
}
