use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::util::Wait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Driver, DriverError, WaitUntil};

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/123.0.0.0 Safari/537.36",
    ]
});

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

// Runs before any page script.
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 4 });
    window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JS expression that evaluates to one element (or null/undefined).
#[derive(Debug, Clone)]
pub struct ElementPath(String);

impl ElementPath {
    fn root(locator: &str, index: usize) -> Self {
        ElementPath(format!("document.querySelectorAll({})[{}]", js_string(locator), index))
    }

    fn child(&self, locator: &str) -> Self {
        ElementPath(format!("({})?.querySelector({})", self.0, js_string(locator)))
    }
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Wraps an expression so a thrown exception (bad selector, detached node)
/// comes back as `null` instead of an error.
fn guarded(body: &str) -> String {
    format!("(() => {{ try {{ {} }} catch (e) {{ return null; }} }})()", body)
}

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub locale: String,
}

pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub fn launch(options: &ChromeOptions) -> Result<Self, DriverError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(DEFAULT_USER_AGENT);
        debug!("Using User-Agent: {}", user_agent);

        let lang_arg = format!("--lang={}", options.locale);
        let args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--window-position=0,0"),
            OsStr::new(&lang_arg),
        ];

        let browser = Browser::new(LaunchOptions {
            headless: options.headless,
            window_size: Some((1920, 1080)),
            args,
            ..Default::default()
        })
        .map_err(DriverError::browser)?;

        let tab = browser.new_tab().map_err(DriverError::browser)?;

        let accept_language = format!("{},{};q=0.9,en-US;q=0.8,en;q=0.7", options.locale, primary_language(&options.locale));
        tab.set_user_agent(user_agent, Some(&accept_language), None)
            .map_err(DriverError::browser)?;

        tab.enable_debugger().map_err(DriverError::browser)?;
        tab.call_method(headless_chrome::protocol::cdp::Page::AddScriptToEvaluateOnNewDocument {
            source: STEALTH_SCRIPT.to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .map_err(DriverError::browser)?;

        info!("Chrome session started (headless: {})", options.headless);
        Ok(Self { browser: Some(browser), tab })
    }

    fn live_tab(&self) -> Result<&Arc<Tab>, DriverError> {
        if self.browser.is_some() {
            Ok(&self.tab)
        } else {
            Err(DriverError::Closed)
        }
    }

    fn eval(&self, expression: &str) -> Result<Option<Value>, DriverError> {
        let tab = self.live_tab()?;
        let result = tab.evaluate(expression, false).map_err(DriverError::browser)?;
        Ok(result.value)
    }

    fn eval_bool(&self, expression: &str) -> bool {
        matches!(self.eval(expression), Ok(Some(Value::Bool(true))))
    }

    /// Poll `predicate` until it holds or `timeout` passes.
    fn poll(&self, what: &str, timeout: Duration, predicate: impl Fn() -> bool) -> Result<(), DriverError> {
        Wait::new(timeout, POLL_INTERVAL)
            .until(|| if predicate() { Some(()) } else { None })
            .map_err(|_| DriverError::timeout(what, timeout))
    }
}

fn primary_language(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

impl Driver for ChromeDriver {
    type Node<'a> = ElementPath;

    fn navigate(&mut self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<(), DriverError> {
        let tab = self.live_tab()?;
        tab.set_default_timeout(timeout);
        tab.navigate_to(url).map_err(DriverError::browser)?;
        match wait_until {
            WaitUntil::Load => {
                tab.wait_until_navigated().map_err(DriverError::browser)?;
            }
            WaitUntil::DomContentLoaded => {
                // a body element means the document has been parsed
                tab.wait_for_element_with_custom_timeout("body", timeout)
                    .map_err(|e| {
                        debug!("Body wait failed: {:#}", e);
                        DriverError::timeout(format!("navigation to {}", url), timeout)
                    })?;
            }
        }
        Ok(())
    }

    fn wait_for_network_settle(&self, timeout: Duration) -> Result<(), DriverError> {
        self.live_tab()?;
        self.poll("document.readyState == complete", timeout, || {
            self.eval_bool("document.readyState === 'complete'")
        })
    }

    fn wait_for_selector_visible(&self, locator: &str, timeout: Duration) -> Result<(), DriverError> {
        self.live_tab()?;
        let check = guarded(&format!(
            "const el = document.querySelector({}); \
             if (!el || el.getClientRects().length === 0) return false; \
             const style = window.getComputedStyle(el); \
             return style.visibility !== 'hidden' && style.display !== 'none';",
            js_string(locator)
        ));
        self.poll(&format!("selector {:?} to become visible", locator), timeout, || {
            self.eval_bool(&check)
        })
    }

    fn query_all(&self, locator: &str) -> Vec<ElementPath> {
        let count = guarded(&format!("return document.querySelectorAll({}).length;", js_string(locator)));
        let len = match self.eval(&count) {
            Ok(Some(value)) => value.as_u64().unwrap_or(0) as usize,
            Ok(None) => 0,
            Err(e) => {
                warn!("query_all({:?}) failed: {}", locator, e);
                0
            }
        };
        (0..len).map(|i| ElementPath::root(locator, i)).collect()
    }

    fn query_first<'a>(&'a self, node: &ElementPath, locator: &str) -> Option<ElementPath> {
        let child = node.child(locator);
        let exists = guarded(&format!("return !!({});", child.0));
        self.eval_bool(&exists).then_some(child)
    }

    fn text<'a>(&'a self, node: &ElementPath) -> String {
        let expr = guarded(&format!("return ({})?.innerText ?? '';", node.0));
        match self.eval(&expr) {
            Ok(Some(Value::String(text))) => text.trim().to_string(),
            _ => String::new(),
        }
    }

    fn attribute<'a>(&'a self, node: &ElementPath, name: &str) -> Option<String> {
        let expr = guarded(&format!("return ({})?.getAttribute({}) ?? null;", node.0, js_string(name)));
        match self.eval(&expr) {
            Ok(Some(Value::String(value))) => Some(value),
            _ => None,
        }
    }

    fn evaluate_script(&self, code: &str) -> Result<(), DriverError> {
        self.eval(code).map(|_| ())
    }

    fn close(&mut self) {
        if let Some(browser) = self.browser.take() {
            if let Err(e) = self.tab.close(true) {
                warn!("Closing tab failed: {:#}", e);
            }
            // dropping the browser kills the Chrome process
            drop(browser);
            info!("Chrome session closed");
        }
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        self.close();
    }
}
