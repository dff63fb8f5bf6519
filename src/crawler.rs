use std::cell::Cell;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::driver::{Driver, DriverError, WaitUntil};
use crate::extract::enumerate_candidates;
use crate::product::{assemble_products, ProductRecord};
use crate::readiness::{await_ready, RenderTimeout};
use crate::selectors::SiteProfile;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0)";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("could not load {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: DriverError,
    },
    #[error(transparent)]
    RenderTimeout(#[from] RenderTimeout),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Navigating,
    Settling,
    DetectingReadiness,
    Enumerating,
    Assembling,
    Completed,
    Failed,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Idle => "idle",
            CrawlState::Navigating => "navigating",
            CrawlState::Settling => "settling",
            CrawlState::DetectingReadiness => "detecting-readiness",
            CrawlState::Enumerating => "enumerating",
            CrawlState::Assembling => "assembling",
            CrawlState::Completed => "completed",
            CrawlState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Timing knobs for one crawl session.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub base_url: String,
    pub navigation_timeout: Duration,
    pub settle_timeout: Duration,
    pub ready_timeout: Duration,
    pub ready_budget: Duration,
    pub scroll_pause: Duration,
}

impl From<&Config> for CrawlSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            navigation_timeout: config.navigation_timeout,
            settle_timeout: config.settle_timeout,
            ready_timeout: config.ready_timeout,
            ready_budget: config.ready_budget,
            scroll_pause: config.scroll_pause,
        }
    }
}

/// Exclusive hold on a driver for one query. Closing happens on drop, so it
/// runs exactly once whichever way `run` exits.
struct Session<'d, D: Driver> {
    id: Uuid,
    driver: &'d mut D,
    state: Cell<CrawlState>,
}

impl<'d, D: Driver> Session<'d, D> {
    fn open(driver: &'d mut D) -> Self {
        Self { id: Uuid::new_v4(), driver, state: Cell::new(CrawlState::Idle) }
    }

    fn enter(&self, next: CrawlState) {
        debug!("[{}] {} -> {}", self.id, self.state.get(), next);
        self.state.set(next);
    }
}

impl<D: Driver> Drop for Session<'_, D> {
    fn drop(&mut self) {
        let state = self.state.get();
        if !matches!(state, CrawlState::Completed | CrawlState::Failed) {
            warn!("[{}] Session abandoned while {}", self.id, state);
        }
        self.driver.close();
        debug!("[{}] Session released", self.id);
    }
}

/// Drives one search-results page from URL to product records.
#[derive(Debug, Clone)]
pub struct Crawler {
    profile: SiteProfile,
    settings: CrawlSettings,
}

impl Crawler {
    pub fn new(profile: SiteProfile, settings: CrawlSettings) -> Self {
        Self { profile, settings }
    }

    pub fn search_url(&self, keyword: &str) -> String {
        self.profile.search_url(&self.settings.base_url, keyword)
    }

    /// Run a full session for `keyword` on `driver`, returning at most
    /// `max_items` records in page order.
    ///
    /// The driver is closed before this returns, on success and on failure.
    pub async fn run<D: Driver>(
        &self,
        driver: &mut D,
        keyword: &str,
        max_items: usize,
    ) -> Result<Vec<ProductRecord>, CrawlError> {
        let session = Session::open(driver);
        let url = self.search_url(keyword);
        info!("[{}] Searching {:?} via {}", session.id, keyword, url);

        session.enter(CrawlState::Navigating);
        let navigated = session.driver.navigate(&url, WaitUntil::DomContentLoaded, self.settings.navigation_timeout);
        if let Err(source) = navigated {
            session.enter(CrawlState::Failed);
            return Err(CrawlError::Navigation { url, source });
        }

        session.enter(CrawlState::Settling);
        self.settle(&session).await;

        session.enter(CrawlState::DetectingReadiness);
        if let Err(e) = await_ready(
            &*session.driver,
            &self.profile.readiness,
            self.settings.ready_timeout,
            self.settings.ready_budget,
        ) {
            session.enter(CrawlState::Failed);
            return Err(e.into());
        }

        session.enter(CrawlState::Enumerating);
        let products = {
            let driver = &*session.driver;
            let nodes = enumerate_candidates(driver, &self.profile.containers);
            debug!("[{}] {} candidate nodes", session.id, nodes.len());
            session.enter(CrawlState::Assembling);
            assemble_products(driver, &nodes, &self.profile, &self.settings.base_url, max_items)
        };
        session.enter(CrawlState::Completed);
        info!("[{}] Extracted {} products", session.id, products.len());
        Ok(products)
    }

    /// Let late content arrive. Nothing here can fail the session.
    async fn settle<D: Driver>(&self, session: &Session<'_, D>) {
        if let Err(e) = session.driver.wait_for_network_settle(self.settings.settle_timeout) {
            warn!("[{}] Page did not settle ({}), continuing", session.id, e);
        }
        // scroll down and back up so lazy-loaded listings get rendered
        if let Err(e) = session.driver.evaluate_script(SCROLL_TO_BOTTOM) {
            warn!("[{}] Scroll to bottom failed: {}", session.id, e);
        }
        sleep(self.settings.scroll_pause).await;
        if let Err(e) = session.driver.evaluate_script(SCROLL_TO_TOP) {
            warn!("[{}] Scroll to top failed: {}", session.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HtmlSnapshot;
    use crate::selectors::{COUPANG, NAME_UNAVAILABLE};
    use scraper::ElementRef;
    use std::panic::{self, AssertUnwindSafe};

    /// Snapshot that blows up as soon as listings are enumerated.
    struct CrashingPage(HtmlSnapshot);

    impl Driver for CrashingPage {
        type Node<'a> = ElementRef<'a>;

        fn navigate(&mut self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<(), DriverError> {
            self.0.navigate(url, wait_until, timeout)
        }

        fn wait_for_network_settle(&self, timeout: Duration) -> Result<(), DriverError> {
            self.0.wait_for_network_settle(timeout)
        }

        fn wait_for_selector_visible(&self, locator: &str, timeout: Duration) -> Result<(), DriverError> {
            self.0.wait_for_selector_visible(locator, timeout)
        }

        fn query_all(&self, _locator: &str) -> Vec<ElementRef<'_>> {
            panic!("renderer crashed");
        }

        fn query_first<'a>(&'a self, node: &ElementRef<'a>, locator: &str) -> Option<ElementRef<'a>> {
            self.0.query_first(node, locator)
        }

        fn text<'a>(&'a self, node: &ElementRef<'a>) -> String {
            self.0.text(node)
        }

        fn attribute<'a>(&'a self, node: &ElementRef<'a>, name: &str) -> Option<String> {
            self.0.attribute(node, name)
        }

        fn evaluate_script(&self, code: &str) -> Result<(), DriverError> {
            self.0.evaluate_script(code)
        }

        fn close(&mut self) {
            self.0.close();
        }
    }

    fn crawler() -> Crawler {
        Crawler::new(
            COUPANG,
            CrawlSettings {
                base_url: "https://www.coupang.com".to_string(),
                navigation_timeout: Duration::from_secs(45),
                settle_timeout: Duration::from_secs(1),
                ready_timeout: Duration::from_millis(50),
                ready_budget: Duration::from_millis(200),
                scroll_pause: Duration::ZERO,
            },
        )
    }

    fn second_strategy_page(count: usize) -> String {
        let items: String = (0..count)
            .map(|i| {
                format!(
                    r#"<li><a href="/vp/products/{i}"><div class="name">laptop {i}</div></a>
                         <span class="price-value">{i}00,000</span></li>"#
                )
            })
            .collect();
        format!(r#"<html><body><ul class="search-product-list">{}</ul></body></html>"#, items)
    }

    #[tokio::test]
    async fn test_laptop_scenario() {
        let mut page = HtmlSnapshot::parse(&second_strategy_page(23));
        let products = crawler().run(&mut page, "laptop", 10).await.unwrap();

        assert_eq!(products.len(), 10);
        for (i, product) in products.iter().enumerate() {
            assert_eq!(product.name, format!("laptop {}", i));
            assert_eq!(product.price, format!("{}00,000", i));
            assert_eq!(product.link, format!("https://www.coupang.com/vp/products/{}", i));
            for field in [&product.rating, &product.rating_count, &product.image] {
                assert!(!field.is_empty());
            }
        }
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn test_navigates_to_encoded_search_url_and_scrolls() {
        let mut page = HtmlSnapshot::parse(&second_strategy_page(1));
        crawler().run(&mut page, "usb c 허브", 10).await.unwrap();

        assert_eq!(
            page.navigations(),
            ["https://www.coupang.com/np/search?q=usb%20c%20%ED%97%88%EB%B8%8C&channel=user"]
        );
        assert_eq!(page.scripts(), vec![SCROLL_TO_BOTTOM, SCROLL_TO_TOP]);
    }

    #[tokio::test]
    async fn test_no_container_ever_visible() {
        let mut page = HtmlSnapshot::parse("<html><body><div>Access denied</div></body></html>");
        let err = crawler().run(&mut page, "laptop", 10).await.unwrap_err();

        match err {
            CrawlError::RenderTimeout(timeout) => {
                assert!(!timeout.tried.is_empty());
                assert!(matches!(timeout.last_cause, DriverError::Timeout { .. }));
            }
            other => panic!("expected render timeout, got {other}"),
        }
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_releases_session() {
        let mut page = HtmlSnapshot::parse(&second_strategy_page(3)).unreachable();
        let err = crawler().run(&mut page, "laptop", 10).await.unwrap_err();

        assert!(matches!(err, CrawlError::Navigation { .. }));
        assert!(page.scripts().is_empty());
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn test_ready_but_nothing_enumerable_is_empty_result() {
        // readiness is satisfied by a marker the enumerator never looks for
        const READY_ONLY: SiteProfile = SiteProfile {
            readiness: crate::selectors::LocatorChain::new(&["div.results"]),
            ..COUPANG
        };
        let mut page = HtmlSnapshot::parse(r#"<div class="results"></div>"#);
        let crawler = Crawler::new(READY_ONLY, crawler().settings);
        let products = crawler.run(&mut page, "nothing", 10).await.unwrap();

        assert!(products.is_empty());
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_listing_is_kept() {
        let mut page = HtmlSnapshot::parse(
            r#"<ul><li class="search-product"><strong class="price-value">9,900</strong></li></ul>"#,
        );
        let products = crawler().run(&mut page, "x", 5).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, NAME_UNAVAILABLE);
        assert_eq!(products[0].price, "9,900");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(CrawlState::DetectingReadiness.to_string(), "detecting-readiness");
        assert_eq!(CrawlState::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn test_unsettled_page_still_extracts() {
        let mut page = HtmlSnapshot::parse(&second_strategy_page(4)).unsettled();
        let products = crawler().run(&mut page, "laptop", 10).await.unwrap();

        assert_eq!(products.len(), 4);
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_scroll_scripts_still_extract() {
        let mut page = HtmlSnapshot::parse(&second_strategy_page(4)).unsettled().failing_scripts();
        let products = crawler().run(&mut page, "laptop", 10).await.unwrap();

        assert_eq!(products.len(), 4);
        assert_eq!(page.scripts(), vec![SCROLL_TO_BOTTOM, SCROLL_TO_TOP]);
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_blocked_page_times_out_within_budget() {
        let settings = CrawlSettings {
            ready_timeout: Duration::from_millis(150),
            ready_budget: Duration::from_millis(250),
            ..crawler().settings
        };
        let mut page = HtmlSnapshot::parse("<html><body></body></html>").slow_waits().failing_scripts();
        let err = Crawler::new(COUPANG, settings).run(&mut page, "laptop", 10).await.unwrap_err();

        match err {
            CrawlError::RenderTimeout(timeout) => {
                assert_eq!(timeout.tried, vec!["li.search-product", "ul.search-product-list > li"]);
            }
            other => panic!("expected render timeout, got {other}"),
        }
        assert_eq!(page.close_count(), 1);
    }

    #[test]
    fn test_panic_mid_session_still_releases() {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
        let crawler = crawler();
        let mut page = CrashingPage(HtmlSnapshot::parse(&second_strategy_page(3)));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            runtime.block_on(crawler.run(&mut page, "laptop", 10))
        }));

        assert!(outcome.is_err());
        assert_eq!(page.0.close_count(), 1);
    }
}
