use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use crate::driver::chrome::ChromeOptions;

/// Runtime settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub navigation_timeout: Duration,
    pub settle_timeout: Duration,
    /// How long each readiness locator gets.
    pub ready_timeout: Duration,
    /// Upper bound on the readiness check as a whole.
    pub ready_budget: Duration,
    pub scroll_pause: Duration,
    pub max_items: usize,
    pub headless: bool,
    pub locale: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://www.coupang.com".to_string(),
            navigation_timeout: Duration::from_secs(45),
            settle_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(20),
            ready_budget: Duration::from_secs(60),
            scroll_pause: Duration::from_millis(1500),
            max_items: 10,
            headless: true,
            locale: "ko-KR".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let millis = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .with_context(|| format!("{} must be a number of milliseconds, got {:?}", key, raw)),
                None => Ok(default),
            }
        };

        let base_url = lookup("CRAWLER_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let max_items = match lookup("CRAWLER_MAX_ITEMS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => bail!("CRAWLER_MAX_ITEMS must be a positive integer, got {:?}", raw),
            },
            None => defaults.max_items,
        };

        let headless = match lookup("CRAWLER_HEADLESS") {
            Some(raw) => !matches!(raw.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
            None => defaults.headless,
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", raw))?,
            None => defaults.port,
        };

        Ok(Self {
            base_url,
            navigation_timeout: millis("CRAWLER_NAV_TIMEOUT_MS", defaults.navigation_timeout)?,
            settle_timeout: millis("CRAWLER_SETTLE_TIMEOUT_MS", defaults.settle_timeout)?,
            ready_timeout: millis("CRAWLER_READY_TIMEOUT_MS", defaults.ready_timeout)?,
            ready_budget: millis("CRAWLER_READY_BUDGET_MS", defaults.ready_budget)?,
            scroll_pause: millis("CRAWLER_SCROLL_PAUSE_MS", defaults.scroll_pause)?,
            max_items,
            headless,
            locale: lookup("CRAWLER_LOCALE").unwrap_or(defaults.locale),
            port,
        })
    }

    pub fn chrome_options(&self) -> ChromeOptions {
        ChromeOptions {
            headless: self.headless,
            locale: self.locale.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.base_url, "https://www.coupang.com");
        assert_eq!(config.navigation_timeout, Duration::from_secs(45));
        assert_eq!(config.ready_timeout, Duration::from_secs(20));
        assert_eq!(config.max_items, 10);
        assert!(config.headless);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CRAWLER_BASE_URL", "http://localhost:8080/"),
            ("CRAWLER_SCROLL_PAUSE_MS", "0"),
            ("CRAWLER_MAX_ITEMS", "25"),
            ("CRAWLER_HEADLESS", "false"),
            ("PORT", "8081"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.scroll_pause, Duration::ZERO);
        assert_eq!(config.max_items, 25);
        assert!(!config.headless);
        assert_eq!(config.port, 8081);
    }

    #[test]
    fn test_bad_number_names_the_variable() {
        let err = load(&[("CRAWLER_NAV_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("CRAWLER_NAV_TIMEOUT_MS"));
    }

    #[test]
    fn test_zero_max_items_is_rejected() {
        let err = load(&[("CRAWLER_MAX_ITEMS", "0")]).unwrap_err();
        assert!(err.to_string().contains("CRAWLER_MAX_ITEMS"));
        assert!(load(&[("CRAWLER_MAX_ITEMS", "-3")]).is_err());
    }
}
