use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::config::Config;
use crate::crawler::Crawler;
use crate::dashboard::{Clock, DashboardBundle, DashboardCache};
use crate::driver::ChromeDriver;
use crate::product::ProductRecord;

pub struct AppState {
    pub config: Config,
    pub crawler: Crawler,
    pub dashboard: Mutex<DashboardCache>,
    pub clock: Box<dyn Clock>,
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Json<DashboardBundle> {
    let mut cache = state.dashboard.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Json(cache.get(state.clock.as_ref(), query.force_refresh))
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
    pub max_items: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub count: usize,
    pub products: Vec<ProductRecord>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (status, Json(ErrorResponse { error: error.to_string() }))
}

/// One crawl session per request, on a blocking thread: the Chrome driver
/// blocks while it waits on the page.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let keyword = payload.keyword.trim().to_string();
    if keyword.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "keyword must not be empty"));
    }
    let max_items = payload.max_items.unwrap_or(state.config.max_items);
    info!("Search requested: {:?} (max {})", keyword, max_items);

    let task_state = state.clone();
    let task_keyword = keyword.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut driver = ChromeDriver::launch(&task_state.config.chrome_options())
            .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e))?;
        tokio::runtime::Handle::current()
            .block_on(task_state.crawler.run(&mut driver, &task_keyword, max_items))
            .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e))
    })
    .await
    .map_err(|e| {
        error!("Crawl task panicked: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "crawl task failed")
    })?;

    let products = outcome.map_err(|(status, body)| {
        error!("Search {:?} failed: {}", keyword, body.error);
        (status, body)
    })?;

    Ok(Json(SearchResponse {
        keyword,
        count: products.len(),
        products,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlSettings;
    use crate::selectors::COUPANG;
    use chrono::{DateTime, TimeZone, Utc};

    struct StoppedClock;

    impl Clock for StoppedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap()
        }
    }

    fn state() -> Arc<AppState> {
        let config = Config::default();
        Arc::new(AppState {
            crawler: Crawler::new(COUPANG, CrawlSettings::from(&config)),
            config,
            dashboard: Mutex::new(DashboardCache::new()),
            clock: Box::new(StoppedClock),
        })
    }

    #[tokio::test]
    async fn test_dashboard_endpoint() {
        let Json(bundle) = get_dashboard(State(state()), Query(DashboardQuery { force_refresh: false })).await;
        assert_eq!(bundle.summary.date, "2026-01-05");
        assert_eq!(bundle.trend.seven_day.last().unwrap().date, "2026-01-05");
    }

    #[tokio::test]
    async fn test_search_rejects_blank_keyword() {
        let request = SearchRequest { keyword: "   ".to_string(), max_items: None };
        let (status, Json(body)) = search(State(state()), Json(request)).await.err().unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("keyword"));
    }
}
