use axum::{
    routing::{get, post},
    Router,
};
use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use std::env;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use product_crawler::config::Config;
use product_crawler::crawler::{CrawlSettings, Crawler};
use product_crawler::dashboard::{DashboardCache, SystemClock};
use product_crawler::driver::HtmlSnapshot;
use product_crawler::selectors::COUPANG;
use product_crawler::{api, console};

const USAGE: &str = "usage: product-crawler [serve | replay <page.html> [keyword] [max-items]]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let crawler = Crawler::new(COUPANG, CrawlSettings::from(&config));

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => console::run(&config, &crawler).await,
        Some("serve") => serve(config, crawler).await,
        Some("replay") => replay(&config, &crawler, &args[1..]).await,
        Some(other) => bail!("unknown command {:?}\n{}", other, USAGE),
    }
}

async fn serve(config: Config, crawler: Crawler) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(api::AppState {
        config,
        crawler,
        dashboard: Mutex::new(DashboardCache::new()),
        clock: Box::new(SystemClock),
    });

    let app = Router::new()
        .route("/api/dashboard", get(api::get_dashboard))
        .route("/search", post(api::search))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run the extraction pipeline against a saved results page.
async fn replay(config: &Config, crawler: &Crawler, args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("replay needs a file\n{}", USAGE);
    };
    let keyword = args.get(1).map(String::as_str).unwrap_or("replay");
    let max_items = match args.get(2) {
        Some(raw) => raw.parse().with_context(|| format!("max-items must be a number, got {:?}", raw))?,
        None => config.max_items,
    };

    let html = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let mut page = HtmlSnapshot::parse(&html);
    let products = crawler.run(&mut page, keyword, max_items).await?;
    print!("{}", console::format_products(&products));
    Ok(())
}
