//! Headless page startup preview.
//!
//! Resolves a game page from the environment, runs startup against an
//! in-memory document, and prints what happened as JSON.
//!
//! Required environment variables:
//! - GAMES_APP_NAME
//!
//! Optional:
//! - GAMES_LANG, GAMES_LANGUAGES, GAMES_PAGE_URL, GAMES_PRODUCT_NAME
//! - GAMES_SCREEN_WIDTH (defaults to 1024)
//! - GAMES_STORAGE_FILE (JSON progress file, defaults to an empty store)
//! - GAMES_PAGE_TITLE (defaults to the app name)

use anyhow::{Context, Result};
use games_bootstrap::bootstrap::{level_element_id, AnalyticsLoader, Bootstrap};
use games_bootstrap::config::Config;
use games_bootstrap::dom::Document;
use games_bootstrap::i18n::LanguageRegistry;
use games_bootstrap::params::QueryParams;
use games_bootstrap::reporter::ErrorReporter;
use games_bootstrap::storage::{FileStore, KeyValueStore, MemoryStore};
use games_bootstrap::MAX_LEVEL;
use std::sync::Arc;
use tracing::info;

/// Stands in for the analytics tags, which a headless page does not load.
struct LogAnalytics;

impl AnalyticsLoader for LogAnalytics {
    fn load(&self) {
        info!("Analytics load requested");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("games_bootstrap=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    info!("Starting page {} ({})", config.app_name, config.page_url);

    let store: Box<dyn KeyValueStore> = match std::env::var("GAMES_STORAGE_FILE") {
        Ok(path) => Box::new(FileStore::new(path)),
        Err(_) => Box::new(MemoryStore::new()),
    };

    let mut page = Document::new(config.screen_width)
        .with_language_menu()
        .with_viewport("width=device-width, initial-scale=1");
    for level in 1..=MAX_LEVEL {
        page.add_element(&level_element_id(level));
    }

    let reporter = Arc::new(ErrorReporter::from_config(&config));
    if ErrorReporter::install(&config, reporter, &mut page).is_some() {
        info!("Error reporting enabled");
    }

    let query = QueryParams::from_url(&config.page_url);
    let bootstrap = Bootstrap::new(&config, &query, LanguageRegistry::get(), store.as_ref())
        .with_analytics(Arc::new(LogAnalytics));

    let title = std::env::var("GAMES_PAGE_TITLE").unwrap_or_else(|_| config.app_name.clone());
    let mut report = bootstrap.init(&mut page, &title);

    if let Some(task) = report.analytics_task.take() {
        task.await.context("Analytics task failed")?;
    }

    let output = serde_json::json!({
        "config": bootstrap.active(),
        "startup": report,
        "title": page.title(),
        "viewport": page.viewport(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize startup report")?
    );

    Ok(())
}
