use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

/// Host page settings, supplied before any startup logic runs.
#[derive(Debug, Clone)]
pub struct Config {
    // Page
    pub app_name: String,
    pub page_url: String,
    pub product_name: String,

    // Locale
    pub lang: String,
    pub languages: Vec<String>,

    // Error reporting
    pub error_report_base_url: String,
    pub error_report_cooldown: Duration,

    // Preview
    pub screen_width: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let app_name = std::env::var("GAMES_APP_NAME").context("GAMES_APP_NAME not set")?;
        let lang = std::env::var("GAMES_LANG").unwrap_or_else(|_| "en".to_string());

        let languages = std::env::var("GAMES_LANGUAGES")
            .map(|v| parse_language_list(&v))
            .unwrap_or_default();
        let languages = if languages.is_empty() {
            vec![lang.clone()]
        } else {
            languages
        };

        let page_url = std::env::var("GAMES_PAGE_URL")
            .unwrap_or_else(|_| format!("http://localhost/{}", app_name));

        // file:// pages have no origin; they run in static mode and never report.
        let error_report_base_url = std::env::var("ERROR_REPORT_BASE_URL")
            .ok()
            .or_else(|| origin_of(&page_url))
            .unwrap_or_default();

        Ok(Self {
            app_name,
            page_url,
            product_name: std::env::var("GAMES_PRODUCT_NAME")
                .unwrap_or_else(|_| "Blockly Games".to_string()),

            lang,
            languages,

            error_report_base_url,
            error_report_cooldown: std::env::var("ERROR_REPORT_COOLDOWN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(10)),

            screen_width: std::env::var("GAMES_SCREEN_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
        })
    }

    /// Whether the site is served as raw HTML files rather than by the app
    /// server. Error reporting and analytics are disabled in that mode.
    pub fn is_static(&self) -> bool {
        Url::parse(&self.page_url)
            .map(|url| url.path().ends_with(".html"))
            .unwrap_or(false)
    }
}

/// Split a comma-separated list of locale codes, dropping blanks.
fn parse_language_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `scheme://host[:port]` of a URL. Credentials are not part of an origin,
/// and opaque origins (e.g. `file:`) have none.
fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}
