//! Page startup: resolve the active configuration once and apply it.
//!
//! `Bootstrap::init` runs six steps in a fixed order. Each step checks for the
//! page parts it needs and a failing step is logged and skipped, so later
//! steps always get their turn.

use crate::config::Config;
use crate::dom::{MenuOption, Page};
use crate::i18n::{Direction, LanguageRegistry, LocaleResolver};
use crate::params::{QueryParams, LEVEL_PARAM};
use crate::storage::{KeyValueStore, ProgressStore};
use crate::MAX_LEVEL;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Class appended to the indicator of a solved level.
pub const LEVEL_DONE_CLASS: &str = "level_done";

/// Screens narrower than this get the zoomed-out viewport.
pub const MIN_SCREEN_WIDTH: u32 = 725;

/// Viewport directive for narrow screens.
pub const NARROW_VIEWPORT: &str = "width=725, initial-scale=.35, user-scalable=no";

/// Id of the indicator element for a level.
pub fn level_element_id(level: u32) -> String {
    format!("level{}", level)
}

/// Escape text for HTML. Ampersands go first so the entities produced by the
/// other replacements are not escaped again.
pub fn esc(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Page title: the product name, then `" : "` and the page title if any.
pub fn page_title(product_name: &str, title: &str) -> String {
    if title.is_empty() {
        esc(product_name)
    } else {
        format!("{} : {}", esc(product_name), esc(title))
    }
}

/// Deferred loader for analytics instrumentation.
pub trait AnalyticsLoader: Send + Sync {
    fn load(&self);
}

/// Validated settings for this page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveConfig {
    pub app_name: String,
    pub lang: String,
    pub languages: Vec<String>,
    pub direction: Direction,
    pub level: u32,
}

impl ActiveConfig {
    pub fn resolve(config: &Config, query: &QueryParams, registry: &LanguageRegistry) -> Self {
        let level = query.get_integer_param(LEVEL_PARAM, 1, i64::from(MAX_LEVEL));
        let locale = LocaleResolver::new(config.lang.clone(), config.languages.clone(), registry);

        Self {
            app_name: config.app_name.clone(),
            lang: config.lang.clone(),
            languages: config.languages.clone(),
            direction: locale.direction(),
            // Clamped to [1, MAX_LEVEL] above.
            level: u32::try_from(level).unwrap_or(1),
        }
    }
}

/// What `init` did, step by step.
#[derive(Debug, Default, Serialize)]
pub struct InitReport {
    pub title: Option<String>,
    pub direction: Option<Direction>,
    /// Number of menu options, `None` when the page has no language menu
    pub language_menu_options: Option<usize>,
    pub language_menu_hidden: bool,
    pub levels_done: Vec<u32>,
    pub viewport_adjusted: bool,
    pub analytics_scheduled: bool,
    pub failed_steps: Vec<&'static str>,
    #[serde(skip)]
    pub analytics_task: Option<JoinHandle<()>>,
}

/// Composes locale, parameters and progress into the page's startup.
pub struct Bootstrap<'a> {
    config: &'a Config,
    active: ActiveConfig,
    registry: &'a LanguageRegistry,
    store: &'a dyn KeyValueStore,
    analytics: Option<Arc<dyn AnalyticsLoader>>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        config: &'a Config,
        query: &QueryParams,
        registry: &'a LanguageRegistry,
        store: &'a dyn KeyValueStore,
    ) -> Self {
        let active = ActiveConfig::resolve(config, query, registry);
        debug!(
            "Resolved {} level {} in '{}' ({})",
            active.app_name, active.level, active.lang, active.direction
        );

        Self {
            config,
            active,
            registry,
            store,
            analytics: None,
        }
    }

    pub fn with_analytics(mut self, loader: Arc<dyn AnalyticsLoader>) -> Self {
        self.analytics = Some(loader);
        self
    }

    pub fn active(&self) -> &ActiveConfig {
        &self.active
    }

    fn locale(&self) -> LocaleResolver<'a> {
        LocaleResolver::new(
            self.active.lang.clone(),
            self.active.languages.clone(),
            self.registry,
        )
    }

    /// Run the startup steps against `page`.
    pub fn init(&self, page: &mut dyn Page, title: &str) -> InitReport {
        let mut report = InitReport::default();

        // Step 1: Title
        let full_title = page_title(&self.config.product_name, title);
        match page.set_title(&full_title) {
            Ok(()) => report.title = Some(full_title),
            Err(e) => {
                warn!("Failed to set page title: {}", e);
                report.failed_steps.push("title");
            }
        }

        // Step 2: Direction and language
        let direction = self.active.direction;
        match page.set_direction(direction) {
            Ok(()) => report.direction = Some(direction),
            Err(e) => {
                warn!("Failed to set page direction: {}", e);
                report.failed_steps.push("direction");
            }
        }
        if let Err(e) = page.set_language(&self.active.lang) {
            warn!("Failed to set page language: {}", e);
            report.failed_steps.push("language");
        }

        // Step 3: Language menu
        self.populate_language_menu(page, &mut report);

        // Step 4: Completed levels
        self.mark_completed_levels(page, &mut report);

        // Step 5: Viewport for small screens
        if page.screen_width() < MIN_SCREEN_WIDTH {
            match page.set_viewport(NARROW_VIEWPORT) {
                Ok(adjusted) => report.viewport_adjusted = adjusted,
                Err(e) => {
                    warn!("Failed to adjust viewport: {}", e);
                    report.failed_steps.push("viewport");
                }
            }
        }

        // Step 6: Analytics, deferred to the next tick
        self.schedule_analytics(&mut report);

        info!(
            "Initialized {} level {} ({} levels done)",
            self.active.app_name,
            self.active.level,
            report.levels_done.len()
        );
        report
    }

    fn populate_language_menu(&self, page: &mut dyn Page, report: &mut InitReport) {
        let Some(menu) = page.language_menu() else {
            debug!("No language menu on this page");
            return;
        };

        menu.clear();
        for entry in self.locale().display_list() {
            let selected = entry.code == self.active.lang;
            menu.add_option(MenuOption {
                label: entry.name,
                value: entry.code,
                selected,
            });
        }

        // A single choice is no choice.
        if menu.len() <= 1 {
            menu.hide();
            report.language_menu_hidden = true;
        }
        report.language_menu_options = Some(menu.len());
    }

    fn mark_completed_levels(&self, page: &mut dyn Page, report: &mut InitReport) {
        let progress = ProgressStore::new(self.store);
        for level in 1..=MAX_LEVEL {
            if !progress.is_level_complete(&self.active.app_name, level) {
                continue;
            }
            if let Some(indicator) = page.element_by_id(&level_element_id(level)) {
                indicator.add_class(LEVEL_DONE_CLASS);
                report.levels_done.push(level);
            }
        }
    }

    fn schedule_analytics(&self, report: &mut InitReport) {
        if self.config.is_static() {
            debug!("Static page, analytics disabled");
            return;
        }
        let Some(loader) = self.analytics.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, analytics not loaded");
            return;
        };

        report.analytics_task = Some(runtime.spawn(async move {
            tokio::task::yield_now().await;
            loader.load();
        }));
        report.analytics_scheduled = true;
    }
}
