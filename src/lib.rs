//! Shared startup layer for mini-game pages.
//!
//! Turns the ambient page state (URL query, persisted progress, locale tables)
//! into a validated [`bootstrap::ActiveConfig`], applies it to the page, and
//! provides the two long-lived helpers every game uses: the rate-limited
//! [`reporter::ErrorReporter`] and the [`dom::bind_click`] input binder.

pub mod bootstrap;
pub mod config;
pub mod dom;
pub mod i18n;
pub mod math;
pub mod params;
pub mod reporter;
pub mod storage;

/// Maximum number of levels. Common to all games.
pub const MAX_LEVEL: u32 = 10;
