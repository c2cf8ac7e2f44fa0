//! Locale resolution for a page.
//!
//! # Architecture
//!
//! - `registry`: the fixed table of known locales and the right-to-left set
//! - `resolver`: the active locale, its direction, and the sorted menu list
//!
//! # Example
//!
//! ```rust,ignore
//! use games_bootstrap::i18n::{LanguageRegistry, LocaleResolver};
//!
//! let resolver = LocaleResolver::new("ar", vec!["en".into(), "ar".into()], LanguageRegistry::get());
//! assert_eq!(resolver.direction().as_str(), "rtl");
//! ```

mod registry;
mod resolver;

pub use registry::{LanguageConfig, LanguageRegistry};
pub use resolver::{Direction, DisplayEntry, LocaleResolver};
