//! Active locale and its derived values.

use crate::i18n::LanguageRegistry;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Text direction of a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    /// Value for the document's `dir` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the language menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    /// Native display name, empty when the code is not in the registry
    pub name: String,
    pub code: String,
}

/// Resolves direction and display order for the locales a page offers.
///
/// The host page is trusted: the active code is not checked against the
/// registry.
#[derive(Debug, Clone)]
pub struct LocaleResolver<'a> {
    active: String,
    enabled: Vec<String>,
    registry: &'a LanguageRegistry,
}

impl<'a> LocaleResolver<'a> {
    pub fn new(
        active: impl Into<String>,
        enabled: Vec<String>,
        registry: &'a LanguageRegistry,
    ) -> Self {
        Self {
            active: active.into(),
            enabled,
            registry,
        }
    }

    /// The active locale code.
    pub fn active(&self) -> &str {
        &self.active
    }

    /// Locale codes offered on this page, in host order.
    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    /// Whether `code` is right-to-left.
    pub fn is_rtl(&self, code: &str) -> bool {
        self.registry.is_rtl(code)
    }

    /// Direction of the active locale.
    pub fn direction(&self) -> Direction {
        if self.is_rtl(&self.active) {
            Direction::Rtl
        } else {
            Direction::Ltr
        }
    }

    /// Map codes to display names and sort by name in codepoint order.
    ///
    /// Codes without a display name get an empty name and so sort first.
    /// Entries with equal names keep their input order.
    pub fn sorted_display_list<S: AsRef<str>>(&self, codes: &[S]) -> Vec<DisplayEntry> {
        let mut entries: Vec<DisplayEntry> = codes
            .iter()
            .map(|code| {
                let code = code.as_ref();
                let name = self.registry.display_name(code).unwrap_or_else(|| {
                    debug!("No display name for locale '{}'", code);
                    ""
                });
                DisplayEntry {
                    name: name.to_string(),
                    code: code.to_string(),
                }
            })
            .collect();

        // `str` ordering is byte-wise UTF-8, which matches codepoint order.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Sorted display list of the page's enabled locales.
    pub fn display_list(&self) -> Vec<DisplayEntry> {
        self.sorted_display_list(&self.enabled)
    }
}
