//! Page parameters from the URL query string.
//!
//! Absence or garbage is never an error here: every accessor resolves to a
//! documented default so callers can use the value directly.

use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

/// Query parameter selecting the level.
pub const LEVEL_PARAM: &str = "level";

/// Query parameter selecting the language.
pub const LANG_PARAM: &str = "lang";

/// Read-only view over a location's query string (`?a=1&b=2`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    search: String,
}

impl QueryParams {
    /// Wrap a raw query string, including its leading `?` if any.
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
        }
    }

    /// Take the query part of a full URL. The fragment is not part of it.
    ///
    /// A URL that does not parse has no parameters.
    pub fn from_url(url: &str) -> Self {
        match Url::parse(url) {
            Ok(parsed) => Self::new(search_of(&parsed)),
            Err(e) => {
                debug!("Cannot parse page URL '{}' ({}), no parameters", url, e);
                Self::default()
            }
        }
    }

    /// The raw query string.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Extract a string parameter, or `default_value` if it is absent.
    ///
    /// `+` is read as a space before percent-decoding. A value that does not
    /// decode to UTF-8 is treated as absent.
    pub fn get_string_param(&self, name: &str, default_value: &str) -> String {
        let pattern = format!(r"[?&]{}=([^&]+)", regex::escape(name));
        let Ok(re) = Regex::new(&pattern) else {
            return default_value.to_string();
        };

        let Some(raw) = re.captures(&self.search).and_then(|c| c.get(1)) else {
            return default_value.to_string();
        };

        match urlencoding::decode(&raw.as_str().replace('+', "%20")) {
            Ok(value) => value.into_owned(),
            Err(e) => {
                debug!("Parameter '{}' is not valid UTF-8 ({}), using default", name, e);
                default_value.to_string()
            }
        }
    }

    /// Extract an integer parameter clamped to `[min_value, max_value]`.
    ///
    /// The value is parsed the way a browser's `Number()` would and then
    /// floored. Absent or unparseable values yield `min_value`.
    pub fn get_integer_param(&self, name: &str, min_value: i64, max_value: i64) -> i64 {
        let (lower, upper) = if max_value < min_value {
            (max_value, min_value)
        } else {
            (min_value, max_value)
        };

        let value = parse_js_number(&self.get_string_param(name, "NaN")).floor();
        if value.is_nan() {
            return min_value;
        }
        // Float clamp first so that infinities and huge values saturate cleanly.
        // Bounds beyond 2^53 round as f64, so clamp again as integers.
        (value.clamp(lower as f64, upper as f64) as i64).clamp(lower, upper)
    }
}

/// Rewrite a query string so that `lang` selects `new_lang`.
///
/// An existing `lang` value is replaced in place; otherwise the parameter is
/// prepended so the rest of the query keeps its order.
pub fn with_language(search: &str, new_lang: &str) -> String {
    let encoded = urlencoding::encode(new_lang);

    if search.len() <= 1 {
        return format!("?{}={}", LANG_PARAM, encoded);
    }

    let existing = Regex::new(&format!(r"([?&]{}=)[^&]*", LANG_PARAM));
    if let Ok(re) = existing {
        if re.is_match(search) {
            return re
                .replacen(search, 1, |caps: &Captures| format!("{}{}", &caps[1], encoded))
                .into_owned();
        }
    }

    search.replacen('?', &format!("?{}={}&", LANG_PARAM, encoded), 1)
}

/// Build the URL that reloads `page_url` in another language.
///
/// The fragment is dropped.
pub fn switch_language_url(page_url: &str, new_lang: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(page_url)?;
    url.set_fragment(None);

    let search = with_language(&search_of(&url), new_lang);
    url.set_query(search.strip_prefix('?'));
    Ok(url.into())
}

/// `location.search` of a parsed URL: `?` plus the query, or empty.
fn search_of(url: &Url) -> String {
    url.query().map(|q| format!("?{}", q)).unwrap_or_default()
}

/// Parse text with the rules of JavaScript's `Number()` conversion.
///
/// Returns NaN for anything that is not a number literal.
fn parse_js_number(text: &str) -> f64 {
    let s = text.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return f64::NAN;
            }
            return digits.chars().fold(0.0, |acc, c| {
                acc * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0))
            });
        }
    }

    // Rust also accepts "inf" and "nan" spellings, which Number() does not.
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }

    s.parse::<f64>().unwrap_or(f64::NAN)
}
