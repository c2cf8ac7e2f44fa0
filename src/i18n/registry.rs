//! Language registry: the fixed table of locales the site knows about.
//!
//! The shared instance is built once with `OnceLock` and is immutable for the
//! process lifetime. Tests and embedders can build their own with
//! [`LanguageRegistry::new`].

use std::sync::OnceLock;

/// A locale known to the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// ISO 639 code, possibly with a variant (e.g. "en", "zh-hant")
    pub code: &'static str,

    /// Name of the language in that language (e.g. "Français")
    pub native_name: &'static str,
}

/// Known locales plus the set of right-to-left codes.
///
/// The RTL set is independent of the table: it may list codes that have no
/// display name.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
    rtl: Vec<&'static str>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

/// Languages written right-to-left.
const RTL_CODES: [&str; 7] = ["ace", "ar", "fa", "he", "mzn", "ps", "ur"];

impl LanguageRegistry {
    /// Build a registry from an explicit table.
    pub fn new(languages: Vec<LanguageConfig>, rtl: Vec<&'static str>) -> Self {
        Self { languages, rtl }
    }

    /// Get the shared registry with the site's locale table.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry::new(default_languages(), RTL_CODES.to_vec()))
    }

    /// Get a language configuration by its code.
    ///
    /// # Arguments
    /// * `code` - The site language code (e.g., "en", "zh-hant")
    ///
    /// # Returns
    /// * `Some(&LanguageConfig)` if the code is in the table
    /// * `None` if the code is unknown
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Display name for a code, if the code is known.
    ///
    /// # Arguments
    /// * `code` - The site language code to look up
    ///
    /// # Returns
    /// The language's name written in that language, or `None` for an
    /// unknown code.
    pub fn display_name(&self, code: &str) -> Option<&'static str> {
        self.get_by_code(code).map(|lang| lang.native_name)
    }

    /// All known languages, in table order.
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }

    /// Whether `code` is written right-to-left. Unknown codes are left-to-right.
    pub fn is_rtl(&self, code: &str) -> bool {
        self.rtl.iter().any(|rtl| *rtl == code)
    }
}

fn lang(code: &'static str, native_name: &'static str) -> LanguageConfig {
    LanguageConfig { code, native_name }
}

/// The site's locale table, keyed by ISO 639 code.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        lang("am", "አማርኛ"),
        lang("ar", "العربية"),
        lang("be", "беларускі"),
        lang("be-tarask", "Taraškievica"),
        lang("bg", "български език"),
        lang("bn", "বাংলা"),
        lang("br", "Brezhoneg"),
        lang("ca", "Català"),
        lang("cs", "Česky"),
        lang("da", "Dansk"),
        lang("de", "Deutsch"),
        lang("el", "Ελληνικά"),
        lang("en", "English"),
        lang("eo", "Esperanto"),
        lang("es", "Español"),
        lang("eu", "Euskara"),
        lang("fa", "فارسی"),
        lang("fi", "Suomi"),
        lang("fo", "Føroyskt"),
        lang("fr", "Français"),
        lang("gl", "Galego"),
        lang("ha", "Hausa"),
        lang("he", "עברית"),
        lang("hi", "हिन्दी"),
        lang("hr", "Hrvatski"),
        lang("hu", "Magyar"),
        lang("hy", "հայերէն"),
        lang("ia", "Interlingua"),
        lang("id", "Bahasa Indonesia"),
        lang("ig", "Asụsụ Igbo"),
        lang("is", "Íslenska"),
        lang("it", "Italiano"),
        lang("ja", "日本語"),
        lang("kab", "Taqbaylit"),
        lang("kn", "ಕನ್ನಡ"),
        lang("ko", "한국어"),
        lang("lt", "Lietuvių"),
        lang("lv", "Latviešu"),
        lang("ms", "Bahasa Melayu"),
        lang("my", "မြန်မာစာ"),
        lang("nb", "Norsk Bokmål"),
        lang("nl", "Nederlands, Vlaams"),
        lang("pl", "Polski"),
        lang("pms", "Piemontèis"),
        lang("pt", "Português"),
        lang("pt-br", "Português Brasileiro"),
        lang("ro", "Română"),
        lang("ru", "Русский"),
        lang("sc", "Sardu"),
        lang("sk", "Slovenčina"),
        lang("sl", "Slovenščina"),
        lang("sq", "Shqip"),
        lang("sr", "Српски"),
        lang("sr-latn", "Srpski"),
        lang("sv", "Svenska"),
        lang("th", "ภาษาไทย"),
        lang("ti", "ትግርኛ"),
        lang("tr", "Türkçe"),
        lang("uk", "Українська"),
        lang("ur", "اُردُو\u{202c}"),
        lang("vi", "Tiếng Việt"),
        lang("yo", "Èdè Yorùbá"),
        lang("zh-hans", "简体中文"),
        lang("zh-hant", "正體中文"),
    ]
}
