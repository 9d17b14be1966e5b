#![forbid(unsafe_code)]

//! Active-language state and multi-language text extraction.
//!
//! One [`LanguageState`] holds the application's active language code in
//! an [`AtomicState<String>`] with a durable binding, so the choice
//! survives restarts. The instance is owned by the application's root
//! composition and injected where needed; there is no hidden global, and
//! tests construct isolated copies freely.
//!
//! Seeding priority: previously persisted language → platform locale →
//! `"en"`. The winner is normalized to its primary subtag (substring
//! before the first `-`, lowercased). Later assignments are stored
//! verbatim: `"sgn-BE-FR"` stays fully qualified so loader matching can
//! prefer the most specific variation.

use std::rc::Rc;

use lumo_state::{
    AtomicState, DurableConfig, Persistence, StateOptions, StoreHandle, Subscription,
};

/// Durable-store identifier under which the active language persists.
pub const LANGUAGE_STORAGE_ID: &str = "Language";

/// Reduce a language code to its primary subtag: `"fr-CA"` → `"fr"`.
#[must_use]
pub fn normalize_lang(code: &str) -> String {
    code.split('-').next().unwrap_or_default().to_lowercase()
}

/// Expand a hyphen-delimited language code into its variations, most
/// specific first, by successively dropping the last segment.
///
/// `"sgn-BE-FR"` → `["sgn-BE-FR", "sgn-BE", "sgn"]`.
#[must_use]
pub fn lang_variations(lang: &str) -> Vec<String> {
    let mut parts: Vec<&str> = lang.split('-').collect();
    let mut variations = Vec::with_capacity(parts.len());
    while !parts.is_empty() {
        variations.push(parts.join("-"));
        parts.pop();
    }
    variations
}

// ---------------------------------------------------------------------------
// Platform locale
// ---------------------------------------------------------------------------

/// Best-effort source of the platform's current locale.
pub trait LocaleSource {
    /// The platform locale as a hyphenated tag (`"en-US"`), if one is
    /// configured.
    fn current(&self) -> Option<String>;
}

/// Locale detection from the POSIX environment.
///
/// Checks `LC_ALL`, `LC_MESSAGES`, then `LANG`, converting values like
/// `en_US.UTF-8` to `en-US`. `C` and `POSIX` count as unconfigured.
#[derive(Debug, Default)]
pub struct EnvLocaleSource;

impl LocaleSource for EnvLocaleSource {
    fn current(&self) -> Option<String> {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find_map(|value| env_locale_tag(&value))
    }
}

fn env_locale_tag(raw: &str) -> Option<String> {
    let tag = raw
        .split('.')
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-"))
}

// ---------------------------------------------------------------------------
// Multi-language values
// ---------------------------------------------------------------------------

/// A text that is either already resolved or still keyed by language.
///
/// The map variant preserves declaration order; the first-declared entry
/// is the fallback when the active language is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiLang {
    /// Already-resolved text, returned unchanged.
    Text(String),
    /// Ordered language → text entries.
    Map(Vec<(String, String)>),
}

impl MultiLang {
    /// Build the map variant from ordered `(language, text)` pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&str> for MultiLang {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for MultiLang {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

// ---------------------------------------------------------------------------
// Language state
// ---------------------------------------------------------------------------

/// The application's active language, persisted and observable.
pub struct LanguageState {
    atom: AtomicState<String>,
}

impl LanguageState {
    /// Construct and seed the language state.
    ///
    /// `store` is the durable store the language persists into; `locale`
    /// supplies the platform fallback used when nothing is persisted.
    #[must_use]
    pub fn new(store: StoreHandle, locale: &dyn LocaleSource) -> Self {
        let fallback = locale.current().unwrap_or_else(|| "en".to_owned());
        let atom = AtomicState::with_options(
            normalize_lang(&fallback),
            StateOptions::new().with_persistence(Persistence::Durable(
                DurableConfig::new(store, LANGUAGE_STORAGE_ID).with_validator(|code: &String| {
                    if code.is_empty() {
                        Err("empty language code".to_owned())
                    } else {
                        Ok(())
                    }
                }),
            )),
        );
        // Whichever candidate won the seeding (persisted, platform, or
        // the literal fallback) is normalized exactly once.
        let seed = normalize_lang(&atom.get());
        atom.set(seed);
        Self { atom }
    }

    /// Language state without persistence or platform detection, seeded
    /// directly. Intended for tests and embedded tooling.
    #[must_use]
    pub fn fixed(code: impl Into<String>) -> Self {
        Self {
            atom: AtomicState::new(code.into()),
        }
    }

    /// The active language code.
    #[must_use]
    pub fn get(&self) -> String {
        self.atom.get()
    }

    /// Change the active language. Stored verbatim.
    pub fn set(&self, code: impl Into<String>) {
        self.atom.set(code.into());
    }

    /// Observe language changes.
    pub fn subscribe(&self, callback: impl Fn(&String) + 'static) -> Subscription {
        self.atom.subscribe(callback)
    }

    /// The underlying atom, for binding layers that speak atoms directly.
    #[must_use]
    pub fn atom(&self) -> &AtomicState<String> {
        &self.atom
    }

    /// Resolve a [`MultiLang`] for the active language.
    ///
    /// Absent input resolves to `""`; already-resolved text passes
    /// through; a map resolves to the entry for `override_lang` (or the
    /// active language), falling back to the first-declared entry, then
    /// to `""` for an empty map.
    #[must_use]
    pub fn extract(&self, multilang: Option<&MultiLang>, override_lang: Option<&str>) -> String {
        match multilang {
            None => String::new(),
            Some(MultiLang::Text(text)) => text.clone(),
            Some(MultiLang::Map(entries)) => {
                let lang = match override_lang {
                    Some(lang) => lang.to_owned(),
                    None => self.get(),
                };
                entries
                    .iter()
                    .find(|(key, _)| *key == lang)
                    .or_else(|| entries.first())
                    .map(|(_, text)| text.clone())
                    .unwrap_or_default()
            }
        }
    }
}

impl std::fmt::Debug for LanguageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageState")
            .field("lang", &self.atom.get())
            .finish()
    }
}

/// Shared handle to a [`LanguageState`].
pub type LanguageHandle = Rc<LanguageState>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
