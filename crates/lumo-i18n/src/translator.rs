#![forbid(unsafe_code)]

//! Read-only translator views over a dictionary.
//!
//! A [`Translator`] is a snapshot projection of one [`Translation`]: per
//! key it answers with the canonical text ([`text`](Translator::text)) or
//! a randomized, parameter-substituted text ([`format`](Translator::format)).
//! It also carries the two fixed members every consumer needs alongside
//! lookups: multi-language extraction and active-language access.
//!
//! Randomness is injected through [`RandomSource`] so tests pin the
//! variant choice.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::lang::{LanguageHandle, MultiLang};
use crate::translation::{Translation, Variants};

/// Uniform index picker for randomized variant selection.
pub trait RandomSource {
    /// An index in `0..bound`. `bound` is at least 1.
    fn pick(&self, bound: usize) -> usize;
}

/// Splitmix64-based [`RandomSource`].
///
/// Deterministic for a given seed, which keeps variant selection
/// reproducible when a fixed seed is supplied.
pub struct SplitMix {
    state: Cell<u64>,
}

impl SplitMix {
    /// Source with a caller-chosen seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: Cell::new(seed),
        }
    }
}

impl Default for SplitMix {
    fn default() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default();
        Self::new(u64::from(nanos))
    }
}

impl RandomSource for SplitMix {
    fn pick(&self, bound: usize) -> usize {
        let next = self.state.get().wrapping_add(0x9e37_79b9_7f4a_7c15);
        self.state.set(next);
        let mut z = next;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        (z % bound.max(1) as u64) as usize
    }
}

/// Read-only view over a translation dictionary.
#[derive(Clone)]
pub struct Translator {
    translation: Rc<Translation>,
    language: LanguageHandle,
    random: Rc<dyn RandomSource>,
}

impl Translator {
    /// View over `translation`, resolving language queries through
    /// `language` and variant picks through `random`.
    #[must_use]
    pub fn new(
        translation: Rc<Translation>,
        language: LanguageHandle,
        random: Rc<dyn RandomSource>,
    ) -> Self {
        Self {
            translation,
            language,
            random,
        }
    }

    /// The canonical text for `key`: the sole text, or the first of the
    /// alternatives. Unknown keys resolve to `""`.
    #[must_use]
    pub fn text(&self, key: &str) -> &str {
        match self.translation.get(key) {
            Some(variants) => variants.first(),
            None => {
                debug!(target: "lumo.i18n", %key, "translator key missing");
                ""
            }
        }
    }

    /// A randomized, parameterized text for `key`.
    ///
    /// Picks a uniformly-random alternative (single texts are returned
    /// as-is), then substitutes positional markers: for each argument in
    /// order, the first occurrence of `$1`, `$2`, … is replaced. Markers
    /// without a matching argument stay in place.
    #[must_use]
    pub fn format(&self, key: &str, args: &[&str]) -> String {
        let chosen = match self.translation.get(key) {
            Some(Variants::One(text)) => text.clone(),
            Some(Variants::Many(texts)) if !texts.is_empty() => {
                texts[self.random.pick(texts.len())].clone()
            }
            Some(Variants::Many(_)) => String::new(),
            None => {
                debug!(target: "lumo.i18n", %key, "translator key missing");
                return String::new();
            }
        };
        substitute(chosen, args)
    }

    /// Resolve a [`MultiLang`] against the active language.
    #[must_use]
    pub fn extract(&self, multilang: Option<&MultiLang>, override_lang: Option<&str>) -> String {
        self.language.extract(multilang, override_lang)
    }

    /// The active language code.
    #[must_use]
    pub fn lang(&self) -> String {
        self.language.get()
    }

    /// Change the active language.
    pub fn set_lang(&self, code: impl Into<String>) {
        self.language.set(code);
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("keys", &self.translation.len())
            .field("lang", &self.language.get())
            .finish()
    }
}

/// Sequential positional substitution of `$1`, `$2`, … markers.
fn substitute(text: String, args: &[&str]) -> String {
    let mut text = text;
    for (index, arg) in args.iter().enumerate() {
        let marker = format!("${}", index + 1);
        text = text.replacen(&marker, arg, 1);
    }
    text
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::LanguageState;

    /// Always picks the given index (clamped to the bound).
    struct FixedPick(usize);
    impl RandomSource for FixedPick {
        fn pick(&self, bound: usize) -> usize {
            self.0.min(bound - 1)
        }
    }

    fn translator(random: impl RandomSource + 'static) -> Translator {
        let dico: Translation = [
            ("title", Variants::from("Inbox")),
            ("greeting", Variants::from("Hi $1, you have $2 messages")),
            ("bye", Variants::from(["Bye $1!", "See you, $1!"])),
        ]
        .into_iter()
        .collect();
        Translator::new(
            Rc::new(dico),
            Rc::new(LanguageState::fixed("en")),
            Rc::new(random),
        )
    }

    #[test]
    fn text_returns_canonical_variant() {
        let tr = translator(FixedPick(1));
        assert_eq!(tr.text("title"), "Inbox");
        assert_eq!(tr.text("bye"), "Bye $1!");
        assert_eq!(tr.text("missing"), "");
    }

    #[test]
    fn format_substitutes_in_argument_order() {
        let tr = translator(FixedPick(0));
        assert_eq!(
            tr.format("greeting", &["Ann", "3"]),
            "Hi Ann, you have 3 messages"
        );
    }

    #[test]
    fn format_picks_the_random_variant() {
        let tr = translator(FixedPick(1));
        assert_eq!(tr.format("bye", &["Ann"]), "See you, Ann!");
    }

    #[test]
    fn format_leaves_unmatched_markers() {
        let tr = translator(FixedPick(0));
        assert_eq!(tr.format("greeting", &["Ann"]), "Hi Ann, you have $2 messages");
    }

    #[test]
    fn format_ignores_surplus_arguments() {
        let tr = translator(FixedPick(0));
        assert_eq!(tr.format("title", &["x", "y"]), "Inbox");
    }

    #[test]
    fn format_replaces_only_the_first_occurrence() {
        let dico: Translation = [("echo", Variants::from("$1 and $1"))].into_iter().collect();
        let tr = Translator::new(
            Rc::new(dico),
            Rc::new(LanguageState::fixed("en")),
            Rc::new(FixedPick(0)),
        );
        assert_eq!(tr.format("echo", &["once"]), "once and $1");
    }

    #[test]
    fn format_missing_key_is_empty() {
        let tr = translator(FixedPick(0));
        assert_eq!(tr.format("missing", &["x"]), "");
    }

    #[test]
    fn splitmix_is_deterministic_and_in_bounds() {
        let a = SplitMix::new(7);
        let b = SplitMix::new(7);
        for _ in 0..100 {
            let pick = a.pick(5);
            assert_eq!(pick, b.pick(5));
            assert!(pick < 5);
        }
    }

    #[test]
    fn splitmix_covers_all_indices() {
        let rng = SplitMix::new(1);
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[rng.pick(4)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn lang_accessors_delegate() {
        let tr = translator(FixedPick(0));
        assert_eq!(tr.lang(), "en");
        tr.set_lang("fr");
        assert_eq!(tr.lang(), "fr");
        assert_eq!(
            tr.extract(Some(&MultiLang::map([("en", "Hello"), ("fr", "Bonjour")])), None),
            "Bonjour"
        );
    }
}
