#![forbid(unsafe_code)]

//! Internationalization layer for Lumo.
//!
//! Built on one [`AtomicState`](lumo_state::AtomicState): the active
//! language lives in a persisted atom ([`LanguageState`]), and everything
//! else derives from it: multi-language extraction ([`MultiLang`]),
//! dictionary resolution with variation fallback ([`TranslatorHost`]),
//! and read-only translator views ([`Translator`]).
//!
//! # Role in Lumo
//! `lumo-i18n` isolates localization concerns so the UI layer only ever
//! subscribes to atoms and reads resolved strings. It owns no runtime:
//! dictionary loads are handed out as [`PendingLoad`] values the binding
//! layer executes, with generation tokens keeping late results from
//! clobbering newer ones.
//!
//! # How it fits in the system
//! Applications construct one [`LanguageState`] and one
//! [`TranslatorHost`] at the composition root and inject them; tests
//! build isolated instances with [`LanguageState::fixed`] and in-memory
//! stores.

pub mod lang;
pub mod resolver;
pub mod translation;
pub mod translator;

pub use lang::{
    EnvLocaleSource, LANGUAGE_STORAGE_ID, LanguageHandle, LanguageState, LocaleSource, MultiLang,
    lang_variations, normalize_lang,
};
pub use resolver::{
    JsonFileLoader, LoadError, PendingLoad, ReloadPlan, TranslationLoader, TranslatorHost,
};
pub use translation::{Translation, Variants};
pub use translator::{RandomSource, SplitMix, Translator};
