#![forbid(unsafe_code)]

//! Dictionary loading and language-change reaction.
//!
//! [`TranslatorHost`] owns the installed [`Translation`] (inside an
//! [`AtomicState`], so dictionary replacement notifies subscribers like
//! any other value change) and knows how to re-resolve it when the
//! active language changes.
//!
//! Loading is split in two so the host never blocks on I/O and never
//! owns a task system: [`begin_reload`](TranslatorHost::begin_reload)
//! picks the loader for the current language and hands back a
//! [`PendingLoad`]; the binding layer runs it wherever it likes and
//! reports the outcome through [`finish`](TranslatorHost::finish).
//! Every `begin_reload` advances a generation counter, and `finish`
//! discards results carrying an older token, so an in-flight load for a
//! language the user has already left can never overwrite the newer
//! dictionary.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use lumo_state::AtomicState;
use tracing::{debug, error};

use crate::lang::{LanguageHandle, lang_variations};
use crate::translation::Translation;
use crate::translator::{RandomSource, SplitMix, Translator};

/// Produces a [`Translation`] for one loader key.
///
/// Implementations may do I/O; they run wherever the binding layer
/// executes a [`PendingLoad`], not inside the host.
pub trait TranslationLoader {
    /// Load the dictionary.
    fn load(&self) -> Result<Translation, LoadError>;
}

impl<F> TranslationLoader for F
where
    F: Fn() -> Result<Translation, LoadError>,
{
    fn load(&self) -> Result<Translation, LoadError> {
        self()
    }
}

/// Loader reading a JSON dictionary file.
#[derive(Debug)]
pub struct JsonFileLoader {
    path: PathBuf,
}

impl JsonFileLoader {
    /// Loader for the dictionary at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TranslationLoader for JsonFileLoader {
    fn load(&self) -> Result<Translation, LoadError> {
        let text = std::fs::read_to_string(&self.path).map_err(LoadError::Io)?;
        serde_json::from_str(&text).map_err(LoadError::Parse)
    }
}

/// What a reload round decided.
#[derive(Debug)]
pub enum ReloadPlan {
    /// No loader covers the current language; the default dictionary was
    /// installed synchronously.
    Defaulted,
    /// A loader matched. Run it and report through
    /// [`TranslatorHost::finish`].
    Pending(PendingLoad),
}

/// A matched loader plus the generation token guarding its result.
pub struct PendingLoad {
    key: String,
    token: u64,
    loader: Rc<dyn TranslationLoader>,
}

impl PendingLoad {
    /// The loader key that matched the language variation sequence.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run the loader.
    pub fn load(&self) -> Result<Translation, LoadError> {
        self.loader.load()
    }
}

impl std::fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLoad")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Owns the installed dictionary and its reload lifecycle.
pub struct TranslatorHost {
    language: LanguageHandle,
    default_translation: Translation,
    loaders: Vec<(String, Rc<dyn TranslationLoader>)>,
    translation: AtomicState<Translation>,
    generation: Cell<u64>,
    random: Rc<dyn RandomSource>,
}

impl TranslatorHost {
    /// Host starting with the default dictionary installed.
    ///
    /// The default stays active until a reload resolves; register
    /// loaders with [`with_loader`](Self::with_loader) and trigger the
    /// first resolution with [`reload`](Self::reload) (or
    /// `begin_reload`/`finish` when loads run elsewhere).
    #[must_use]
    pub fn new(language: LanguageHandle, default_translation: Translation) -> Self {
        let translation = AtomicState::new(default_translation.clone());
        Self {
            language,
            default_translation,
            loaders: Vec::new(),
            translation,
            generation: Cell::new(0),
            random: Rc::new(SplitMix::default()),
        }
    }

    /// Register a loader under a language key (`"fr"`, `"sgn-BE"`, …).
    ///
    /// Registration order breaks no ties: matching walks the language's
    /// variation sequence, so a more specific key always wins over a
    /// less specific one.
    #[must_use]
    pub fn with_loader(
        mut self,
        key: impl Into<String>,
        loader: impl TranslationLoader + 'static,
    ) -> Self {
        self.loaders.push((key.into(), Rc::new(loader)));
        self
    }

    /// Replace the random source used by derived [`Translator`]s.
    #[must_use]
    pub fn with_random(mut self, random: Rc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// The installed dictionary, as an observable atom. Binding layers
    /// subscribe here to re-render on dictionary replacement.
    #[must_use]
    pub fn translation(&self) -> &AtomicState<Translation> {
        &self.translation
    }

    /// The language state driving resolution.
    #[must_use]
    pub fn language(&self) -> &LanguageHandle {
        &self.language
    }

    /// Snapshot [`Translator`] over the installed dictionary.
    #[must_use]
    pub fn translator(&self) -> Translator {
        Translator::new(
            Rc::new(self.translation.get()),
            Rc::clone(&self.language),
            Rc::clone(&self.random),
        )
    }

    /// Start a reload round for the current language.
    ///
    /// Walks the variation sequence (most specific first) and returns a
    /// [`PendingLoad`] for the first variation a loader is registered
    /// under. With no match the default dictionary is installed
    /// immediately and no load is pending. Either way the generation
    /// advances, invalidating older in-flight loads.
    pub fn begin_reload(&self) -> ReloadPlan {
        let token = self.generation.get() + 1;
        self.generation.set(token);

        let lang = self.language.get();
        for variation in lang_variations(&lang) {
            if let Some((key, loader)) = self
                .loaders
                .iter()
                .find(|(key, _)| *key == variation)
            {
                debug!(target: "lumo.i18n", %lang, %key, "translation load pending");
                return ReloadPlan::Pending(PendingLoad {
                    key: key.clone(),
                    token,
                    loader: Rc::clone(loader),
                });
            }
        }

        debug!(target: "lumo.i18n", %lang, "no loader matches, default dictionary installed");
        self.translation.set(self.default_translation.clone());
        ReloadPlan::Defaulted
    }

    /// Complete a reload round.
    ///
    /// Stale tokens (a newer `begin_reload` has run since) are discarded.
    /// A current `Ok` installs the loaded dictionary; a current `Err`
    /// logs and installs the default dictionary.
    pub fn finish(&self, pending: PendingLoad, result: Result<Translation, LoadError>) {
        if pending.token != self.generation.get() {
            debug!(
                target: "lumo.i18n",
                key = %pending.key,
                "stale translation load discarded"
            );
            return;
        }
        match result {
            Ok(translation) => self.translation.set(translation),
            Err(err) => {
                error!(
                    target: "lumo.i18n",
                    key = %pending.key,
                    error = %err,
                    "unable to load translation, falling back to default"
                );
                self.translation.set(self.default_translation.clone());
            }
        }
    }

    /// Resolve the current language in one synchronous step.
    pub fn reload(&self) {
        if let ReloadPlan::Pending(pending) = self.begin_reload() {
            let result = pending.load();
            self.finish(pending, result);
        }
    }
}

impl std::fmt::Debug for TranslatorHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorHost")
            .field("lang", &self.language.get())
            .field("loaders", &self.loaders.len())
            .field("generation", &self.generation.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a translation loader can produce.
#[derive(Debug)]
pub enum LoadError {
    /// I/O failure reading a dictionary source.
    Io(std::io::Error),
    /// The source was readable but not a valid dictionary.
    Parse(serde_json::Error),
    /// Loader-specific failure.
    Failed(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "translation I/O error: {err}"),
            Self::Parse(err) => write!(f, "translation parse error: {err}"),
            Self::Failed(reason) => write!(f, "translation load failed: {reason}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Failed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
