#![forbid(unsafe_code)]

//! Translation dictionaries.
//!
//! A [`Translation`] maps string keys to [`Variants`]: either one text or
//! an ordered list of interchangeable texts (the translator picks one at
//! random). Dictionaries are immutable once installed and replaced
//! wholesale when the active language changes.
//!
//! Dictionaries deserialize from plain JSON objects, so translation
//! files look like:
//!
//! ```json
//! {
//!     "title": "Inbox",
//!     "greeting": ["Hi $1!", "Hello $1!"]
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One translation entry: a single text or interchangeable alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variants {
    /// A single text.
    One(String),
    /// Ordered alternatives; the first is the canonical form.
    Many(Vec<String>),
}

impl Variants {
    /// The canonical text: the single text, or the first alternative.
    /// An empty alternative list resolves to `""`.
    #[must_use]
    pub fn first(&self) -> &str {
        match self {
            Self::One(text) => text,
            Self::Many(texts) => texts.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Number of alternatives (1 for a single text).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(texts) => texts.len(),
        }
    }

    /// Whether the entry holds no text at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Many(texts) if texts.is_empty())
    }
}

impl From<&str> for Variants {
    fn from(text: &str) -> Self {
        Self::One(text.to_owned())
    }
}

impl From<String> for Variants {
    fn from(text: String) -> Self {
        Self::One(text)
    }
}

impl From<Vec<String>> for Variants {
    fn from(texts: Vec<String>) -> Self {
        Self::Many(texts)
    }
}

impl<const N: usize> From<[&str; N]> for Variants {
    fn from(texts: [&str; N]) -> Self {
        Self::Many(texts.iter().map(|t| (*t).to_owned()).collect())
    }
}

/// A keyed dictionary of translation entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Translation {
    entries: HashMap<String, Variants>,
}

impl Translation {
    /// An empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Variants> {
        self.entries.get(key)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, variants: impl Into<Variants>) {
        self.entries.insert(key.into(), variants.into());
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the keys, in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Variants>> FromIterator<(K, V)> for Translation {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
