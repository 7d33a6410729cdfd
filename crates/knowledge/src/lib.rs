//! Product knowledge base for SupportDesk.
//!
//! A static document set shaped `category → (title → content)`, loaded once
//! at start-up from a JSON file and read-only thereafter. Lookups are plain
//! case-insensitive substring matches; there is no ranking.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Title of the placeholder article returned when nothing matches.
pub const NOT_FOUND_TITLE: &str = "No relevant information found";

/// Content of the placeholder article returned when nothing matches.
pub const NOT_FOUND_CONTENT: &str =
    "The knowledge base does not contain information directly answering your query.";

/// One knowledge-base article, as returned by [`DocumentStore::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Empty for the "not found" sentinel
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    pub title: String,
    pub content: String,
}

impl Article {
    /// The sentinel record standing in for "no matches".
    pub fn not_found() -> Self {
        Self {
            category: String::new(),
            title: NOT_FOUND_TITLE.into(),
            content: NOT_FOUND_CONTENT.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.category.is_empty() && self.title == NOT_FOUND_TITLE
    }
}

/// The static document set.
///
/// Categories and titles keep the order they were loaded in, so search
/// results come back in document insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentStore {
    categories: IndexMap<String, IndexMap<String, String>>,
}

impl DocumentStore {
    /// An empty store. Every search returns the sentinel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a store from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeError> {
        serde_json::from_str(json).map_err(|e| KnowledgeError::Parse {
            origin: "inline JSON".into(),
            reason: e.to_string(),
        })
    }

    /// Build a store from `(category, title, content)` triples, in order.
    pub fn from_entries<I, C, T, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (C, T, B)>,
        C: Into<String>,
        T: Into<String>,
        B: Into<String>,
    {
        let mut store = Self::new();
        for (category, title, content) in entries {
            store.insert(category, title, content);
        }
        store
    }

    /// Load a store from a JSON file.
    ///
    /// A missing file is not fatal: it is logged and an empty store is
    /// returned. A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        if !path.exists() {
            warn!(path = %path.display(), "Knowledge base file not found, starting with an empty store");
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let store: Self = serde_json::from_str(&content).map_err(|e| KnowledgeError::Parse {
            origin: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), articles = store.len(), "Knowledge base loaded");
        Ok(store)
    }

    fn insert(&mut self, category: impl Into<String>, title: impl Into<String>, content: impl Into<String>) {
        self.categories
            .entry(category.into())
            .or_default()
            .insert(title.into(), content.into());
    }

    /// Total number of articles across all categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(|articles| articles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Category names, in load order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(|s| s.as_str())
    }

    /// Every article whose title or content contains `query`, ignoring case.
    ///
    /// Never returns an empty vector: when nothing matches, the single
    /// [`Article::not_found`] sentinel is returned instead.
    pub fn search(&self, query: &str) -> Vec<Article> {
        let needle = query.to_lowercase();
        let matches: Vec<Article> = self
            .categories
            .iter()
            .flat_map(|(category, articles)| {
                articles.iter().map(move |(title, content)| (category, title, content))
            })
            .filter(|(_, title, content)| {
                title.to_lowercase().contains(&needle) || content.to_lowercase().contains(&needle)
            })
            .map(|(category, title, content)| Article {
                category: category.clone(),
                title: title.clone(),
                content: content.clone(),
            })
            .collect();

        if matches.is_empty() {
            vec![Article::not_found()]
        } else {
            matches
        }
    }
}

/// Knowledge base loading errors.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge base at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse knowledge base from {origin}: {reason}")]
    Parse { origin: String, reason: String },
}
