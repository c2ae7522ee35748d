//! Core domain types flowing through the extraction pipeline.

use serde::{Deserialize, Serialize};

/// Canonical namespace for DBpedia resources.
pub const RESOURCE_PREFIX: &str = "http://dbpedia.org/resource/";

/// Namespace prefix marking category titles.
pub const CATEGORY_PREFIX: &str = "Category:";

// ---------------------------------------------------------------------------
// Payload / Item
// ---------------------------------------------------------------------------

/// The value half of an [`Item`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Identity only (pipeline seeds, flattened ids).
    #[default]
    None,
    /// A single text value, e.g. raw or cleaned article text.
    Text(String),
    /// A list of values, e.g. linked entity URIs or sampled page ids.
    List(Vec<String>),
}

impl Payload {
    /// The text value, if this is a [`Payload::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The list values; empty for anything but [`Payload::List`].
    pub fn as_list(&self) -> &[String] {
        match self {
            Self::List(values) => values,
            _ => &[],
        }
    }
}

/// A keyed unit of work passed between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Identity of the item (page id, label, category title, ...).
    pub key: String,
    /// Associated value.
    pub payload: Payload,
}

impl Item {
    /// An item carrying identity only.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: Payload::None,
        }
    }

    pub fn text(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: Payload::Text(text.into()),
        }
    }

    pub fn list(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            payload: Payload::List(values),
        }
    }
}

/// Build identity-only items from a sequence of keys.
pub fn keys_to_items<I, S>(keys: I) -> Vec<Item>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter().map(Item::key).collect()
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A graph edge between two named vertices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Map a surface term or label into the canonical resource namespace.
pub fn to_resource_uri(term: &str) -> String {
    format!("{RESOURCE_PREFIX}{}", term.replace(' ', "_"))
}
