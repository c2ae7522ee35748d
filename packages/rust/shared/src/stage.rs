//! The [`Stage`] contract shared by every pipeline step.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Item;

/// Explicit tag naming a stage in a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Revisions,
    Wikitext,
    Spotlight,
    Subjects,
    Categories,
    PageLinks,
    Sampler,
    Flatten,
    PageIds,
}

impl StageKind {
    /// Display name used in logs and retained step history.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revisions => "revisions",
            Self::Wikitext => "wikitext",
            Self::Spotlight => "spotlight",
            Self::Subjects => "subjects",
            Self::Categories => "categories",
            Self::PageLinks => "page_links",
            Self::Sampler => "sampler",
            Self::Flatten => "flatten",
            Self::PageIds => "page_ids",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transform step: maps an ordered collection of items to a new one.
///
/// Fetching stages consult their cache before any remote call and write every
/// newly fetched result back as soon as it is known. Failures for a single
/// identity are logged and the identity is dropped; `Err` is reserved for
/// conditions that make the whole run meaningless (e.g. an unwritable cache).
#[async_trait]
pub trait Stage: Send + Sync {
    /// Tag identifying this stage.
    fn kind(&self) -> StageKind;

    /// Transform `items` into this stage's output.
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>>;
}
