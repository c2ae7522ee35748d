//! Raw article revisions by page id.

use std::sync::Arc;

use async_trait::async_trait;
use qexp_shared::{Item, Result, Stage, StageKind};
use qexp_storage::Cache;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use super::client::{self, MediaWikiClient};
use crate::Politeness;

/// Page ids requested per API call.
const CHUNK_SIZE: usize = 5;

/// Fetches the current wikitext of each input page id.
pub struct RevisionFetcher {
    client: MediaWikiClient,
    cache: Arc<dyn Cache>,
}

impl RevisionFetcher {
    pub fn new(endpoint: &str, cache: Arc<dyn Cache>) -> Result<Self> {
        let client = MediaWikiClient::new(
            endpoint,
            &[
                ("action", "query"),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("rvslots", "*"),
            ],
        )?;
        Ok(Self { client, cache })
    }

    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.client = self.client.with_politeness(politeness);
        self
    }

    /// Fetch one chunk, caching and collecting every page as it arrives.
    /// A failed request ends the chunk; pages already collected are kept.
    async fn fetch_chunk(&self, ids: &[String], out: &mut Vec<Item>) -> Result<()> {
        let mut cursor = self.client.query(vec![("pageids", ids.join("|"))], false);
        loop {
            let query = match cursor.next_page().await {
                Ok(Some(query)) => query,
                Ok(None) => return Ok(()),
                Err(e) => {
                    error!(?ids, error = %e, "revision request failed, dropping chunk");
                    return Ok(());
                }
            };

            for page in client::pages(&query) {
                if client::is_missing(page) {
                    warn!(page = ?page.get("pageid"), "page missing");
                    continue;
                }
                let Some(id) = client::page_id(page) else {
                    warn!("page without id in response");
                    continue;
                };
                let Some(content) = revision_content(page) else {
                    warn!(%id, "page without revision content");
                    continue;
                };
                self.cache.set(&id, content)?;
                out.push(Item::text(id, content));
            }
        }
    }
}

fn revision_content(page: &Value) -> Option<&str> {
    page.get("revisions")?
        .get(0)?
        .get("slots")?
        .get("main")?
        .get("content")?
        .as_str()
}

#[async_trait]
impl Stage for RevisionFetcher {
    fn kind(&self) -> StageKind {
        StageKind::Revisions
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let ids = items
            .into_iter()
            .map(|item| item.key)
            .filter(|id| !id.trim().is_empty());
        let (hits, misses) = crate::partition_cached(ids, |id| self.cache.get(id))?;
        info!(cached = hits.len(), to_fetch = misses.len(), "fetching revisions");

        let mut out: Vec<Item> = hits
            .into_iter()
            .map(|(id, text)| Item::text(id, text))
            .collect();
        for chunk in misses.chunks(CHUNK_SIZE) {
            self.fetch_chunk(chunk, &mut out).await?;
        }
        Ok(out)
    }
}
