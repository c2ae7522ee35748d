//! Pipeline stage turning raw revisions into cached plain text.

use std::sync::Arc;

use async_trait::async_trait;
use qexp_shared::{Item, Result, Stage, StageKind};
use qexp_storage::Cache;
use tracing::{debug, info, instrument, warn};

/// Maps `(page id, raw wikitext)` items to `(page id, plain text)`.
pub struct WikitextCleaner {
    cache: Arc<dyn Cache>,
}

impl WikitextCleaner {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Stage for WikitextCleaner {
    fn kind(&self) -> StageKind {
        StageKind::Wikitext
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let mut out = Vec::with_capacity(items.len());
        let mut cleaned = 0usize;

        for item in items {
            if let Some(text) = self.cache.get(&item.key)? {
                out.push(Item::text(item.key, text));
                continue;
            }
            let Some(raw) = item.payload.as_text() else {
                warn!(id = %item.key, "no revision text to clean");
                continue;
            };

            let text = crate::strip(raw);
            debug!(id = %item.key, raw_len = raw.len(), clean_len = text.len(), "cleaned");
            self.cache.set(&item.key, &text)?;
            out.push(Item::text(item.key, text));
            cleaned += 1;
        }

        info!(cleaned, cached = out.len() - cleaned, "cleaned revisions");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qexp_storage::DataCache;
    use uuid::Uuid;

    fn temp_cache() -> Arc<dyn Cache> {
        let dir = std::env::temp_dir().join(format!("qexp-clean-{}", Uuid::now_v7()));
        Arc::new(DataCache::open(dir).expect("open cache"))
    }

    #[tokio::test]
    async fn cleans_and_caches() {
        let cache = temp_cache();
        let cleaner = WikitextCleaner::new(cache.clone());

        let out = cleaner
            .run(vec![Item::text("1", "'''Odessa''' is a [[port]].{{cn}}")])
            .await
            .unwrap();
        assert_eq!(out, vec![Item::text("1", "Odessa is a port.")]);
        assert_eq!(cache.get("1").unwrap().as_deref(), Some("Odessa is a port."));
    }

    #[tokio::test]
    async fn cached_text_wins_over_input() {
        let cache = temp_cache();
        cache.set("2", "already clean").unwrap();

        let out = WikitextCleaner::new(cache)
            .run(vec![Item::text("2", "[[different]]"), Item::key("3")])
            .await
            .unwrap();
        assert_eq!(out, vec![Item::text("2", "already clean")]);
    }
}
