//! Remote-fetch stages for qexp.
//!
//! Every stage here memoizes through an injected [`qexp_storage::Cache`]:
//! identities already cached are answered locally, the rest are fetched one
//! request at a time and written back as soon as they resolve. A failure for
//! one identity is logged and that identity is dropped; the run goes on.

pub mod flatten;
pub mod mediawiki;
pub mod politeness;
pub mod sampler;
pub mod sparql;
pub mod spotlight;

use qexp_shared::{QexpError, Result};
use reqwest::Client;

pub use flatten::Flattener;
pub use mediawiki::{CategorySampler, MediaWikiClient, PageLinkFetcher, RevisionFetcher};
pub use politeness::Politeness;
pub use sampler::{SAMPLE_SEED, Sampler};
pub use sparql::{PageIdResolver, SparqlClient, SubjectLookup};
pub use spotlight::EntityLinker;

/// User-Agent string sent with every remote request.
const USER_AGENT: &str = concat!("qexp/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client. No request timeout is configured.
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| QexpError::Network(format!("failed to build HTTP client: {e}")))
}

/// Partition `keys` into cached hits and misses, preserving input order.
pub(crate) fn partition_cached<T>(
    keys: impl IntoIterator<Item = String>,
    mut lookup: impl FnMut(&str) -> Result<Option<T>>,
) -> Result<(Vec<(String, T)>, Vec<String>)> {
    let mut hits = Vec::new();
    let mut misses = Vec::new();
    for key in keys {
        match lookup(&key)? {
            Some(value) => hits.push((key, value)),
            None => misses.push(key),
        }
    }
    Ok((hits, misses))
}

/// Drop repeated values, keeping first-seen order.
pub(crate) fn dedup_in_order(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::Arc;

    use qexp_storage::{Cache, DataCache};
    use uuid::Uuid;

    /// Fresh cache directory under the system temp dir.
    pub fn temp_cache() -> (Arc<dyn Cache>, PathBuf) {
        let dir = std::env::temp_dir().join(format!("qexp-extractors-{}", Uuid::now_v7()));
        let cache = DataCache::open(&dir).expect("open cache");
        (Arc::new(cache), dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_keeps_order() {
        let (hits, misses) = partition_cached(
            ["a", "b", "c"].map(String::from),
            |k| Ok((k != "b").then(|| k.to_uppercase())),
        )
        .unwrap();
        assert_eq!(
            hits,
            vec![("a".to_string(), "A".to_string()), ("c".into(), "C".into())]
        );
        assert_eq!(misses, vec!["b".to_string()]);
    }

    #[test]
    fn dedup_keeps_first_seen() {
        assert_eq!(
            dedup_in_order(["x", "y", "x", "z"].map(String::from)),
            ["x", "y", "z"]
        );
    }
}
