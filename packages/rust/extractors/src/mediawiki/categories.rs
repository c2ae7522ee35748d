//! Category member sampling.
//!
//! For every category attached to a concept, ask for the first page of its
//! article-namespace members. Only the first response is used; the sample is
//! whatever the API returns first, not a uniform draw.

use std::sync::Arc;

use async_trait::async_trait;
use qexp_shared::{Item, Payload, Result, Stage, StageKind};
use qexp_storage::Cache;
use tracing::{error, info, instrument, warn};

use super::client::{self, MediaWikiClient};
use crate::Politeness;

const SEPARATOR: char = ';';

/// Namespaces never sampled even if the API lets them through.
const EXCLUDED_PREFIXES: [&str; 3] = ["File:", "Template:", "Category:"];

/// Re-keys `(concept, [category, ...])` items into `(category, [page id, ...])`.
pub struct CategorySampler {
    client: MediaWikiClient,
    cache: Arc<dyn Cache>,
}

impl CategorySampler {
    /// `limit` is the number of members requested per category.
    pub fn new(endpoint: &str, limit: u32, cache: Arc<dyn Cache>) -> Result<Self> {
        let limit = limit.to_string();
        let client = MediaWikiClient::new(
            endpoint,
            &[
                ("action", "query"),
                ("generator", "categorymembers"),
                ("gcmnamespace", "0"),
                ("gcmlimit", limit.as_str()),
                ("prop", "info"),
            ],
        )?;
        Ok(Self { client, cache })
    }

    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.client = self.client.with_politeness(politeness);
        self
    }

    /// First page of members of `category`; `None` when the request failed.
    async fn fetch(&self, category: &str) -> Option<Vec<String>> {
        let mut cursor = self
            .client
            .query(vec![("gcmtitle", category.to_string())], true);
        let query = match cursor.next_page().await {
            Ok(Some(query)) => query,
            Ok(None) => {
                warn!(%category, "no query section, caching empty sample");
                return Some(Vec::new());
            }
            Err(e) => {
                error!(%category, error = %e, "category request failed");
                return None;
            }
        };

        let pages = client::pages(&query)
            .iter()
            .filter(|page| {
                let title = page.get("title").and_then(|t| t.as_str()).unwrap_or("");
                !EXCLUDED_PREFIXES.iter().any(|p| title.starts_with(p))
            })
            .filter_map(client::page_id)
            .collect();
        Some(pages)
    }
}

/// Percent-decode a category title; undecodable titles are kept as given.
pub fn decode_title(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Flatten `(concept, [category])` items to decoded category titles.
fn category_titles(items: Vec<Item>) -> Vec<String> {
    items
        .into_iter()
        .flat_map(|item| match item.payload {
            Payload::List(values) => values,
            _ => Vec::new(),
        })
        .map(|raw| decode_title(&raw))
        .collect()
}

#[async_trait]
impl Stage for CategorySampler {
    fn kind(&self) -> StageKind {
        StageKind::Categories
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let titles = category_titles(items);
        let (hits, misses) =
            crate::partition_cached(titles, |title| self.cache.get_list(title, SEPARATOR))?;
        info!(cached = hits.len(), to_fetch = misses.len(), "sampling categories");

        let mut out: Vec<Item> = hits
            .into_iter()
            .map(|(title, pages)| Item::list(title, pages))
            .collect();

        for category in misses {
            // Repeats within this run were cached by an earlier iteration.
            if let Some(pages) = self.cache.get_list(&category, SEPARATOR)? {
                out.push(Item::list(category, pages));
                continue;
            }
            if let Some(pages) = self.fetch(&category).await {
                self.cache.set_list(&category, &pages, SEPARATOR)?;
                out.push(Item::list(category, pages));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_cache;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn titles_are_flattened_and_decoded() {
        let items = vec![
            Item::list("Blade Runner", vec!["Category:Films_about_%C3%A9lite".into()]),
            Item::text("ignored", "text"),
            Item::list("Odessa", vec!["Category:Ports".into(), "Category:Cities".into()]),
        ];
        assert_eq!(
            category_titles(items),
            ["Category:Films_about_élite", "Category:Ports", "Category:Cities"]
        );
    }

    #[tokio::test]
    async fn samples_first_page_only_and_filters_namespaces() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .and(query_param("gcmtitle", "Category:Ports"))
            .and(query_param("gcmlimit", "10"))
            .and(query_param("gcmnamespace", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"gcmcontinue": "page|abc", "continue": "gcmcontinue||"},
                "query": {"pages": [
                    {"pageid": 11, "title": "Odessa"},
                    {"pageid": 12, "title": "Template:Ports"},
                    {"pageid": 13, "title": "Piraeus"},
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sampler = CategorySampler::new(&server.uri(), 10, cache.clone()).unwrap();
        let out = sampler
            .run(vec![Item::list("Odessa", vec!["Category:Ports".into()])])
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![Item::list("Category:Ports", vec!["11".into(), "13".into()])]
        );
        assert_eq!(cache.get("Category:Ports").unwrap().as_deref(), Some("11;13"));
    }

    #[tokio::test]
    async fn repeated_category_is_fetched_once() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{"pageid": 1, "title": "A"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sampler = CategorySampler::new(&server.uri(), 10, cache).unwrap();
        let out = sampler
            .run(vec![
                Item::list("x", vec!["Category:Shared".into()]),
                Item::list("y", vec!["Category:Shared".into()]),
            ])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|i| i.payload.as_list() == ["1".to_string()]));
    }

    #[tokio::test]
    async fn missing_query_caches_empty_sentinel() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batchcomplete": true})))
            .expect(1)
            .mount(&server)
            .await;

        let sampler = CategorySampler::new(&server.uri(), 10, cache.clone()).unwrap();
        let items = vec![Item::list("x", vec!["Category:Empty".into()])];
        let first = sampler.run(items.clone()).await.unwrap();
        let second = sampler.run(items).await.unwrap();

        assert_eq!(first, vec![Item::list("Category:Empty", vec![])]);
        assert_eq!(first, second);
        assert_eq!(cache.get("Category:Empty").unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn failed_request_is_not_cached() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sampler = CategorySampler::new(&server.uri(), 10, cache.clone()).unwrap();
        let out = sampler
            .run(vec![Item::list("x", vec!["Category:Down".into()])])
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(cache.get("Category:Down").unwrap(), None);
    }
}
