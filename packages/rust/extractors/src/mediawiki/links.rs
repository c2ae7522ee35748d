//! Outgoing article links of a page, by title.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use qexp_shared::{Item, Result, Stage, StageKind};
use qexp_storage::Cache;
use tracing::{error, info, instrument};

use super::client::{self, MediaWikiClient};
use crate::Politeness;

const SEPARATOR: char = ',';

/// Maps each input title to the page ids of the articles it links to.
pub struct PageLinkFetcher {
    client: MediaWikiClient,
    cache: Arc<dyn Cache>,
    exclude: HashSet<String>,
    no_continue: bool,
}

impl PageLinkFetcher {
    pub fn new(endpoint: &str, cache: Arc<dyn Cache>) -> Result<Self> {
        let client = MediaWikiClient::new(
            endpoint,
            &[
                ("action", "query"),
                ("generator", "links"),
                ("gplnamespace", "0"),
                ("gpllimit", "100"),
                ("prop", "info"),
            ],
        )?;
        Ok(Self {
            client,
            cache,
            exclude: HashSet::new(),
            no_continue: false,
        })
    }

    /// Page ids never reported as links.
    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = String>) -> Self {
        self.exclude = exclude.into_iter().collect();
        self
    }

    /// Stop after the first response page per title.
    pub fn with_no_continue(mut self, no_continue: bool) -> Self {
        self.no_continue = no_continue;
        self
    }

    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.client = self.client.with_politeness(politeness);
        self
    }

    /// Linked page ids of `title` across all response pages; `None` on failure.
    async fn fetch(&self, title: &str) -> Option<Vec<String>> {
        let mut cursor = self
            .client
            .query(vec![("titles", title.replace(' ', "_"))], self.no_continue);
        let mut ids = Vec::new();
        loop {
            match cursor.next_page().await {
                Ok(Some(query)) => ids.extend(
                    client::pages(&query)
                        .iter()
                        .filter(|page| !client::is_missing(page))
                        .filter_map(client::page_id)
                        .filter(|id| !self.exclude.contains(id)),
                ),
                Ok(None) => break,
                Err(e) => {
                    error!(%title, error = %e, "link request failed");
                    return None;
                }
            }
        }
        Some(crate::dedup_in_order(ids))
    }
}

#[async_trait]
impl Stage for PageLinkFetcher {
    fn kind(&self) -> StageKind {
        StageKind::PageLinks
    }

    #[instrument(skip_all, fields(items = items.len(), no_continue = self.no_continue))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let titles = items.into_iter().map(|item| item.key);
        let (hits, misses) =
            crate::partition_cached(titles, |title| self.cache.get_list(title, SEPARATOR))?;
        info!(cached = hits.len(), to_fetch = misses.len(), "fetching page links");

        let mut out: Vec<Item> = hits
            .into_iter()
            .map(|(title, ids)| Item::list(title, ids))
            .collect();
        for title in misses {
            if let Some(ids) = self.fetch(&title).await {
                self.cache.set_list(&title, &ids, SEPARATOR)?;
                out.push(Item::list(title, ids));
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
    use wiremock::matchers::{method, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn two_page_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Blade_Runner"))
            .and(query_param_is_missing("gplcontinue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"gplcontinue": "42|0|Next", "continue": "gplcontinue||"},
                "query": {"pages": [
                    {"pageid": 1, "title": "Harrison Ford"},
                    {"pageid": 2, "title": "Ridley Scott"},
                    {"title": "Redlink", "missing": true},
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("gplcontinue", "42|0|Next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [
                    {"pageid": 3, "title": "Vangelis"},
                    {"pageid": 1, "title": "Harrison Ford"},
                ]}
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn accumulates_across_continuation() {
        let server = two_page_server().await;
        let (cache, _dir) = temp_cache();

        let fetcher = PageLinkFetcher::new(&server.uri(), cache.clone())
            .unwrap()
            .with_exclude(["2".to_string()]);
        let out = fetcher.run(vec![Item::key("Blade Runner")]).await.unwrap();

        assert_eq!(
            out,
            vec![Item::list("Blade Runner", vec!["1".into(), "3".into()])]
        );
        assert_eq!(cache.get("Blade Runner").unwrap().as_deref(), Some("1,3"));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_continue_issues_one_request() {
        let server = two_page_server().await;
        let (cache, _dir) = temp_cache();

        let fetcher = PageLinkFetcher::new(&server.uri(), cache)
            .unwrap()
            .with_no_continue(true);
        let out = fetcher.run(vec![Item::key("Blade Runner")]).await.unwrap();

        assert_eq!(out[0].payload.as_list(), ["1", "2"]);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cached_titles_issue_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (cache, _dir) = temp_cache();
        cache.set("Odessa", "5,6").unwrap();

        let fetcher = PageLinkFetcher::new(&server.uri(), cache).unwrap();
        let out = fetcher.run(vec![Item::key("Odessa")]).await.unwrap();
        assert_eq!(out, vec![Item::list("Odessa", vec!["5".into(), "6".into()])]);
    }
}
