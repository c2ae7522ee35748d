//! Entity linking against a DBpedia Spotlight `/annotate` endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use qexp_shared::{Item, QexpError, Result, Stage, StageKind};
use qexp_storage::Cache;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use crate::Politeness;

const SEPARATOR: char = ';';

/// Longest text sent to the annotator, in bytes.
pub const MAX_TEXT_BYTES: usize = 7100;

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "Resources", default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "@URI")]
    uri: String,
}

/// Maps `(article id, clean text)` items to `(article id, [resource URI])`.
pub struct EntityLinker {
    client: Client,
    annotate_url: String,
    confidence: f64,
    cache: Arc<dyn Cache>,
    politeness: Politeness,
}

impl EntityLinker {
    /// `base_url` is the Spotlight REST root; `/annotate` is appended.
    pub fn new(base_url: &str, confidence: f64, cache: Arc<dyn Cache>) -> Result<Self> {
        Ok(Self {
            client: crate::build_client()?,
            annotate_url: format!("{}/annotate", base_url.trim_end_matches('/')),
            confidence,
            cache,
            politeness: Politeness::none(),
        })
    }

    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.politeness = politeness;
        self
    }

    async fn annotate(&self, text: &str) -> Result<Vec<String>> {
        self.politeness.pause().await;

        let confidence = self.confidence.to_string();
        let response = self
            .client
            .get(&self.annotate_url)
            .header(ACCEPT, "application/json")
            .query(&[
                ("text", truncate(text, MAX_TEXT_BYTES)),
                ("confidence", confidence.as_str()),
            ])
            .send()
            .await
            .map_err(|e| QexpError::Network(format!("{}: {e}", self.annotate_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QexpError::Network(format!(
                "{}: HTTP {status}",
                self.annotate_url
            )));
        }

        let annotation: Annotation = response
            .json()
            .await
            .map_err(|e| QexpError::parse(format!("spotlight response: {e}")))?;
        Ok(crate::dedup_in_order(
            annotation.resources.into_iter().map(|r| r.uri),
        ))
    }
}

/// Cut `text` to at most `max` bytes without splitting a character.
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl Stage for EntityLinker {
    fn kind(&self) -> StageKind {
        StageKind::Spotlight
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let mut out = Vec::with_capacity(items.len());
        let mut pending = Vec::new();
        for item in items {
            match self.cache.get_list(&item.key, SEPARATOR)? {
                Some(uris) => out.push(Item::list(item.key, uris)),
                None => pending.push(item),
            }
        }
        info!(cached = out.len(), to_fetch = pending.len(), "linking entities");

        for item in pending {
            let text = item.payload.as_text().unwrap_or_default();
            match self.annotate(text).await {
                Ok(uris) => {
                    debug!(id = %item.key, count = uris.len(), "annotated");
                    self.cache.set_list(&item.key, &uris, SEPARATOR)?;
                    out.push(Item::list(item.key, uris));
                }
                Err(e) => error!(id = %item.key, error = %e, "annotation failed"),
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
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 100), "short");
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("héllo", 3), "hé");
    }

    #[tokio::test]
    async fn links_and_deduplicates_uris() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .and(path("/rest/annotate"))
            .and(query_param("confidence", "0.6"))
            .and(query_param("text", "Odessa is a port"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Resources": [
                    {"@URI": "http://dbpedia.org/resource/Odessa"},
                    {"@URI": "http://dbpedia.org/resource/Port"},
                    {"@URI": "http://dbpedia.org/resource/Odessa"},
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let linker =
            EntityLinker::new(&format!("{}/rest/", server.uri()), 0.6, cache.clone()).unwrap();
        let items = vec![Item::text("77", "Odessa is a port")];
        let first = linker.run(items.clone()).await.unwrap();
        let second = linker.run(items).await.unwrap();

        let expected = vec![Item::list(
            "77",
            vec![
                "http://dbpedia.org/resource/Odessa".into(),
                "http://dbpedia.org/resource/Port".into(),
            ],
        )];
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    #[tokio::test]
    async fn no_resources_is_cached_as_empty() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"@text": "nothing"})))
            .expect(1)
            .mount(&server)
            .await;

        let linker = EntityLinker::new(&server.uri(), 0.6, cache.clone()).unwrap();
        let out = linker.run(vec![Item::text("1", "nothing")]).await.unwrap();
        assert_eq!(out, vec![Item::list("1", vec![])]);
        assert_eq!(cache.get("1").unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn failure_drops_only_that_article() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .and(query_param("text", "bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("text", "good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Resources": [{"@URI": "http://dbpedia.org/resource/Good"}]
            })))
            .mount(&server)
            .await;

        let linker = EntityLinker::new(&server.uri(), 0.6, cache.clone()).unwrap();
        let out = linker
            .run(vec![Item::text("1", "bad"), Item::text("2", "good")])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, "2");
        assert_eq!(cache.get("1").unwrap(), None);
    }
}
