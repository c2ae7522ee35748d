//! Resolution of resource URIs to MediaWiki page ids.

use std::sync::Arc;

use async_trait::async_trait;
use qexp_shared::{Item, QexpError, Result, Stage, StageKind};
use qexp_storage::IdStore;
use tracing::{debug, error, info, instrument};

use super::SparqlClient;

fn page_id_query(resource: &str) -> String {
    format!(
        r#"SELECT DISTINCT ?id
FROM <http://dbpedia.org>
WHERE {{
    <{resource}> <http://dbpedia.org/ontology/wikiPageID> ?id .
}}
LIMIT 1"#
    )
}

/// Rewrites `(seed, [alter])` items so every alter is a page id.
///
/// Alters that are not `http://` URIs are assumed to be page ids already.
/// Resolutions are remembered in the [`IdStore`] and never queried twice.
pub struct PageIdResolver {
    sparql: SparqlClient,
    store: Arc<IdStore>,
}

impl PageIdResolver {
    pub fn new(sparql: SparqlClient, store: Arc<IdStore>) -> Self {
        Self { sparql, store }
    }

    /// Page id of `resource` from the SPARQL endpoint.
    async fn lookup(&self, resource: &str) -> Result<String> {
        info!(%resource, "sparql id query");
        self.sparql
            .select(&page_id_query(resource))
            .await?
            .into_iter()
            .find_map(|mut row| row.remove("id"))
            .ok_or_else(|| QexpError::parse(format!("no wikiPageID for {resource}")))
    }

    /// `None` when the remote lookup failed; store errors are returned.
    async fn resolve(&self, alter: &str) -> Result<Option<String>> {
        if let Some(id) = self.store.get(alter).await? {
            debug!(%alter, "id store hit");
            return Ok(Some(id));
        }
        if !alter.starts_with("http://") {
            return Ok(Some(alter.to_string()));
        }

        match self.lookup(alter).await {
            Ok(id) => {
                self.store.set(alter, &id).await?;
                Ok(Some(id))
            }
            Err(e) => {
                error!(%alter, error = %e, "id resolution failed");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Stage for PageIdResolver {
    fn kind(&self) -> StageKind {
        StageKind::PageIds
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut ids = Vec::new();
            for alter in item.payload.as_list() {
                if let Some(id) = self.resolve(alter).await? {
                    ids.push(id);
                }
            }
            debug!(seed = %item.key, resolved = ids.len(), "profile resolved");
            out.push(Item::list(item.key, ids));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn temp_store() -> Arc<IdStore> {
        let path = std::env::temp_dir().join(format!("qexp-ids-{}.db", Uuid::now_v7()));
        Arc::new(IdStore::open(&path).await.expect("open store"))
    }

    #[test]
    fn query_targets_resource() {
        let query = page_id_query("http://dbpedia.org/resource/Taps");
        assert!(query.contains(
            "<http://dbpedia.org/resource/Taps> <http://dbpedia.org/ontology/wikiPageID> ?id"
        ));
        assert!(query.contains("LIMIT 1"));
    }

    #[tokio::test]
    async fn resolves_and_remembers() {
        let server = MockServer::start().await;
        let store = temp_store().await;

        Mock::given(method("GET"))
            .and(query_param(
                "query",
                page_id_query("http://dbpedia.org/resource/Odessa").as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [{"id": {"value": "22298"}}]}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param(
                "query",
                page_id_query("http://dbpedia.org/resource/Nowhere").as_str(),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": {"bindings": []}})),
            )
            .mount(&server)
            .await;

        let resolver =
            PageIdResolver::new(SparqlClient::new(&server.uri()).unwrap(), store.clone());
        let items = vec![Item::list(
            "seed",
            vec![
                "http://dbpedia.org/resource/Odessa".into(),
                "12345".into(),
                "http://dbpedia.org/resource/Nowhere".into(),
            ],
        )];
        let first = resolver.run(items.clone()).await.unwrap();
        assert_eq!(
            first,
            vec![Item::list("seed", vec!["22298".into(), "12345".into()])]
        );

        // Odessa is answered by the store; the mock expects a single call.
        let second = resolver.run(items).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.get("http://dbpedia.org/resource/Odessa").await.unwrap().as_deref(),
            Some("22298")
        );
    }

    #[tokio::test]
    async fn store_failure_aborts_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [{"id": {"value": "1"}}]}
            })))
            .mount(&server)
            .await;

        let path = std::env::temp_dir().join(format!("qexp-ids-{}.db", Uuid::now_v7()));
        let store = Arc::new(IdStore::open(&path).await.unwrap());
        let db = libsql::Builder::new_local(&path).build().await.unwrap();
        db.connect()
            .unwrap()
            .execute("DROP TABLE resource_ids", libsql::params![])
            .await
            .unwrap();

        let resolver = PageIdResolver::new(SparqlClient::new(&server.uri()).unwrap(), store);
        let items = vec![Item::list("seed", vec!["http://dbpedia.org/resource/Odessa".into()])];
        let err = resolver.run(items).await.unwrap_err();
        assert!(matches!(err, QexpError::Storage(_)));
    }
}
