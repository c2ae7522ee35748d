//! Subject categories of linked entities.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use qexp_shared::{Item, RESOURCE_PREFIX, Result, Stage, StageKind};
use qexp_storage::Cache;
use tracing::{error, info, instrument};

use super::{SparqlClient, escape_literal};

const SEPARATOR: char = ';';

/// Turn a resource URI into the label used for lookups and as output key.
pub fn label_for(uri: &str) -> String {
    uri.strip_prefix(RESOURCE_PREFIX)
        .unwrap_or(uri)
        .trim()
        .replace('_', " ")
}

fn subject_query(label: &str) -> String {
    format!(
        r#"SELECT DISTINCT ?subjects
FROM <http://dbpedia.org>
WHERE {{
    ?concept <http://www.w3.org/2000/01/rdf-schema#label> "{}"@en ;
    <http://purl.org/dc/terms/subject> ?subjects .
}}
LIMIT 100"#,
        escape_literal(label)
    )
}

/// Maps `(article id, [resource URI])` items to `(label, [subject])` items.
pub struct SubjectLookup {
    sparql: SparqlClient,
    cache: Arc<dyn Cache>,
    blocklist: HashSet<String>,
}

impl SubjectLookup {
    pub fn new(sparql: SparqlClient, cache: Arc<dyn Cache>) -> Self {
        Self {
            sparql,
            cache,
            blocklist: HashSet::new(),
        }
    }

    /// Labels that are never looked up.
    pub fn with_blocklist(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.blocklist = labels.into_iter().collect();
        self
    }

    async fn lookup(&self, label: &str) -> Result<Vec<String>> {
        let rows = self.sparql.select(&subject_query(label)).await?;
        Ok(crate::dedup_in_order(rows.into_iter().filter_map(|mut row| {
            let subject = row.remove("subjects")?;
            Some(
                subject
                    .strip_prefix(RESOURCE_PREFIX)
                    .map(str::to_string)
                    .unwrap_or(subject),
            )
        })))
    }
}

#[async_trait]
impl Stage for SubjectLookup {
    fn kind(&self) -> StageKind {
        StageKind::Subjects
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let labels: Vec<String> = items
            .iter()
            .flat_map(|item| item.payload.as_list())
            .map(String::as_str)
            .map(label_for)
            .filter(|label| !self.blocklist.contains(label))
            .collect();
        let (hits, misses) =
            crate::partition_cached(labels, |label| self.cache.get_list(label, SEPARATOR))?;
        info!(cached = hits.len(), to_fetch = misses.len(), "looking up subjects");

        let mut out: Vec<Item> = hits
            .into_iter()
            .map(|(label, subjects)| Item::list(label, subjects))
            .collect();
        for label in misses {
            if let Some(subjects) = self.cache.get_list(&label, SEPARATOR)? {
                out.push(Item::list(label, subjects));
                continue;
            }
            info!(%label, "sparql subject query");
            match self.lookup(&label).await {
                Ok(subjects) => {
                    self.cache.set_list(&label, &subjects, SEPARATOR)?;
                    out.push(Item::list(label, subjects));
                }
                Err(e) => error!(%label, error = %e, "subject lookup failed"),
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
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[test]
    fn labels_from_uris() {
        assert_eq!(label_for("http://dbpedia.org/resource/Blade_Runner"), "Blade Runner");
        assert_eq!(label_for("  plain_text "), "plain text");
    }

    #[test]
    fn query_embeds_escaped_label() {
        let query = subject_query(r#"Say "Hi""#);
        assert!(query.contains(r#""Say \"Hi\""@en"#));
        assert!(query.contains("LIMIT 100"));
    }

    #[tokio::test]
    async fn looks_up_rekeys_and_skips_blocklist() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .respond_with(|req: &Request| {
                let query = req
                    .url
                    .query_pairs()
                    .find(|(k, _)| k == "query")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default();
                assert!(query.contains("\"Blade Runner\"@en"), "unexpected query {query}");
                ResponseTemplate::new(200).set_body_json(json!({
                    "results": {"bindings": [
                        {"subjects": {"value": "http://dbpedia.org/resource/Category:1982_films"}},
                        {"subjects": {"value": "http://dbpedia.org/resource/Category:Cyberpunk"}},
                        {"subjects": {"value": "http://dbpedia.org/resource/Category:1982_films"}},
                    ]}
                }))
            })
            .expect(1)
            .mount(&server)
            .await;

        let lookup = SubjectLookup::new(SparqlClient::new(&server.uri()).unwrap(), cache.clone())
            .with_blocklist(["Odessa".to_string()]);
        let items = vec![Item::list(
            "42",
            vec![
                "http://dbpedia.org/resource/Blade_Runner".into(),
                "http://dbpedia.org/resource/Odessa".into(),
            ],
        )];
        let first = lookup.run(items.clone()).await.unwrap();
        let second = lookup.run(items).await.unwrap();

        let expected = vec![Item::list(
            "Blade Runner",
            vec!["Category:1982_films".into(), "Category:Cyberpunk".into()],
        )];
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert_eq!(cache.get("Odessa").unwrap(), None);
    }

    #[tokio::test]
    async fn empty_result_is_cached_as_sentinel() {
        let server = MockServer::start().await;
        let (cache, _dir) = temp_cache();

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": {"bindings": []}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let lookup = SubjectLookup::new(SparqlClient::new(&server.uri()).unwrap(), cache.clone());
        let items = vec![Item::list("1", vec!["http://dbpedia.org/resource/Nothing".into()])];
        lookup.run(items.clone()).await.unwrap();
        let out = lookup.run(items).await.unwrap();

        assert_eq!(out, vec![Item::list("Nothing", vec![])]);
        assert_eq!(cache.get("Nothing").unwrap(), Some(String::new()));
    }
}
