//! MediaWiki action API client with continuation support.

use std::collections::BTreeMap;

use qexp_shared::{QexpError, Result};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, warn};

use crate::Politeness;

/// Client for one MediaWiki endpoint with a fixed set of base parameters.
pub struct MediaWikiClient {
    client: Client,
    endpoint: String,
    base_params: BTreeMap<String, String>,
    politeness: Politeness,
}

impl MediaWikiClient {
    /// Create a client for `endpoint` that always sends `base_params`.
    pub fn new(endpoint: &str, base_params: &[(&str, &str)]) -> Result<Self> {
        let mut params: BTreeMap<String, String> = base_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        params.insert("format".into(), "json".into());
        params.insert("formatversion".into(), "2".into());

        Ok(Self {
            client: crate::build_client()?,
            endpoint: endpoint.to_string(),
            base_params: params,
            politeness: Politeness::none(),
        })
    }

    /// Delay every request by a randomized pause.
    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.politeness = politeness;
        self
    }

    /// Start a query. With `no_continue`, only the first response is fetched.
    pub fn query(&self, items: Vec<(&str, String)>, no_continue: bool) -> QueryPages<'_> {
        QueryPages {
            client: self,
            items: items
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            continuation: BTreeMap::new(),
            no_continue,
            done: false,
            requests: 0,
        }
    }

    async fn request(&self, params: &BTreeMap<String, String>) -> Result<Value> {
        self.politeness.pause().await;

        let response = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| QexpError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QexpError::Network(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| QexpError::parse(format!("{}: invalid JSON: {e}", self.endpoint)))
    }
}

/// Cursor over the response pages of one query.
///
/// Each call to [`QueryPages::next_page`] issues at most the requests needed to
/// produce the next `query` section, merging the previous `continue` block
/// into the request parameters.
pub struct QueryPages<'a> {
    client: &'a MediaWikiClient,
    items: BTreeMap<String, String>,
    continuation: BTreeMap<String, String>,
    no_continue: bool,
    done: bool,
    requests: usize,
}

impl QueryPages<'_> {
    /// Next `query` section, or `None` once the query is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Value>> {
        while !self.done {
            let mut params = self.client.base_params.clone();
            params.extend(self.continuation.clone());
            params.extend(self.items.clone());

            self.requests += 1;
            debug!(request = self.requests, "mediawiki query");
            let mut response = match self.client.request(&params).await {
                Ok(response) => response,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            };

            if let Some(error) = response.get("error") {
                self.done = true;
                return Err(QexpError::parse(format!("mediawiki error: {error}")));
            }
            if let Some(warnings) = response.get("warnings") {
                warn!(%warnings, "mediawiki warnings");
            }

            match response.get("continue").and_then(Value::as_object) {
                Some(cont) if !self.no_continue => {
                    self.continuation = cont
                        .iter()
                        .map(|(k, v)| (k.clone(), value_to_param(v)))
                        .collect();
                }
                _ => self.done = true,
            }

            if let Some(query) = response.get_mut("query").map(Value::take) {
                return Ok(Some(query));
            }
        }
        Ok(None)
    }

    /// Requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }
}

fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Page id of a response page, as a string.
pub(crate) fn page_id(page: &Value) -> Option<String> {
    match page.get("pageid")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Whether a response page is flagged missing.
pub(crate) fn is_missing(page: &Value) -> bool {
    match page.get("missing") {
        Some(Value::Bool(flag)) => *flag,
        Some(_) => true,
        None => false,
    }
}

/// The `pages` array of a `query` section (empty when absent).
pub(crate) fn pages(query: &Value) -> &[Value] {
    query
        .get("pages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn page_helpers() {
        assert_eq!(page_id(&json!({"pageid": 42})).as_deref(), Some("42"));
        assert_eq!(page_id(&json!({"title": "x"})), None);
        assert!(is_missing(&json!({"missing": true})));
        assert!(is_missing(&json!({"missing": ""})));
        assert!(!is_missing(&json!({"missing": false})));
        assert!(pages(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn follows_continuation_until_exhausted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("titles", "Foo"))
            .and(query_param_is_missing("plcontinue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"plcontinue": "1|2", "continue": "||"},
                "query": {"pages": [{"pageid": 1}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("plcontinue", "1|2"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{"pageid": 2}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(&server.uri(), &[("action", "query")]).unwrap();
        let mut cursor = client.query(vec![("titles", "Foo".into())], false);

        let first = cursor.next_page().await.unwrap().unwrap();
        assert_eq!(page_id(&pages(&first)[0]).as_deref(), Some("1"));
        let second = cursor.next_page().await.unwrap().unwrap();
        assert_eq!(page_id(&pages(&second)[0]).as_deref(), Some("2"));
        assert!(cursor.next_page().await.unwrap().is_none());
        assert_eq!(cursor.requests(), 2);
    }

    #[tokio::test]
    async fn no_continue_stops_after_first_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"plcontinue": "1|2", "continue": "||"},
                "query": {"pages": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(&server.uri(), &[]).unwrap();
        let mut cursor = client.query(vec![("titles", "Foo".into())], true);
        assert!(cursor.next_page().await.unwrap().is_some());
        assert!(cursor.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_error_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "badvalue", "info": "nope"}
            })))
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(&server.uri(), &[]).unwrap();
        let mut cursor = client.query(vec![], false);
        let err = cursor.next_page().await.unwrap_err();
        assert!(err.to_string().contains("badvalue"));
        assert!(cursor.next_page().await.unwrap().is_none());
    }
}
