//! SPARQL `SELECT` client and the stages built on it.

pub mod page_ids;
pub mod subjects;

use std::collections::HashMap;

use qexp_shared::{QexpError, Result};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::Politeness;

pub use page_ids::PageIdResolver;
pub use subjects::SubjectLookup;

/// One result row: variable name → bound value.
pub type Binding = HashMap<String, String>;

#[derive(Debug, Deserialize)]
struct SelectResponse {
    results: SelectResults,
}

#[derive(Debug, Deserialize)]
struct SelectResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, Term>>,
}

#[derive(Debug, Deserialize)]
struct Term {
    value: String,
}

/// Minimal SPARQL protocol client returning JSON result bindings.
pub struct SparqlClient {
    client: Client,
    endpoint: String,
    politeness: Politeness,
}

impl SparqlClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: crate::build_client()?,
            endpoint: endpoint.to_string(),
            politeness: Politeness::none(),
        })
    }

    /// Pause before every query.
    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.politeness = politeness;
        self
    }

    /// Run a `SELECT` query and return its bindings in result order.
    pub async fn select(&self, query: &str) -> Result<Vec<Binding>> {
        self.politeness.pause().await;
        debug!(endpoint = %self.endpoint, "sparql select");

        let response = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "application/sparql-results+json")
            .query(&[("query", query), ("format", "json")])
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

        let body: SelectResponse = response
            .json()
            .await
            .map_err(|e| QexpError::parse(format!("sparql response: {e}")))?;
        Ok(body
            .results
            .bindings
            .into_iter()
            .map(|row| row.into_iter().map(|(k, t)| (k, t.value)).collect())
            .collect())
    }
}

/// Escape `value` for use inside a double-quoted SPARQL string literal.
pub(crate) fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
