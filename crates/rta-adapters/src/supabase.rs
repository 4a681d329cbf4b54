//! Supabase query executor.
//!
//! Runs generated SQL through a PostgREST remote procedure
//! (`POST {url}/rest/v1/rpc/{rpc}` with `{"query_text": sql}`) and returns
//! the rows as records.  The procedure is expected to return a JSON array
//! of objects.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, info};

use rta_kernel::{QueryExecutor, Record};

use crate::error::{AdapterError, Result};

/// Default remote procedure name.
pub const DEFAULT_RPC: &str = "execute_sql";

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Anonymous (or service) API key.
    pub key: String,
    /// Name of the SQL-executing remote procedure.
    pub rpc: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            rpc: DEFAULT_RPC.to_owned(),
        }
    }
}

/// Executes queries against Supabase over HTTP.
#[derive(Debug, Clone)]
pub struct SupabaseExecutor {
    endpoint: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl SupabaseExecutor {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(AdapterError::ConfigError("supabase url is not set".into()));
        }
        if config.key.trim().is_empty() {
            return Err(AdapterError::ConfigError("supabase key is not set".into()));
        }

        let endpoint = format!(
            "{}/rest/v1/rpc/{}",
            config.url.trim_end_matches('/'),
            config.rpc
        );

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.key)
            .map_err(|e| AdapterError::ConfigError(format!("invalid supabase key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.key))
            .map_err(|e| AdapterError::ConfigError(format!("invalid supabase key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdapterError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            headers,
            http,
        })
    }

    /// The RPC endpoint queries are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one query and return its rows.
    pub async fn run(&self, sql: &str) -> Result<Vec<Record>> {
        debug!(endpoint = %self.endpoint, sql, "executing query");

        let resp = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&json!({ "query_text": sql }))
            .send()
            .await
            .map_err(|e| AdapterError::Http {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| AdapterError::Http {
            endpoint: self.endpoint.clone(),
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(AdapterError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: text,
            });
        }

        let rows = parse_rows(&self.endpoint, &text)?;
        info!(rows = rows.len(), "query executed");
        Ok(rows)
    }
}

#[async_trait]
impl QueryExecutor for SupabaseExecutor {
    async fn execute(&self, query: &str) -> rta_kernel::Result<Vec<Record>> {
        self.run(query).await.map_err(AdapterError::into_execution)
    }
}

/// Parse an RPC response body into records.
///
/// `null` and an empty body mean no rows.  Anything other than an array of
/// objects is an error.
pub fn parse_rows(endpoint: &str, body: &str) -> Result<Vec<Record>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let unexpected = |reason: String| AdapterError::UnexpectedResponse {
        endpoint: endpoint.to_owned(),
        reason,
    };

    match serde_json::from_str::<Value>(body)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(unexpected(format!("row {i} is not an object: {other}"))),
            })
            .collect(),
        other => Err(unexpected(format!("expected an array of rows, got {other}"))),
    }
}
