//! Row store backed by a PostgREST-compatible HTTP gateway.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Response, header};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::application::repos::RepoError;
use crate::infra::error::InfraError;

use super::query::{RowStore, ViewQuery};

const BACKEND: &str = "rest";
const TARGET: &str = "trove::infra::db::rest";
const REST_PREFIX: &str = "rest/v1/";

pub struct RestRowStore {
    client: Client,
    base: Url,
    api_key: String,
}

impl RestRowStore {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, InfraError> {
        let base = Url::parse(endpoint)
            .and_then(|url| url.join("/"))
            .and_then(|url| url.join(REST_PREFIX))
            .map_err(|err| {
                InfraError::configuration(format!("invalid database.url `{endpoint}`: {err}"))
            })?;

        let client = Client::builder()
            .user_agent(concat!("trove/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::backend(BACKEND, err.to_string()))?;

        Ok(Self {
            client,
            base,
            api_key: api_key.to_string(),
        })
    }

    /// Encode a view query in PostgREST's query-string dialect.
    pub fn url_for(&self, query: &ViewQuery) -> Result<Url, RepoError> {
        let mut url = self
            .base
            .join(query.view())
            .map_err(RepoError::from_persistence)?;

        {
            let mut pairs = url.query_pairs_mut();
            let select = if query.columns().is_empty() {
                "*".to_string()
            } else {
                query.columns().join(",")
            };
            pairs.append_pair("select", &select);

            for (column, value) in query.filters() {
                pairs.append_pair(column, &format!("eq.{value}"));
            }

            if !query.ordering().is_empty() {
                let order = query
                    .ordering()
                    .iter()
                    .map(|(column, direction)| format!("{column}.{}", direction.as_str()))
                    .collect::<Vec<_>>()
                    .join(",");
                pairs.append_pair("order", &order);
            }

            if let Some(limit) = query.row_limit() {
                pairs.append_pair("limit", &limit.to_string());
            }
        }

        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, RepoError> {
        self.client
            .get(url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| RepoError::data_access(format!("upstream request failed: {err}")))
    }
}

#[async_trait]
impl RowStore for RestRowStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn select(&self, query: &ViewQuery) -> Result<Vec<Value>, RepoError> {
        let url = self.url_for(query)?;
        let started = Instant::now();

        let result = match self.get(url).await {
            Ok(response) => decode_rows(response).await,
            Err(err) => Err(err),
        };

        histogram!("trove_upstream_request_ms", "backend" => BACKEND)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(rows) => {
                debug!(target: TARGET, view = query.view(), rows = rows.len(), "view read")
            }
            Err(err) => {
                counter!("trove_upstream_error_total", "backend" => BACKEND).increment(1);
                warn!(target: TARGET, view = query.view(), error = %err, "view read failed");
            }
        }

        result
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        let response = self.get(self.base.clone()).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RepoError::data_access(format!(
                "upstream health check returned {status}"
            )))
        }
    }
}

/// Error payload returned by PostgREST.
#[derive(Debug, Deserialize)]
struct UpstreamError {
    message: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

async fn decode_rows(response: Response) -> Result<Vec<Value>, RepoError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| RepoError::data_access(format!("failed to read upstream body: {err}")))?;

    if !status.is_success() {
        return Err(match serde_json::from_slice::<UpstreamError>(&bytes) {
            Ok(upstream) => {
                debug!(
                    target: TARGET,
                    %status,
                    code = upstream.code.as_deref(),
                    details = upstream.details.as_deref(),
                    hint = upstream.hint.as_deref(),
                    "upstream rejected query"
                );
                RepoError::data_access(upstream.message)
            }
            Err(_) => RepoError::data_access(format!(
                "upstream returned {status}: {}",
                String::from_utf8_lossy(&bytes)
            )),
        });
    }

    serde_json::from_slice(&bytes)
        .map_err(|err| RepoError::data_access(format!("failed to parse upstream rows: {err}")))
}
