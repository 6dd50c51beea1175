//! CloudKit Web Services backend (public database).
//!
//! Talks to the REST endpoints under
//!
//! ```text
//! {base_url}/database/1/{container}/{environment}/public/records/query
//! {base_url}/database/1/{container}/{environment}/public/records/modify
//! ```
//!
//! authenticated with an API token (`ckAPIToken`), plus a web auth token when
//! the container requires a signed-in user for writes. Only string fields are
//! mapped; everything the space record needs is a string.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RecordStore;
use crate::config::CloudKitConfig;
use crate::record::{Record, RecordFilter};

const RESULTS_LIMIT: u32 = 200;

pub struct CloudKitStore {
    http: HttpClient,
    /// `{base_url}/database/1/{container}/{environment}/public`
    database_url: String,
    api_token: String,
    web_auth_token: Option<String>,
}

// API request/response models
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: Query<'a>,
    results_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_marker: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Query<'a> {
    record_type: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filter_by: Vec<Filter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Filter {
    field_name: String,
    comparator: &'static str,
    field_value: FieldValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldValue {
    value: Value,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModifyRequest {
    operations: Vec<Operation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    operation_type: &'static str,
    record: CkRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<CkRecord>,
    continuation_marker: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CkRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    record_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_type: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing)]
    server_error_code: Option<String>,
    #[serde(skip_serializing)]
    reason: Option<String>,
}

impl CkRecord {
    fn from_record(record: &Record) -> Self {
        let fields = record
            .fields
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    FieldValue {
                        value: Value::String(v.clone()),
                        kind: Some("STRING".to_string()),
                    },
                )
            })
            .collect();
        Self {
            record_name: record.record_name.clone(),
            record_type: Some(record.record_type.clone()),
            fields,
            ..Self::default()
        }
    }

    /// Convert to our flat record. Non-string scalars are stringified,
    /// lists/assets/references are skipped.
    fn into_record(self, fallback_type: &str) -> Record {
        let mut record = Record::new(self.record_type.as_deref().unwrap_or(fallback_type));
        record.record_name = self.record_name;
        for (name, field) in self.fields {
            match field.value {
                Value::String(s) => record.set(&name, s),
                Value::Number(n) => record.set(&name, n.to_string()),
                Value::Bool(b) => record.set(&name, b.to_string()),
                _ => {}
            }
        }
        record
    }

    fn error(&self) -> Option<String> {
        self.server_error_code.as_ref().map(|code| match &self.reason {
            Some(reason) => format!("{code}: {reason}"),
            None => code.clone(),
        })
    }
}

impl CloudKitStore {
    pub fn new(config: &CloudKitConfig) -> Result<Self> {
        if config.container.is_empty() {
            anyhow::bail!("cloudkit backend needs store.cloudkit.container");
        }
        if config.api_token.is_empty() {
            anyhow::bail!("cloudkit backend needs store.cloudkit.api_token");
        }
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            database_url: format!(
                "{}/database/1/{}/{}/public",
                config.base_url.trim_end_matches('/'),
                config.container,
                config.environment
            ),
            api_token: config.api_token.clone(),
            web_auth_token: config.web_auth_token.clone(),
        })
    }

    fn auth_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("ckAPIToken", self.api_token.as_str())];
        if let Some(ref token) = self.web_auth_token {
            params.push(("ckWebAuthToken", token.as_str()));
        }
        params
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<RecordsResponse> {
        let url = format!("{}/{}", self.database_url, path);
        let resp = self
            .http
            .post(&url)
            .query(&self.auth_params())
            .json(body)
            .send()
            .await
            .with_context(|| format!("CloudKit request to {path} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("CloudKit {path} returned {status}: {body}");
        }
        Ok(resp.json().await?)
    }
}

fn filters_for(filter: &RecordFilter) -> Vec<Filter> {
    match filter {
        RecordFilter::All => Vec::new(),
        RecordFilter::FieldEquals { field, value } => vec![Filter {
            field_name: field.clone(),
            comparator: "EQUALS",
            field_value: FieldValue {
                value: Value::String(value.clone()),
                kind: Some("STRING".to_string()),
            },
        }],
    }
}

#[async_trait]
impl RecordStore for CloudKitStore {
    fn backend_name(&self) -> &str {
        "cloudkit"
    }

    async fn query(&self, record_type: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut continuation_marker = None;

        loop {
            let request = QueryRequest {
                query: Query {
                    record_type,
                    filter_by: filters_for(filter),
                },
                results_limit: RESULTS_LIMIT,
                continuation_marker: continuation_marker.take(),
            };
            let page = self.post("records/query", &request).await?;

            for ck in page.records {
                if let Some(err) = ck.error() {
                    tracing::warn!("Error fetching record: {}", err);
                    continue;
                }
                records.push(ck.into_record(record_type));
            }

            match page.continuation_marker {
                Some(marker) => continuation_marker = Some(marker),
                None => break,
            }
        }

        tracing::debug!("Fetched {} {} records from CloudKit", records.len(), record_type);
        Ok(records)
    }

    async fn save(&self, record: &Record) -> Result<Record> {
        // forceUpdate skips the change-tag check: last writer wins
        let operation_type = if record.record_name.is_some() {
            "forceUpdate"
        } else {
            "create"
        };
        let request = ModifyRequest {
            operations: vec![Operation {
                operation_type,
                record: CkRecord::from_record(record),
            }],
        };
        let resp = self.post("records/modify", &request).await?;
        let saved = resp
            .records
            .into_iter()
            .next()
            .context("CloudKit modify returned no records")?;
        if let Some(err) = saved.error() {
            anyhow::bail!("CloudKit save failed: {err}");
        }
        Ok(saved.into_record(&record.record_type))
    }
}
