//! Remote API definition (OpenAPI-style schema document).
//!
//! Only the parts the client needs are modelled: the version, the server
//! list, and the `operationId` of every `GET` path. Everything else in the
//! document is ignored on decode.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::{ApiError, Result};
use super::operation::Operation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDefinition {
    #[serde(default)]
    pub openapi: Option<String>,
    pub info: ApiInfo,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<OperationObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationObject {
    #[serde(rename = "operationId", default)]
    pub operation_id: Option<String>,
}

impl ApiDefinition {
    /// Download and decode the schema document.
    #[instrument(skip(http))]
    pub async fn fetch(http: &reqwest::Client, schema_url: &str) -> Result<Self> {
        let response = http
            .get(schema_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::api(
                status.as_u16(),
                format!("failed to fetch API definition: {body}"),
            ));
        }

        let bytes = response.bytes().await?;
        let definition: ApiDefinition = serde_json::from_slice(&bytes)?;
        debug!(
            version = %definition.info.version,
            paths = definition.paths.len(),
            "Fetched API definition"
        );
        Ok(definition)
    }

    /// Map every known operation to its path template.
    ///
    /// Operation ids the client does not know are skipped.
    pub fn operation_paths(&self) -> HashMap<Operation, String> {
        self.paths
            .iter()
            .filter_map(|(path, item)| {
                let id = item.get.as_ref()?.operation_id.as_deref()?;
                Operation::from_operation_id(id).map(|op| (op, path.clone()))
            })
            .collect()
    }

    /// First declared server URL, if any.
    pub fn server_url(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str())
    }
}
