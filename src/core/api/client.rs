//! HTTP client for the Boundlexx REST API.
//!
//! [`ApiClient`] is built once from an [`ApiDefinition`] and dispatches the
//! typed [`Operation`]s: first-page list requests, opaque-cursor
//! continuations, and single-record lookups.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::error::{ApiError, Result};
use super::operation::{ListParams, Operation};
use super::schema::ApiDefinition;
use super::types::{Entity, Page};

/// Typed client for list and retrieve operations.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    version: String,
    paths: HashMap<Operation, String>,
}

impl ApiClient {
    /// Build a client from a resolved definition.
    ///
    /// `base_url` overrides the definition's first server entry.
    pub fn from_definition(
        definition: &ApiDefinition,
        base_url: Option<&str>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let base_url = base_url
            .or_else(|| definition.server_url())
            .ok_or_else(|| ApiError::schema("definition declares no server and no base URL given"))?;

        // Validate early so a bad base URL fails construction, not the first call.
        Url::parse(base_url)?;

        let paths = definition.operation_paths();
        if paths.is_empty() {
            return Err(ApiError::schema("definition contains no known operations"));
        }

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            version: definition.info.version.clone(),
            paths,
        })
    }

    /// Build the underlying reqwest client.
    pub fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Version string of the definition this client was built from.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn supports(&self, op: Operation) -> bool {
        self.paths.contains_key(&op)
    }

    /// Fetch the first page described by `params`.
    #[instrument(skip(self, params))]
    pub async fn list<E: Entity>(&self, params: &ListParams) -> Result<Page<E>> {
        let op = Operation::List(E::KIND);
        let mut url = self.url_for(op, None)?;
        url.query_pairs_mut().extend_pairs(params.to_query());
        debug!(operation = op.operation_id(), %url, "List request");
        self.get_json(url).await
    }

    /// Follow a `next` cursor verbatim. The cursor already encodes every
    /// parameter of the original request.
    #[instrument(skip(self))]
    pub async fn list_next<E: Entity>(&self, next_url: &str) -> Result<Page<E>> {
        let url = Url::parse(next_url)?;
        debug!(operation = Operation::List(E::KIND).operation_id(), %url, "Continuation request");
        self.get_json(url).await
    }

    /// Fetch one record by natural key. A 404 becomes [`ApiError::NotFound`].
    #[instrument(skip(self))]
    pub async fn retrieve<E: Entity>(&self, key: &E::Key) -> Result<E> {
        let op = Operation::Retrieve(E::KIND);
        let key = key.to_string();
        let url = self.url_for(op, Some(&key))?;
        debug!(operation = op.operation_id(), %url, "Retrieve request");
        match self.get_json(url).await {
            Err(ApiError::Api { status: 404, .. }) => Err(ApiError::NotFound {
                operation: op.operation_id(),
                key,
            }),
            other => other,
        }
    }

    /// Resolve an operation's path template against the base URL,
    /// substituting `{param}` segments with `key`.
    fn url_for(&self, op: Operation, key: Option<&str>) -> Result<Url> {
        let template = self
            .paths
            .get(&op)
            .ok_or(ApiError::UnknownOperation(op.operation_id()))?;

        let mut url = Url::parse(&format!("{}{}", self.base_url, template))?;

        if let Some(key) = key {
            let segments: Vec<String> = url
                .path_segments()
                .map(|segments| {
                    segments
                        .map(|segment| {
                            if is_placeholder(segment) {
                                key.to_string()
                            } else {
                                segment.to_string()
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();

            url.path_segments_mut()
                .map_err(|_| ApiError::schema("base URL cannot carry a path"))?
                .clear()
                .extend(segments.iter());
        }

        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            };
            return Err(ApiError::api(status.as_u16(), message));
        }

        // Decode from bytes so a malformed body surfaces as ApiError::Json.
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn is_placeholder(segment: &str) -> bool {
    (segment.starts_with('{') && segment.ends_with('}'))
        || (segment.starts_with("%7B") && segment.ends_with("%7D"))
}
