//! Search service client
//!
//! `SearchIndexClient` is the seam between the vector store and the remote
//! service. `AzureSearchClient` implements it over the Azure AI Search REST
//! API; tests substitute an in-memory service.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use searchstore_core::{FieldNames, Result, SearchStoreConfig, StoreError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::schema::IndexDefinition;
use crate::SearchFilter;

// ============================================================================
// Records and queries
// ============================================================================

/// One flat record of the index
///
/// Field names are resolved through [`FieldNames`] when the record is put
/// on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub key: String,
    pub content: Option<String>,
    pub vector: Option<Vec<f32>>,
    /// Serialized JSON metadata
    pub metadata: Option<String>,
}

impl IndexRecord {
    /// A record carrying only its key, used for deletes
    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: None,
            vector: None,
            metadata: None,
        }
    }
}

/// Per-record action of an indexing batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexActionKind {
    Upload,
    Delete,
}

impl IndexActionKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexAction {
    pub kind: IndexActionKind,
    pub record: IndexRecord,
}

impl IndexAction {
    pub fn upload(record: IndexRecord) -> Self {
        Self {
            kind: IndexActionKind::Upload,
            record,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: IndexActionKind::Delete,
            record: IndexRecord::key_only(key),
        }
    }
}

/// A search request against the configured index
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Query vector; `None` for filter-only queries
    pub vector: Option<Vec<f32>>,

    /// Number of nearest neighbors, also the page size; `None` lets the
    /// service page through every match
    pub k: Option<usize>,

    /// Full-text query for hybrid search
    pub text: Option<String>,

    /// Semantic configuration to rerank with
    pub semantic_configuration: Option<String>,

    /// Caller supplied filter options
    pub filter: SearchFilter,

    /// Only retrieve record keys
    pub keys_only: bool,
}

/// One result of a search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: IndexRecord,
    pub score: f32,
    pub reranker_score: Option<f32>,
}

// ============================================================================
// Client trait
// ============================================================================

/// Operations consumed from the remote search service
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    /// Whether the named index exists
    async fn index_exists(&self, index_name: &str) -> Result<bool>;

    /// Create the index, or update it in place if it exists
    async fn create_or_update_index(&self, definition: &IndexDefinition) -> Result<()>;

    /// Apply one batch of index actions (at most 1000)
    async fn upload_documents(&self, actions: Vec<IndexAction>) -> Result<()>;

    /// Run a query, yielding hits in service ranking order
    fn search(&self, query: SearchQuery) -> BoxStream<'_, Result<SearchHit>>;
}

// ============================================================================
// Azure AI Search REST client
// ============================================================================

/// REST client for one Azure AI Search index
#[derive(Clone)]
pub struct AzureSearchClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    api_version: String,
    index_name: String,
    fields: FieldNames,
}

impl std::fmt::Debug for AzureSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSearchClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("index_name", &self.index_name)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<Map<String, Value>>,
    #[serde(rename = "@search.nextPageParameters")]
    next_page_parameters: Option<Value>,
}

impl AzureSearchClient {
    /// Create a client from config
    pub fn new(config: &SearchStoreConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(StoreError::ConfigError(
                "Search service endpoint required".to_string(),
            ));
        }

        let user_agent = match &config.user_agent {
            Some(suffix) => format!("searchstore/{} {suffix}", env!("CARGO_PKG_VERSION")),
            None => format!("searchstore/{}", env!("CARGO_PKG_VERSION")),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| StoreError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            index_name: config.index_name.clone(),
            fields: config.fields.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.endpoint))
            .query(&[("api-version", self.api_version.as_str())]);

        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::TransportError(format!("Search request failed: {e}")))
    }

    async fn service_error(response: Response) -> StoreError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        StoreError::ServiceError { status, message }
    }

    fn action_body(&self, action: &IndexAction) -> Value {
        let mut doc = Map::new();
        doc.insert(
            "@search.action".to_string(),
            Value::String(action.kind.as_str().to_string()),
        );
        doc.insert(
            self.fields.id.clone(),
            Value::String(action.record.key.clone()),
        );

        let record = &action.record;
        if let Some(content) = &record.content {
            doc.insert(self.fields.content.clone(), Value::String(content.clone()));
        }
        if let Some(vector) = &record.vector {
            doc.insert(self.fields.content_vector.clone(), json!(vector));
        }
        if let Some(metadata) = &record.metadata {
            doc.insert(self.fields.metadata.clone(), Value::String(metadata.clone()));
        }

        Value::Object(doc)
    }

    fn search_body(&self, query: &SearchQuery) -> Value {
        let fields = &self.fields;
        let mut body = Map::new();

        body.insert(
            "search".to_string(),
            Value::String(query.text.clone().unwrap_or_else(|| "*".to_string())),
        );
        if let Some(k) = query.k {
            body.insert("top".to_string(), json!(k));
        }

        if let Some(vector) = &query.vector {
            let mut vector_query = json!({
                "kind": "vector",
                "vector": vector,
                "fields": fields.content_vector,
            });
            if let Some(k) = query.k {
                vector_query["k"] = json!(k);
            }
            body.insert("vectorQueries".to_string(), json!([vector_query]));
        }

        if let Some(name) = &query.semantic_configuration {
            body.insert("queryType".to_string(), json!("semantic"));
            body.insert("semanticConfiguration".to_string(), json!(name));
        }

        if let Some(expression) = &query.filter.filter_expression {
            body.insert("filter".to_string(), json!(expression));
        }
        if let Some(mode) = query.filter.vector_filter_mode {
            body.insert("vectorFilterMode".to_string(), json!(mode));
        }

        let select = if query.keys_only {
            fields.id.clone()
        } else if query.filter.include_embeddings {
            format!(
                "{},{},{},{}",
                fields.id, fields.content, fields.metadata, fields.content_vector
            )
        } else {
            format!("{},{},{}", fields.id, fields.content, fields.metadata)
        };
        body.insert("select".to_string(), Value::String(select));

        Value::Object(body)
    }

    fn parse_hit(&self, mut doc: Map<String, Value>) -> Result<SearchHit> {
        let score = doc
            .remove("@search.score")
            .and_then(|v| v.as_f64())
            .unwrap_or_default() as f32;
        let reranker_score = doc
            .remove("@search.rerankerScore")
            .and_then(|v| v.as_f64())
            .map(|s| s as f32);

        let key = match doc.remove(&self.fields.id) {
            Some(Value::String(key)) => key,
            _ => {
                return Err(StoreError::ServiceError {
                    status: StatusCode::OK.as_u16(),
                    message: format!("Search result is missing key field '{}'", self.fields.id),
                })
            }
        };

        let content = doc
            .remove(&self.fields.content)
            .and_then(|v| v.as_str().map(str::to_string));
        let metadata = doc
            .remove(&self.fields.metadata)
            .and_then(|v| v.as_str().map(str::to_string));
        let vector = doc
            .remove(&self.fields.content_vector)
            .map(serde_json::from_value::<Vec<f32>>)
            .transpose()?;

        Ok(SearchHit {
            record: IndexRecord {
                key,
                content,
                vector,
                metadata,
            },
            score,
            reranker_score,
        })
    }

    /// Fetch one page; the state is the body of the next request, if any
    async fn next_page(
        &self,
        body: Option<Value>,
    ) -> Result<Option<(Vec<SearchHit>, Option<Value>)>> {
        let Some(body) = body else {
            return Ok(None);
        };

        let path = format!("/indexes/{}/docs/search", self.index_name);
        let response = Self::send(self.request(reqwest::Method::POST, &path).json(&body)).await?;

        if !response.status().is_success() {
            return Err(Self::service_error(response).await);
        }

        let page: SearchResponse = response.json().await.map_err(|e| {
            StoreError::TransportError(format!("Failed to parse search response: {e}"))
        })?;

        let hits = page
            .value
            .into_iter()
            .map(|doc| self.parse_hit(doc))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some((hits, page.next_page_parameters)))
    }
}

#[async_trait]
impl SearchIndexClient for AzureSearchClient {
    async fn index_exists(&self, index_name: &str) -> Result<bool> {
        let path = format!("/indexes/{index_name}");
        let response = Self::send(self.request(reqwest::Method::GET, &path)).await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::service_error(response).await),
        }
    }

    async fn create_or_update_index(&self, definition: &IndexDefinition) -> Result<()> {
        let path = format!("/indexes/{}", definition.name);
        let response =
            Self::send(self.request(reqwest::Method::PUT, &path).json(definition)).await?;

        if !response.status().is_success() {
            return Err(Self::service_error(response).await);
        }

        Ok(())
    }

    async fn upload_documents(&self, actions: Vec<IndexAction>) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }

        let body = json!({
            "value": actions.iter().map(|a| self.action_body(a)).collect::<Vec<_>>(),
        });
        let path = format!("/indexes/{}/docs/index", self.index_name);
        let response = Self::send(self.request(reqwest::Method::POST, &path).json(&body)).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::service_error(response).await);
        }

        let result: IndexingResponse = response.json().await.map_err(|e| {
            StoreError::TransportError(format!("Failed to parse indexing response: {e}"))
        })?;

        // 207 Multi-Status reports per-key failures
        let failed: Vec<String> = result
            .value
            .into_iter()
            .filter(|r| !r.status)
            .map(|r| match r.error_message {
                Some(message) => format!("{}: {message}", r.key),
                None => r.key,
            })
            .collect();

        if !failed.is_empty() {
            tracing::warn!(count = failed.len(), "Search service rejected documents");
            return Err(StoreError::ServiceError {
                status: status.as_u16(),
                message: format!("Rejected documents: {}", failed.join(", ")),
            });
        }

        Ok(())
    }

    fn search(&self, query: SearchQuery) -> BoxStream<'_, Result<SearchHit>> {
        let first = self.search_body(&query);

        stream::try_unfold(Some(first), move |body| self.next_page(body))
            .map_ok(|hits| stream::iter(hits.into_iter().map(Ok::<_, StoreError>)))
            .try_flatten()
            .boxed()
    }
}

// ============================================================================
// Tests
// ============================================================================
