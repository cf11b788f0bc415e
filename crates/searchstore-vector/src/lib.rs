//! SearchStore Vector - Vector store over a managed search service
//!
//! Embeds documents, uploads them as flat index records in bounded
//! batches, runs nearest-neighbor queries, and provisions the remote
//! index schema on first write.

use async_trait::async_trait;
use searchstore_core::{Document, Result};
use serde::{Deserialize, Serialize};

pub mod client;
pub mod embedding;
pub mod mmr;
pub mod schema;
pub mod store;

pub use client::{AzureSearchClient, SearchHit, SearchIndexClient, SearchQuery};
pub use embedding::{create_embeddings, Embeddings, OllamaEmbedding, OpenAiEmbedding};
pub use store::{AzureSearchStore, MAX_UPLOAD_BATCH_SIZE};

/// Options for adding documents
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Record keys, one per document in input order
    pub ids: Option<Vec<String>>,
}

impl AddOptions {
    pub fn with_ids(ids: Vec<String>) -> Self {
        Self { ids: Some(ids) }
    }
}

/// Extra options merged into a search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// OData `$filter` expression
    pub filter_expression: Option<String>,

    /// Whether the filter runs before or after the vector search
    pub vector_filter_mode: Option<VectorFilterMode>,

    /// Return stored vectors with each hit
    pub include_embeddings: bool,
}

impl SearchFilter {
    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            filter_expression: Some(expression.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VectorFilterMode {
    PreFilter,
    PostFilter,
}

/// Trait for vector store operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add documents with precomputed vectors, returning their keys in input order
    async fn add_vectors(
        &self,
        vectors: Vec<Vec<f32>>,
        documents: &[Document],
        options: AddOptions,
    ) -> Result<Vec<String>>;

    /// Embed and add documents, returning their keys in input order
    async fn add_documents(&self, documents: &[Document], options: AddOptions)
        -> Result<Vec<String>>;

    /// Nearest neighbors of a vector, in service ranking order
    async fn similarity_search_vector_with_score(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f32)>>;

    /// Embed a text query and return the matching documents
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Document>>;
}
