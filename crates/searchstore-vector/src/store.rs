//! Azure AI Search vector store
//!
//! Provisions the index lazily, uploads documents in bounded batches,
//! and maps search hits back into documents.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use futures::future::try_join_all;
use futures::{StreamExt, TryStreamExt};
use searchstore_core::{
    Document, Metadatas, QueryType, Result, SearchStoreConfig, StoreError,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::{AzureSearchClient, IndexAction, IndexRecord, SearchHit, SearchQuery};
use crate::embedding::Embeddings;
use crate::mmr::maximal_marginal_relevance;
use crate::schema::build_index_definition;
use crate::{AddOptions, SearchFilter, SearchIndexClient, VectorStore};

/// Largest batch the search service accepts in one indexing request
pub const MAX_UPLOAD_BATCH_SIZE: usize = 1000;

/// Vector store backed by one Azure AI Search index
pub struct AzureSearchStore {
    client: Arc<dyn SearchIndexClient>,
    embeddings: Arc<dyn Embeddings>,
    config: SearchStoreConfig,
    /// Serializes provisioning within this instance; true once this
    /// instance has created the index
    provisioned: Mutex<bool>,
}

impl std::fmt::Debug for AzureSearchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSearchStore")
            .field("index_name", &self.config.index_name)
            .field("dimensions", &self.config.dimensions)
            .field("query_type", &self.config.query_type)
            .finish_non_exhaustive()
    }
}

impl AzureSearchStore {
    /// Create a store talking to the configured endpoint
    pub fn new(config: SearchStoreConfig, embeddings: Arc<dyn Embeddings>) -> Result<Self> {
        let client = AzureSearchClient::new(&config)?;
        Self::with_client(config, Arc::new(client), embeddings)
    }

    /// Create a store over an existing client
    pub fn with_client(
        config: SearchStoreConfig,
        client: Arc<dyn SearchIndexClient>,
        embeddings: Arc<dyn Embeddings>,
    ) -> Result<Self> {
        config.validate()?;
        if embeddings.dimension() != config.dimensions {
            tracing::warn!(
                index = %config.index_name,
                configured = config.dimensions,
                embeddings = embeddings.dimension(),
                "Embedding dimension differs from the index vector field"
            );
        }

        Ok(Self {
            client,
            embeddings,
            config,
            provisioned: Mutex::new(false),
        })
    }

    /// Create a store and add `texts` with their metadata
    pub async fn from_texts(
        texts: Vec<String>,
        metadatas: Metadatas,
        embeddings: Arc<dyn Embeddings>,
        config: SearchStoreConfig,
    ) -> Result<Self> {
        let documents = metadatas.into_documents(texts)?;
        Self::from_documents(&documents, embeddings, config).await
    }

    /// Create a store and add `documents`
    pub async fn from_documents(
        documents: &[Document],
        embeddings: Arc<dyn Embeddings>,
        config: SearchStoreConfig,
    ) -> Result<Self> {
        let store = Self::new(config, embeddings)?;
        store.add_documents(documents, AddOptions::default()).await?;
        Ok(store)
    }

    /// Configuration the store was built with
    pub fn config(&self) -> &SearchStoreConfig {
        &self.config
    }

    /// Create the remote index unless it already exists
    pub async fn ensure_index_exists(&self) -> Result<()> {
        let mut provisioned = self.provisioned.lock().await;
        let index_name = &self.config.index_name;

        if self.client.index_exists(index_name).await? {
            tracing::debug!(index = %index_name, "Search index exists");
            return Ok(());
        }
        if *provisioned {
            tracing::warn!(
                index = %index_name,
                "Search index created by this store is missing, recreating"
            );
        }

        let definition = build_index_definition(&self.config);
        self.client.create_or_update_index(&definition).await?;
        *provisioned = true;

        tracing::info!(
            index = %index_name,
            dimensions = self.config.dimensions,
            "Created search index"
        );
        Ok(())
    }

    /// Embed a text query and return documents with scores
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embeddings.embed_query(query).await?;

        match self.config.query_type {
            QueryType::Similarity => {
                self.similarity_search_vector_with_score(&vector, k, filter)
                    .await
            }
            QueryType::SimilarityHybrid => self.hybrid_search(query, vector, k, filter, None).await,
            QueryType::SemanticHybrid => {
                let name = self.config.semantic_configuration_name.clone().ok_or_else(|| {
                    StoreError::ConfigError(
                        "Semantic hybrid search needs a semantic configuration name".to_string(),
                    )
                })?;
                self.hybrid_search(query, vector, k, filter, Some(name))
                    .await
            }
        }
    }

    async fn hybrid_search(
        &self,
        text: &str,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&SearchFilter>,
        semantic_configuration: Option<String>,
    ) -> Result<Vec<(Document, f32)>> {
        let semantic = semantic_configuration.is_some();
        let query = SearchQuery {
            vector: Some(vector),
            k: Some(k),
            text: Some(text.to_string()),
            semantic_configuration,
            filter: filter.cloned().unwrap_or_default(),
            keys_only: false,
        };

        let hits = self.collect_hits(query, k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| {
                let score = if semantic {
                    hit.reranker_score.unwrap_or(hit.score)
                } else {
                    hit.score
                };
                (hit_to_document(hit.record), score)
            })
            .collect())
    }

    async fn collect_hits(&self, query: SearchQuery, k: usize) -> Result<Vec<SearchHit>> {
        let hits: Vec<SearchHit> = self.client.search(query).take(k).try_collect().await?;
        tracing::debug!(
            index = %self.config.index_name,
            k,
            hits = hits.len(),
            "Search completed"
        );
        Ok(hits)
    }

    /// Documents chosen by maximal marginal relevance among `fetch_k` candidates
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Document>> {
        if !(0.0..=1.0).contains(&lambda) {
            return Err(StoreError::ValidationError(format!(
                "lambda must be within [0, 1], got {lambda}"
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embeddings.embed_query(query).await?;
        let mut filter = filter.cloned().unwrap_or_default();
        filter.include_embeddings = true;

        let fetch_k = fetch_k.max(k);
        let hits = self
            .collect_hits(
                SearchQuery {
                    vector: Some(vector.clone()),
                    k: Some(fetch_k),
                    filter,
                    ..Default::default()
                },
                fetch_k,
            )
            .await?;

        let candidates: Vec<Vec<f32>> = hits
            .iter()
            .map(|hit| hit.record.vector.clone().unwrap_or_default())
            .collect();
        let picked = maximal_marginal_relevance(&vector, &candidates, lambda, k);

        let mut hits: Vec<Option<SearchHit>> = hits.into_iter().map(Some).collect();
        Ok(picked
            .into_iter()
            .filter_map(|i| hits[i].take())
            .map(|hit| hit_to_document(hit.record))
            .collect())
    }

    /// Delete records by key, returning how many keys were sent
    pub async fn delete_by_ids(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        for chunk in ids.chunks(MAX_UPLOAD_BATCH_SIZE) {
            let actions = chunk.iter().map(IndexAction::delete).collect();
            self.client.upload_documents(actions).await?;
        }

        tracing::debug!(index = %self.config.index_name, count = ids.len(), "Deleted documents");
        Ok(ids.len())
    }

    /// Delete every record matching an OData filter expression
    ///
    /// The key lookup carries no `top`, so the service pages through every
    /// match before anything is deleted.
    pub async fn delete_by_filter(&self, filter_expression: &str) -> Result<usize> {
        let query = SearchQuery {
            filter: SearchFilter::expression(filter_expression),
            keys_only: true,
            ..Default::default()
        };

        let keys: Vec<String> = self
            .client
            .search(query)
            .map_ok(|hit| hit.record.key)
            .try_collect()
            .await?;

        self.delete_by_ids(&keys).await
    }
}

#[async_trait]
impl VectorStore for AzureSearchStore {
    async fn add_vectors(
        &self,
        vectors: Vec<Vec<f32>>,
        documents: &[Document],
        options: AddOptions,
    ) -> Result<Vec<String>> {
        if vectors.len() != documents.len() {
            return Err(StoreError::ValidationError(format!(
                "got {} vectors for {} documents",
                vectors.len(),
                documents.len()
            )));
        }

        let dimensions = self.config.dimensions;
        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimensions)
        {
            return Err(StoreError::ValidationError(format!(
                "vector {position} has {} dimensions, index expects {dimensions}",
                vector.len()
            )));
        }

        let keys = match options.ids {
            Some(ids) if ids.len() != documents.len() => {
                return Err(StoreError::ValidationError(format!(
                    "got {} ids for {} documents",
                    ids.len(),
                    documents.len()
                )));
            }
            Some(ids) => ids,
            None => documents
                .iter()
                .map(|_| Uuid::new_v4().to_string())
                .collect(),
        };

        self.ensure_index_exists().await?;

        let batch = UploadBatch::new(self.client.as_ref(), MAX_UPLOAD_BATCH_SIZE);
        try_join_all(
            documents
                .iter()
                .zip(vectors)
                .zip(&keys)
                .map(|((document, vector), key)| {
                    let batch = &batch;
                    async move {
                        let record = document_to_record(key.clone(), document, vector)?;
                        batch.push(IndexAction::upload(record)).await
                    }
                }),
        )
        .await?;
        batch.finish().await?;

        Ok(keys)
    }

    async fn add_documents(
        &self,
        documents: &[Document],
        options: AddOptions,
    ) -> Result<Vec<String>> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let vectors = self.embeddings.embed_documents(&texts).await?;
        self.add_vectors(vectors, documents, options).await
    }

    async fn similarity_search_vector_with_score(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = SearchQuery {
            vector: Some(query.to_vec()),
            k: Some(k),
            filter: filter.cloned().unwrap_or_default(),
            ..Default::default()
        };

        let hits = self.collect_hits(query, k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| (hit_to_document(hit.record), hit.score))
            .collect())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Document>> {
        let results = self.similarity_search_with_score(query, k, filter).await?;
        Ok(results.into_iter().map(|(doc, _)| doc).collect())
    }
}

// ============================================================================
// Batching
// ============================================================================

/// Shared accumulator flushed every `capacity` actions
///
/// Producers may run concurrently; append, size check, and flush happen
/// under one lock so every action is sent exactly once.
struct UploadBatch<'a> {
    client: &'a dyn SearchIndexClient,
    capacity: usize,
    pending: Mutex<Vec<IndexAction>>,
}

impl<'a> UploadBatch<'a> {
    fn new(client: &'a dyn SearchIndexClient, capacity: usize) -> Self {
        Self {
            client,
            capacity,
            pending: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    async fn push(&self, action: IndexAction) -> Result<()> {
        let mut pending = self.pending.lock().await;
        pending.push(action);

        if pending.len() >= self.capacity {
            let actions = std::mem::replace(&mut *pending, Vec::with_capacity(self.capacity));
            tracing::debug!(batch_size = actions.len(), "Uploading batch");
            self.client.upload_documents(actions).await?;
        }

        Ok(())
    }

    async fn finish(self) -> Result<()> {
        let actions = self.pending.into_inner();
        if actions.is_empty() {
            return Ok(());
        }

        tracing::debug!(batch_size = actions.len(), "Uploading final batch");
        self.client.upload_documents(actions).await
    }
}

// ============================================================================
// Record mapping
// ============================================================================

fn document_to_record(key: String, document: &Document, vector: Vec<f32>) -> Result<IndexRecord> {
    Ok(IndexRecord {
        key,
        content: Some(document.page_content.clone()),
        vector: Some(vector),
        metadata: Some(serde_json::to_string(&document.metadata)?),
    })
}

fn hit_to_document(record: IndexRecord) -> Document {
    let metadata = match record.metadata {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str(&raw).unwrap_or(Value::String(raw))
        }
        _ => Value::Null,
    };

    Document {
        page_content: record.content.unwrap_or_default(),
        metadata,
        id: Some(record.key),
    }
}
