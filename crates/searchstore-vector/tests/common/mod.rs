//! Test doubles shared by the integration tests
//!
//! Author: hephaex@gmail.com

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use searchstore_core::{Document, Result, StoreError};
use searchstore_vector::client::{IndexAction, IndexActionKind, IndexRecord};
use searchstore_vector::mmr::cosine_similarity;
use searchstore_vector::schema::IndexDefinition;
use searchstore_vector::{Embeddings, SearchHit, SearchIndexClient, SearchQuery};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Embeddings
// ============================================================================

/// Deterministic character-bucket embeddings
pub struct FakeEmbeddings {
    dimension: usize,
    pub document_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
}

impl FakeEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            document_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            vector[(byte as usize + i) % self.dimension] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Search service
// ============================================================================

#[derive(Debug, Default)]
pub struct ServiceState {
    pub indexes: HashMap<String, IndexDefinition>,
    /// Stored records in insertion order
    pub records: Vec<IndexRecord>,
    /// Size of every upload call
    pub batches: Vec<usize>,
    pub exists_calls: usize,
    pub create_calls: usize,
    pub queries: Vec<SearchQuery>,
    /// Fail the upload call with this zero-based position
    pub fail_batch: Option<usize>,
}

/// In-memory stand-in for the remote search service
#[derive(Default)]
pub struct InMemorySearchService {
    pub state: Mutex<ServiceState>,
}

impl InMemorySearchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that already hosts `index_name`
    pub fn with_index(index_name: &str) -> Self {
        let service = Self::new();
        service.state.lock().unwrap().indexes.insert(
            index_name.to_string(),
            IndexDefinition {
                name: index_name.to_string(),
                fields: Vec::new(),
                vector_search: searchstore_vector::schema::VectorSearch {
                    algorithms: Vec::new(),
                    profiles: Vec::new(),
                },
                semantic: None,
            },
        );
        service
    }

    /// Remove an index as an out-of-band admin action would
    pub fn drop_index(&self, index_name: &str) {
        self.state.lock().unwrap().indexes.remove(index_name);
    }

    pub fn fail_batch(&self, position: usize) {
        self.state.lock().unwrap().fail_batch = Some(position);
    }

    pub fn batches(&self) -> Vec<usize> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn record(&self, key: &str) -> Option<IndexRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.key == key)
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

#[async_trait]
impl SearchIndexClient for InMemorySearchService {
    async fn index_exists(&self, index_name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.exists_calls += 1;
        Ok(state.indexes.contains_key(index_name))
    }

    async fn create_or_update_index(&self, definition: &IndexDefinition) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        state
            .indexes
            .insert(definition.name.clone(), definition.clone());
        Ok(())
    }

    async fn upload_documents(&self, actions: Vec<IndexAction>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let position = state.batches.len();
        state.batches.push(actions.len());

        if state.fail_batch == Some(position) {
            return Err(StoreError::ServiceError {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        for action in actions {
            state.records.retain(|r| r.key != action.record.key);
            if action.kind == IndexActionKind::Upload {
                state.records.push(action.record);
            }
        }
        Ok(())
    }

    fn search(&self, query: SearchQuery) -> BoxStream<'_, Result<SearchHit>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());

        let mut hits: Vec<SearchHit> = state
            .records
            .iter()
            .map(|record| {
                let score = match (&query.vector, &record.vector) {
                    (Some(q), Some(v)) => cosine_similarity(q, v),
                    _ => 1.0,
                };
                let mut record = record.clone();
                if !query.filter.include_embeddings {
                    record.vector = None;
                }
                if query.keys_only {
                    record = IndexRecord::key_only(record.key);
                }
                SearchHit {
                    record,
                    score,
                    reranker_score: query.semantic_configuration.as_ref().map(|_| score * 4.0),
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        stream::iter(hits.into_iter().map(Ok)).boxed()
    }
}

/// `count` documents with positional content and metadata
pub fn numbered_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            Document::new(format!("document number {i}"))
                .with_metadata(serde_json::json!({ "position": i }))
        })
        .collect()
}
