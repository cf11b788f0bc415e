//! SearchStore Core - Document model, errors, and shared configuration
//!
//! This crate defines the abstractions shared by the vector store adapters:
//! - The `Document` value passed in and out of a vector store
//! - Common error types
//! - Metadata fan-out for text-based construction helpers
//! - Configuration management
//! - Tracing setup

pub mod config;
pub mod telemetry;

pub use config::{
    AlgorithmKind, AppConfig, ConfigError, DistanceMetric, EmbeddingConfig, EmbeddingProvider,
    FieldNames, HnswParameters, LoggingConfig, QueryType, SearchStoreConfig,
    VectorSearchAlgorithmConfig,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for SearchStore operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Non-success response from the remote search service
    #[error("Search service error (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Documents
// ============================================================================

/// A unit of text stored in, and returned from, a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text that is embedded and indexed
    pub page_content: String,

    /// Arbitrary structured metadata
    #[serde(default)]
    pub metadata: Value,

    /// Record key, populated on documents returned from a search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Document {
    /// Create a document with empty object metadata
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Value::Object(serde_json::Map::new()),
            id: None,
        }
    }

    /// Replace the metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach a record key
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Metadata supplied alongside raw texts
#[derive(Debug, Clone, PartialEq)]
pub enum Metadatas {
    /// One value applied to every text
    Shared(Value),
    /// One value per text, positionally aligned
    PerText(Vec<Value>),
}

impl Default for Metadatas {
    fn default() -> Self {
        Self::Shared(Value::Object(serde_json::Map::new()))
    }
}

impl Metadatas {
    /// Pair each text with its metadata
    ///
    /// A `PerText` list must have exactly one entry per text.
    pub fn into_documents(self, texts: Vec<String>) -> Result<Vec<Document>> {
        match self {
            Self::Shared(metadata) => Ok(texts
                .into_iter()
                .map(|text| Document::new(text).with_metadata(metadata.clone()))
                .collect()),
            Self::PerText(metadatas) => {
                if metadatas.len() != texts.len() {
                    return Err(StoreError::ValidationError(format!(
                        "expected {} metadata entries, got {}",
                        texts.len(),
                        metadatas.len()
                    )));
                }

                Ok(texts
                    .into_iter()
                    .zip(metadatas)
                    .map(|(text, metadata)| Document::new(text).with_metadata(metadata))
                    .collect())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_builder() {
        let doc = Document::new("hello")
            .with_metadata(json!({"source": "a.txt"}))
            .with_id("doc-1");

        assert_eq!(doc.page_content, "hello");
        assert_eq!(doc.metadata["source"], "a.txt");
        assert_eq!(doc.id.as_deref(), Some("doc-1"));
    }

    #[test]
    fn test_document_serde_skips_missing_id() {
        let doc = Document::new("hello");
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("id").is_none());

        let parsed: Document = serde_json::from_value(json!({"page_content": "x"})).unwrap();
        assert_eq!(parsed.metadata, Value::Null);
    }

    #[test]
    fn test_shared_metadata_applies_to_every_text() {
        let docs = Metadatas::Shared(json!({"lang": "en"}))
            .into_documents(vec!["a".to_string(), "b".to_string()])
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.metadata == json!({"lang": "en"})));
    }

    #[test]
    fn test_per_text_metadata_is_positional() {
        let docs = Metadatas::PerText(vec![json!({"tag": 1}), json!({"tag": 2})])
            .into_documents(vec!["a".to_string(), "b".to_string()])
            .unwrap();

        assert_eq!(docs[0].page_content, "a");
        assert_eq!(docs[0].metadata, json!({"tag": 1}));
        assert_eq!(docs[1].metadata, json!({"tag": 2}));
    }

    #[test]
    fn test_per_text_metadata_length_mismatch() {
        let err = Metadatas::PerText(vec![json!({})])
            .into_documents(vec!["a".to_string(), "b".to_string()])
            .unwrap_err();

        assert!(matches!(err, StoreError::ValidationError(_)));
    }
}
