//! SearchStore Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with defaults matching the search service's out-of-the-box schema.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Search service and index configuration
    pub search: SearchStoreConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overwrite every field whose environment variable is set
    fn apply_env(self) -> Result<Self, ConfigError> {
        let mut config = self;

        // Search service
        if let Ok(endpoint) = std::env::var("AZURE_SEARCH_ENDPOINT") {
            config.search.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("AZURE_SEARCH_KEY") {
            config.search.api_key = Some(key);
        }
        if let Ok(index) = std::env::var("AZURE_SEARCH_INDEX") {
            config.search.index_name = index;
        }
        if let Ok(name) = std::env::var("AZURE_SEARCH_SEMANTIC_CONFIG") {
            config.search.semantic_configuration_name = Some(name);
        }
        if let Ok(version) = std::env::var("AZURE_SEARCH_API_VERSION") {
            config.search.api_version = version;
        }
        if let Ok(query_type) = std::env::var("AZURE_SEARCH_QUERY_TYPE") {
            config.search.query_type = query_type.parse()?;
        }
        if let Ok(dimensions) = std::env::var("VECTOR_DIMENSIONS") {
            config.search.dimensions =
                dimensions.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "VECTOR_DIMENSIONS".to_string(),
                    value: dimensions,
                })?;
        }

        // Embeddings
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.embedding.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.embedding.openai_base_url = url;
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.embedding.ollama_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            message: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    ///
    /// A variable that is set wins even when it holds the default value.
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.apply_env()
    }
}

// ============================================================================
// Search Store
// ============================================================================

/// Connection, schema, and query settings for one remote index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchStoreConfig {
    /// Service endpoint, e.g. `https://<service>.search.windows.net`
    pub endpoint: String,

    /// Admin or query API key
    pub api_key: Option<String>,

    /// Remote index name
    pub index_name: String,

    /// Semantic configuration to create and use for semantic ranking
    pub semantic_configuration_name: Option<String>,

    /// Field names of the index schema
    pub fields: FieldNames,

    /// Vector search algorithm settings
    pub algorithm: VectorSearchAlgorithmConfig,

    /// Vector dimensionality (must match the embedding model)
    pub dimensions: usize,

    /// How text queries are issued
    pub query_type: QueryType,

    /// REST API version sent with every request
    pub api_version: String,

    /// Optional user agent suffix
    pub user_agent: Option<String>,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            index_name: "documents".to_string(),
            semantic_configuration_name: None,
            fields: FieldNames::default(),
            algorithm: VectorSearchAlgorithmConfig::default(),
            dimensions: 1536, // OpenAI text-embedding-3-small
            query_type: QueryType::Similarity,
            api_version: "2023-11-01".to_string(),
            user_agent: None,
            timeout_secs: 60,
        }
    }
}

impl SearchStoreConfig {
    /// Check the schema-related settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("index_name".to_string()));
        }
        if self.dimensions == 0 {
            return Err(ConfigError::InvalidValue {
                key: "dimensions".to_string(),
                value: "0".to_string(),
            });
        }
        if self.algorithm.name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("algorithm.name".to_string()));
        }

        let names = self.fields.as_array();
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::MissingRequired("field name".to_string()));
            }
            if names[..i].contains(name) {
                return Err(ConfigError::InvalidValue {
                    key: "fields".to_string(),
                    value: format!("duplicate field name '{name}'"),
                });
            }
        }

        if self.query_type == QueryType::SemanticHybrid
            && self.semantic_configuration_name.is_none()
        {
            return Err(ConfigError::MissingRequired(
                "semantic_configuration_name (required for semantic_hybrid)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Names of the four index fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Key field
    pub id: String,

    /// Searchable text field
    pub content: String,

    /// Vector field
    pub content_vector: String,

    /// Serialized metadata field
    pub metadata: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            content: "content".to_string(),
            content_vector: "content_vector".to_string(),
            metadata: "metadata".to_string(),
        }
    }
}

impl FieldNames {
    fn as_array(&self) -> [&str; 4] {
        [&self.id, &self.content, &self.content_vector, &self.metadata]
    }
}

/// Named approximate nearest neighbor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSearchAlgorithmConfig {
    /// Configuration name referenced by the vector field's profile
    pub name: String,

    /// Algorithm kind
    pub kind: AlgorithmKind,

    /// Algorithm parameters
    pub parameters: HnswParameters,
}

impl Default for VectorSearchAlgorithmConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            kind: AlgorithmKind::Hnsw,
            parameters: HnswParameters::default(),
        }
    }
}

/// Vector search algorithm kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlgorithmKind {
    Hnsw,
    ExhaustiveKnn,
}

/// HNSW graph parameters (only `metric` applies to exhaustive KNN)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswParameters {
    /// Bi-directional links per node
    pub m: u32,

    /// Candidate list size at build time
    pub ef_construction: u32,

    /// Candidate list size at query time
    pub ef_search: u32,

    /// Similarity metric
    pub metric: DistanceMetric,
}

impl Default for HnswParameters {
    fn default() -> Self {
        Self {
            m: 4,
            ef_construction: 400,
            ef_search: 500,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Vector similarity metrics understood by the search service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    DotProduct,
}

/// How text queries are turned into search requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Pure vector query
    #[default]
    Similarity,
    /// Vector query combined with full-text search
    SimilarityHybrid,
    /// Hybrid query reranked by the semantic configuration
    SemanticHybrid,
}

impl std::str::FromStr for QueryType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "similarity" => Ok(Self::Similarity),
            "similarity_hybrid" | "hybrid" => Ok(Self::SimilarityHybrid),
            "semantic_hybrid" | "semantic" => Ok(Self::SemanticHybrid),
            _ => Err(ConfigError::InvalidValue {
                key: "AZURE_SEARCH_QUERY_TYPE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Embeddings
// ============================================================================

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider to use
    pub provider: EmbeddingProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub openai_base_url: String,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl From<ConfigError> for crate::StoreError {
    fn from(err: ConfigError) -> Self {
        crate::StoreError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.search.index_name, "documents");
        assert_eq!(config.search.dimensions, 1536);
        assert_eq!(config.search.fields.id, "id");
        assert_eq!(config.search.fields.content, "content");
        assert_eq!(config.search.fields.content_vector, "content_vector");
        assert_eq!(config.search.fields.metadata, "metadata");
        assert_eq!(config.search.query_type, QueryType::Similarity);
    }

    #[test]
    fn test_default_algorithm() {
        let algorithm = VectorSearchAlgorithmConfig::default();
        assert_eq!(algorithm.name, "default");
        assert_eq!(algorithm.kind, AlgorithmKind::Hnsw);
        assert_eq!(algorithm.parameters.m, 4);
        assert_eq!(algorithm.parameters.ef_construction, 400);
        assert_eq!(algorithm.parameters.ef_search, 500);
        assert_eq!(algorithm.parameters.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn test_query_type_parse() {
        assert_eq!(
            "similarity".parse::<QueryType>().unwrap(),
            QueryType::Similarity
        );
        assert_eq!(
            "similarity-hybrid".parse::<QueryType>().unwrap(),
            QueryType::SimilarityHybrid
        );
        assert_eq!(
            "SEMANTIC_HYBRID".parse::<QueryType>().unwrap(),
            QueryType::SemanticHybrid
        );
        assert!("fuzzy".parse::<QueryType>().is_err());
    }

    #[test]
    fn test_embedding_provider_parse() {
        assert_eq!(
            "openai".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::OpenAI
        );
        assert_eq!(
            "Ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert!("invalid".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let mut config = SearchStoreConfig::default();
        assert!(config.validate().is_ok());

        config.fields.metadata = "content".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_semantic_hybrid_needs_configuration() {
        let mut config = SearchStoreConfig {
            query_type: QueryType::SemanticHybrid,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.semantic_configuration_name = Some("semantic".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_dimensions() {
        let config = SearchStoreConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [search]
            endpoint = "https://example.search.windows.net"
            index_name = "kb"
            query_type = "similarity_hybrid"

            [search.algorithm.parameters]
            metric = "dotProduct"
            "#,
        )
        .unwrap();

        assert_eq!(config.search.endpoint, "https://example.search.windows.net");
        assert_eq!(config.search.index_name, "kb");
        assert_eq!(config.search.query_type, QueryType::SimilarityHybrid);
        assert_eq!(
            config.search.algorithm.parameters.metric,
            DistanceMetric::DotProduct
        );
        assert_eq!(config.search.algorithm.parameters.m, 4);
        assert_eq!(config.search.fields, FieldNames::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides_file_values() {
        const VARS: [(&str, &str); 6] = [
            ("EMBEDDING_MODEL", "nomic-embed-text"),
            ("AZURE_SEARCH_QUERY_TYPE", "similarity_hybrid"),
            ("AZURE_SEARCH_API_VERSION", "2024-07-01"),
            ("OLLAMA_URL", "http://ollama:11434"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "json"),
        ];
        for (key, value) in VARS {
            std::env::set_var(key, value);
        }

        let file: AppConfig = toml::from_str(
            r#"
            [search]
            index_name = "kb"
            api_version = "2023-11-01"

            [embedding]
            model = "from-file"
            openai_base_url = "https://proxy.example/v1"

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();
        let merged = file.with_env_override();

        for (key, _) in VARS {
            std::env::remove_var(key);
        }
        let config = merged.unwrap();

        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.search.query_type, QueryType::SimilarityHybrid);
        assert_eq!(config.search.api_version, "2024-07-01");
        assert_eq!(config.embedding.ollama_url, "http://ollama:11434");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        // Unset variables leave file values alone
        assert_eq!(config.search.index_name, "kb");
        assert_eq!(config.embedding.openai_base_url, "https://proxy.example/v1");
    }
}
