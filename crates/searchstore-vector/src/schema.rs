//! Index schema sent to the search service on first write
//!
//! The shape is fixed: a key field, a searchable content field, a vector
//! field bound to a vector search profile, and a searchable metadata field
//! holding serialized JSON. Only names, dimensions, and algorithm settings
//! come from configuration.

use searchstore_core::{AlgorithmKind, DistanceMetric, SearchStoreConfig};
use serde::{Deserialize, Serialize};

const EDM_STRING: &str = "Edm.String";
const EDM_SINGLE_COLLECTION: &str = "Collection(Edm.Single)";

/// Index definition body for `PUT /indexes/{name}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub vector_search: VectorSearch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticSearch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

impl FieldDefinition {
    fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: EDM_STRING.to_string(),
            key: false,
            filterable: None,
            searchable: None,
            dimensions: None,
            vector_search_profile: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearch {
    pub algorithms: Vec<AlgorithmDefinition>,
    pub profiles: Vec<VectorSearchProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmDefinition {
    pub name: String,
    pub kind: AlgorithmKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw_parameters: Option<HnswDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaustive_knn_parameters: Option<ExhaustiveKnnDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswDefinition {
    pub m: u32,
    pub ef_construction: u32,
    pub ef_search: u32,
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustiveKnnDefinition {
    pub metric: DistanceMetric,
}

/// Binds a vector field to an algorithm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchProfile {
    pub name: String,
    pub algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSearch {
    pub configurations: Vec<SemanticConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticConfiguration {
    pub name: String,
    pub prioritized_fields: PrioritizedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedFields {
    pub prioritized_content_fields: Vec<SemanticField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticField {
    pub field_name: String,
}

/// Build the index definition for a store configuration
pub fn build_index_definition(config: &SearchStoreConfig) -> IndexDefinition {
    let fields = &config.fields;
    let algorithm = &config.algorithm;
    // Profiles and algorithms live in separate namespaces, so the profile
    // reuses the algorithm configuration name.
    let profile = algorithm.name.clone();

    let (hnsw_parameters, exhaustive_knn_parameters) = match algorithm.kind {
        AlgorithmKind::Hnsw => (
            Some(HnswDefinition {
                m: algorithm.parameters.m,
                ef_construction: algorithm.parameters.ef_construction,
                ef_search: algorithm.parameters.ef_search,
                metric: algorithm.parameters.metric,
            }),
            None,
        ),
        AlgorithmKind::ExhaustiveKnn => (
            None,
            Some(ExhaustiveKnnDefinition {
                metric: algorithm.parameters.metric,
            }),
        ),
    };

    IndexDefinition {
        name: config.index_name.clone(),
        fields: vec![
            FieldDefinition {
                key: true,
                filterable: Some(true),
                ..FieldDefinition::string(&fields.id)
            },
            FieldDefinition {
                searchable: Some(true),
                ..FieldDefinition::string(&fields.content)
            },
            FieldDefinition {
                field_type: EDM_SINGLE_COLLECTION.to_string(),
                searchable: Some(true),
                dimensions: Some(config.dimensions),
                vector_search_profile: Some(profile.clone()),
                ..FieldDefinition::string(&fields.content_vector)
            },
            FieldDefinition {
                searchable: Some(true),
                ..FieldDefinition::string(&fields.metadata)
            },
        ],
        vector_search: VectorSearch {
            algorithms: vec![AlgorithmDefinition {
                name: algorithm.name.clone(),
                kind: algorithm.kind,
                hnsw_parameters,
                exhaustive_knn_parameters,
            }],
            profiles: vec![VectorSearchProfile {
                name: profile,
                algorithm: algorithm.name.clone(),
            }],
        },
        semantic: config
            .semantic_configuration_name
            .as_ref()
            .map(|name| SemanticSearch {
                configurations: vec![SemanticConfiguration {
                    name: name.clone(),
                    prioritized_fields: PrioritizedFields {
                        prioritized_content_fields: vec![SemanticField {
                            field_name: fields.content.clone(),
                        }],
                    },
                }],
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchstore_core::{FieldNames, VectorSearchAlgorithmConfig};
    use serde_json::json;

    #[test]
    fn test_default_definition_json() {
        let definition = build_index_definition(&SearchStoreConfig::default());
        let value = serde_json::to_value(&definition).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "documents",
                "fields": [
                    {"name": "id", "type": "Edm.String", "key": true, "filterable": true},
                    {"name": "content", "type": "Edm.String", "searchable": true},
                    {
                        "name": "content_vector",
                        "type": "Collection(Edm.Single)",
                        "searchable": true,
                        "dimensions": 1536,
                        "vectorSearchProfile": "default"
                    },
                    {"name": "metadata", "type": "Edm.String", "searchable": true}
                ],
                "vectorSearch": {
                    "algorithms": [{
                        "name": "default",
                        "kind": "hnsw",
                        "hnswParameters": {
                            "m": 4,
                            "efConstruction": 400,
                            "efSearch": 500,
                            "metric": "cosine"
                        }
                    }],
                    "profiles": [{"name": "default", "algorithm": "default"}]
                }
            })
        );
    }

    #[test]
    fn test_custom_field_names_and_semantic() {
        let config = SearchStoreConfig {
            index_name: "kb".to_string(),
            semantic_configuration_name: Some("kb-semantic".to_string()),
            fields: FieldNames {
                id: "key".to_string(),
                content: "text".to_string(),
                content_vector: "embedding".to_string(),
                metadata: "meta".to_string(),
            },
            dimensions: 3,
            ..Default::default()
        };
        let definition = build_index_definition(&config);

        let names: Vec<_> = definition.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["key", "text", "embedding", "meta"]);
        assert_eq!(definition.fields[2].dimensions, Some(3));

        let semantic = definition.semantic.unwrap();
        assert_eq!(semantic.configurations[0].name, "kb-semantic");
        assert_eq!(
            semantic.configurations[0].prioritized_fields.prioritized_content_fields[0].field_name,
            "text"
        );
    }

    #[test]
    fn test_exhaustive_knn() {
        let config = SearchStoreConfig {
            algorithm: VectorSearchAlgorithmConfig {
                name: "flat".to_string(),
                kind: AlgorithmKind::ExhaustiveKnn,
                ..Default::default()
            },
            ..Default::default()
        };
        let value = serde_json::to_value(build_index_definition(&config)).unwrap();
        let algorithm = &value["vectorSearch"]["algorithms"][0];

        assert_eq!(algorithm["kind"], "exhaustiveKnn");
        assert_eq!(algorithm["exhaustiveKnnParameters"]["metric"], "cosine");
        assert!(algorithm.get("hnswParameters").is_none());
        assert_eq!(value["fields"][2]["vectorSearchProfile"], "flat");
    }
}
