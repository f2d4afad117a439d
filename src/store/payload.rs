//! Payload schema for Qdrant points

use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// A point ready to be upserted to Qdrant
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl ChunkPoint {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Payload stored with each chunk in Qdrant.
///
/// `embedding_provider` is part of the payload so searches can be
/// constrained to vectors that are comparable with the query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Document ID (stable per ingested document)
    pub document_id: String,

    /// Original filename or URL label
    pub filename: String,

    /// Chunk index within the document
    pub chunk_index: i64,

    /// Provider that produced this vector
    pub embedding_provider: String,

    /// When this chunk was written
    pub created_at: String,
}

impl ChunkPayload {
    pub fn new(
        document_id: String,
        filename: String,
        chunk_index: i64,
        embedding_provider: String,
        created_at: String,
    ) -> Self {
        Self {
            document_id,
            filename,
            chunk_index,
            embedding_provider,
            created_at,
        }
    }

    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert(
            "document_id".to_string(),
            string_to_qdrant(&self.document_id),
        );
        map.insert("filename".to_string(), string_to_qdrant(&self.filename));
        map.insert("chunk_index".to_string(), int_to_qdrant(self.chunk_index));
        map.insert(
            "embedding_provider".to_string(),
            string_to_qdrant(&self.embedding_provider),
        );
        map.insert("created_at".to_string(), string_to_qdrant(&self.created_at));

        map
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(
            s.to_string(),
        )),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)),
    }
}

impl From<Map<String, Value>> for ChunkPayload {
    fn from(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map)).unwrap_or_else(|_| ChunkPayload {
            document_id: String::new(),
            filename: String::new(),
            chunk_index: 0,
            embedding_provider: String::new(),
            created_at: String::new(),
        })
    }
}
