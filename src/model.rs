use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub dim: usize,
    pub distance: Distance,
}

impl CollectionConfig {
    pub fn cosine_1024(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dim: crate::defaults::EMBEDDING_DIM,
            distance: Distance::Cosine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
}

/// One stored embedding plus its source label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
    #[serde(default = "Utc::now", with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    /// Filename of the video this embedding was extracted from.
    pub source: String,
}

/// A ranked match from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub source: String,
    pub score: f32,
}
