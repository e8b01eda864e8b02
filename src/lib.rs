//! Video Similarity Search Backend
//!
//! Per-user embedded vector collections over video embeddings produced by an
//! external classifier process, with nearest-neighbor retrieval.

pub mod bot;
pub mod config;
pub mod extractor;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod query;
pub mod session;
pub mod store;

pub use model::*;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Dimensionality of the embeddings the classifier emits.
    pub const EMBEDDING_DIM: usize = 1024;
    pub const DEFAULT_TOP_K: usize = 5;
    pub const COLLECTION_NAME: &str = "vector_collection";
    pub const USERS_ROOT: &str = "users";
    pub const VIDEO_DIR: &str = "videos";
    pub const VECTOR_DIR: &str = "video_vectors";
    pub const DB_DIR: &str = "db";
    /// Uploads above this many bytes are rejected before any workflow runs.
    pub const MAX_VIDEO_BYTES: u64 = 20_000_000;
    /// Ceiling on one extractor invocation.
    pub const EXTRACTOR_TIMEOUT_S: u64 = 300;
}

/// Error types for the workflows and the store
pub mod errors {
    pub type Result<T> = std::result::Result<T, VidSearchError>;

    #[derive(Debug, thiserror::Error)]
    pub enum VidSearchError {
        #[error("missing configuration: {0}")]
        Configuration(String),

        #[error("failed to provision store for user {user}: {source}")]
        Provisioning {
            user: String,
            #[source]
            source: std::io::Error,
        },

        #[error("embedding extraction failed: {0}")]
        Extraction(String),

        #[error("malformed vector line: {0}")]
        Parse(String),

        #[error("invalid dimension: expected {expected}, got {actual}")]
        InvalidDimension { expected: usize, actual: usize },

        #[error("store operation failed: {0}")]
        Store(String),
    }
}
