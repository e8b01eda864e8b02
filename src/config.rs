use std::path::PathBuf;
use std::time::Duration;

use crate::defaults;
use crate::errors::{Result, VidSearchError};

/// Process configuration, loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one subdirectory per user.
    pub users_root: PathBuf,
    /// Interpreter used to run the embedding script.
    pub python_bin: PathBuf,
    /// The video-to-vector script.
    pub embedding_script: PathBuf,
    /// Classifier graph definition, passed through to the script.
    pub graph_file: PathBuf,
    /// Feature-model checkpoint, passed through to the script.
    pub fcnn_model: PathBuf,
    pub extractor_timeout: Duration,
    pub collection_name: String,
    pub embedding_dim: usize,
}

impl Config {
    /// Load configuration from the environment. Missing extractor paths are
    /// fatal; everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let embedding_script = required_var("EMBEDDING_SCRIPT")?;
        let graph_file = required_var("GRAPH_FILE")?;
        let fcnn_model = required_var("FCNN_MODEL")?;

        let users_root = std::env::var("USERS_ROOT")
            .unwrap_or_else(|_| defaults::USERS_ROOT.to_string());
        let python_bin =
            std::env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string());
        let timeout_s = match std::env::var("EXTRACTOR_TIMEOUT_S") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                VidSearchError::Configuration(format!(
                    "EXTRACTOR_TIMEOUT_S is not a number: {raw:?}"
                ))
            })?,
            Err(_) => defaults::EXTRACTOR_TIMEOUT_S,
        };

        Ok(Self {
            users_root: PathBuf::from(users_root),
            python_bin: PathBuf::from(python_bin),
            embedding_script: PathBuf::from(embedding_script),
            graph_file: PathBuf::from(graph_file),
            fcnn_model: PathBuf::from(fcnn_model),
            extractor_timeout: Duration::from_secs(timeout_s),
            collection_name: defaults::COLLECTION_NAME.to_string(),
            embedding_dim: defaults::EMBEDDING_DIM,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| VidSearchError::Configuration(name.to_string()))
}
