use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::errors::{Result, VidSearchError};

/// Invokes the external video classifier that turns a media file into a raw
/// embedding line. The process is a black box; we only check its exit status
/// and that the output file actually appeared.
#[derive(Debug, Clone)]
pub struct Extractor {
    program: PathBuf,
    script: PathBuf,
    graph_file: PathBuf,
    fcnn_model: PathBuf,
    timeout: Duration,
}

impl Extractor {
    pub fn new(
        program: PathBuf,
        script: PathBuf,
        graph_file: PathBuf,
        fcnn_model: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            program,
            script,
            graph_file,
            fcnn_model,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.python_bin.clone(),
            config.embedding_script.clone(),
            config.graph_file.clone(),
            config.fcnn_model.clone(),
            config.extractor_timeout,
        )
    }

    /// Run the classifier on `input`, writing the raw vector line to
    /// `output`. Blocks the calling workflow for the full process runtime,
    /// bounded by the configured timeout.
    pub async fn extract(&self, input: &Path, output: &Path) -> Result<()> {
        tracing::info!(input = %input.display(), "running embedding extractor");

        let child = tokio::process::Command::new(&self.program)
            .arg(&self.script)
            .arg("--graph_file")
            .arg(&self.graph_file)
            .arg("--fcnn_model")
            .arg(&self.fcnn_model)
            .arg("--input_file")
            .arg(input)
            .arg("--output_file")
            .arg(output)
            .kill_on_drop(true)
            .status();

        let status = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                VidSearchError::Extraction(format!(
                    "extractor timed out after {}s on {}",
                    self.timeout.as_secs(),
                    input.display()
                ))
            })?
            .map_err(|e| {
                VidSearchError::Extraction(format!("failed to spawn extractor: {e}"))
            })?;

        if !status.success() {
            return Err(VidSearchError::Extraction(format!(
                "extractor exited with {status} on {}",
                input.display()
            )));
        }
        // A zero exit does not guarantee output; the script can fail quietly.
        if !output.exists() {
            return Err(VidSearchError::Extraction(format!(
                "extractor produced no output file at {}",
                output.display()
            )));
        }
        Ok(())
    }
}
