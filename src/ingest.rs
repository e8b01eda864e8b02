use std::path::Path;

use crate::errors::{Result, VidSearchError};
use crate::extractor::Extractor;
use crate::parser::parse_raw_vector;
use crate::store::UserStore;

/// Extract and insert one stored video into the user's collection.
///
/// Steps run strictly in order: extractor, parse, insert. The raw vector
/// file is left on disk next to the video as an inspectable artifact.
pub async fn ingest(
    extractor: &Extractor,
    store: &mut UserStore,
    video_filename: &str,
) -> Result<u64> {
    let vector = embed_video(extractor, store, video_filename).await?;
    let id = store.insert(vector, video_filename).await?;
    tracing::info!(video = video_filename, id, "video added to collection");
    Ok(id)
}

/// Ingest every file currently in the user's video directory. Returns the
/// number of videos ingested; the first failure aborts the batch.
pub async fn ingest_all(extractor: &Extractor, store: &mut UserStore) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(store.video_dir())
        .await
        .map_err(|e| VidSearchError::Store(format!("cannot list video directory: {e}")))?;

    let mut ingested = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| VidSearchError::Store(format!("cannot list video directory: {e}")))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        ingest(extractor, store, name).await?;
        ingested += 1;
    }
    Ok(ingested)
}

/// Run the extractor on a stored video and parse its output into an
/// embedding of the collection's dimensionality.
pub(crate) async fn embed_video(
    extractor: &Extractor,
    store: &UserStore,
    video_filename: &str,
) -> Result<Vec<f32>> {
    let input = store.video_dir().join(video_filename);
    // Raw output is named after the video with its extension stripped.
    let stem = Path::new(video_filename)
        .file_stem()
        .unwrap_or_else(|| video_filename.as_ref());
    let output = store.vector_dir().join(stem);

    extractor.extract(&input, &output).await?;

    let raw = tokio::fs::read_to_string(&output)
        .await
        .map_err(|e| VidSearchError::Extraction(format!("unreadable extractor output: {e}")))?;
    let line = raw.lines().next().unwrap_or_default();
    parse_raw_vector(line, store.collection_config().dim)
}
