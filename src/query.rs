use crate::errors::Result;
use crate::extractor::Extractor;
use crate::ingest::embed_video;
use crate::model::SearchHit;
use crate::store::UserStore;

/// Extract an embedding for a stored video and return its nearest stored
/// neighbors, best first. A pure read: the query video is not inserted.
pub async fn retrieve(
    extractor: &Extractor,
    store: &UserStore,
    video_filename: &str,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let vector = embed_video(extractor, store, video_filename).await?;
    let hits = store.search(&vector, limit)?;
    tracing::info!(video = video_filename, hits = hits.len(), "similarity search done");
    Ok(hits)
}
