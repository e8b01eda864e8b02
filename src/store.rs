use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::defaults;
use crate::errors::{Result, VidSearchError};
use crate::model::{CollectionConfig, Distance, Point, PointPayload, SearchHit};

/// One user's embedded vector store: an isolated directory tree with a single
/// named collection, plus the video and raw-vector directories next to it.
///
/// The handle keeps the collection's points in memory and mirrors every
/// insert to an append-only NDJSON file, so counts are exact and ids stay
/// gapless. Not safe for concurrent writers; callers serialize per user
/// (see `session::Sessions`).
pub struct UserStore {
    user_id: String,
    user_dir: PathBuf,
    config: CollectionConfig,
    points: Vec<Point>,
}

impl UserStore {
    /// Ensure the per-user directories exist and (re)create the collection.
    ///
    /// Directory creation is idempotent, but the collection itself is
    /// recreated from scratch: any previously ingested points are dropped.
    pub async fn provision(users_root: &Path, user_id: &str) -> Result<UserStore> {
        let config = CollectionConfig::cosine_1024(defaults::COLLECTION_NAME);
        Self::provision_with(users_root, user_id, config).await
    }

    /// `provision` with an explicit collection configuration.
    pub async fn provision_with(
        users_root: &Path,
        user_id: &str,
        config: CollectionConfig,
    ) -> Result<UserStore> {
        let user_dir = users_root.join(user_id);
        for dir in [defaults::VIDEO_DIR, defaults::VECTOR_DIR, defaults::DB_DIR] {
            tokio::fs::create_dir_all(user_dir.join(dir))
                .await
                .map_err(|source| VidSearchError::Provisioning {
                    user: user_id.to_string(),
                    source,
                })?;
        }

        let store = UserStore {
            user_id: user_id.to_string(),
            user_dir,
            config,
            points: Vec::new(),
        };

        let config_json = serde_json::to_vec_pretty(&store.config)
            .map_err(|e| VidSearchError::Store(e.to_string()))?;
        tokio::fs::write(store.config_path(), config_json)
            .await
            .map_err(|source| VidSearchError::Provisioning {
                user: user_id.to_string(),
                source,
            })?;
        // Truncate the point log: recreation replaces any prior contents.
        tokio::fs::write(store.points_path(), b"")
            .await
            .map_err(|source| VidSearchError::Provisioning {
                user: user_id.to_string(),
                source,
            })?;

        tracing::info!(
            user = %store.user_id,
            collection = %store.config.name,
            dim = store.config.dim,
            "provisioned user store"
        );
        Ok(store)
    }

    /// Reopen a previously provisioned store without dropping its contents.
    pub async fn open(users_root: &Path, user_id: &str) -> Result<UserStore> {
        let user_dir = users_root.join(user_id);
        let config_path = user_dir
            .join(defaults::DB_DIR)
            .join(format!("{}.config.json", defaults::COLLECTION_NAME));
        let config_bytes = tokio::fs::read(&config_path).await.map_err(|_| {
            VidSearchError::Store(format!("no collection provisioned for user {user_id}"))
        })?;
        let config: CollectionConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| VidSearchError::Store(format!("corrupt collection config: {e}")))?;

        let mut store = UserStore {
            user_id: user_id.to_string(),
            user_dir,
            config,
            points: Vec::new(),
        };

        let log = tokio::fs::read_to_string(store.points_path())
            .await
            .unwrap_or_default();
        for line in log.lines().filter(|l| !l.trim().is_empty()) {
            let point: Point = serde_json::from_str(line)
                .map_err(|e| VidSearchError::Store(format!("corrupt point log: {e}")))?;
            store.points.push(point);
        }

        tracing::info!(user = %store.user_id, points = store.points.len(), "opened user store");
        Ok(store)
    }

    /// Exact number of points in the collection.
    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn collection_config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Directory holding this user's uploaded videos.
    pub fn video_dir(&self) -> PathBuf {
        self.user_dir.join(defaults::VIDEO_DIR)
    }

    /// Directory holding this user's raw extractor output files.
    pub fn vector_dir(&self) -> PathBuf {
        self.user_dir.join(defaults::VECTOR_DIR)
    }

    /// Insert one embedding. The new point's id is the exact point count at
    /// insertion time; the point is durably appended before the in-memory
    /// state changes, so a failed append leaves the count untouched.
    pub async fn insert(&mut self, vector: Vec<f32>, source_label: &str) -> Result<u64> {
        if vector.len() != self.config.dim {
            return Err(VidSearchError::InvalidDimension {
                expected: self.config.dim,
                actual: vector.len(),
            });
        }

        let point = Point {
            id: self.points.len() as u64,
            vector,
            payload: PointPayload {
                source: source_label.to_string(),
            },
            created_at: chrono::Utc::now(),
        };

        let mut line = serde_json::to_vec(&point)
            .map_err(|e| VidSearchError::Store(e.to_string()))?;
        line.push(b'\n');

        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.points_path())
            .await
            .map_err(|e| VidSearchError::Store(e.to_string()))?;
        log.write_all(&line)
            .await
            .map_err(|e| VidSearchError::Store(e.to_string()))?;
        log.sync_all()
            .await
            .map_err(|e| VidSearchError::Store(e.to_string()))?;

        let id = point.id;
        self.points.push(point);
        tracing::debug!(user = %self.user_id, id, source = source_label, "inserted point");
        Ok(id)
    }

    /// Similarity search, nearest first. An empty collection yields an empty
    /// result, not an error.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.config.dim {
            return Err(VidSearchError::InvalidDimension {
                expected: self.config.dim,
                actual: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .points
            .iter()
            .map(|p| SearchHit {
                source: p.payload.source.clone(),
                score: match self.config.distance {
                    Distance::Cosine => cosine_similarity(query, &p.vector),
                },
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn config_path(&self) -> PathBuf {
        self.user_dir
            .join(defaults::DB_DIR)
            .join(format!("{}.config.json", self.config.name))
    }

    fn points_path(&self) -> PathBuf {
        self.user_dir
            .join(defaults::DB_DIR)
            .join(format!("{}.ndjson", self.config.name))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CollectionConfig {
        CollectionConfig {
            name: defaults::COLLECTION_NAME.to_string(),
            dim: 4,
            distance: Distance::Cosine,
        }
    }

    #[tokio::test]
    async fn sequential_inserts_assign_gapless_ids() {
        let root = tempfile::tempdir().unwrap();
        let mut store = UserStore::provision_with(root.path(), "u1", small_config())
            .await
            .unwrap();

        for expected in 0..3u64 {
            let id = store
                .insert(vec![1.0, 0.0, 0.0, 0.0], &format!("v{expected}.mp4"))
                .await
                .unwrap();
            assert_eq!(id, expected);
        }
        assert_eq!(store.count(), 3);
    }

    #[tokio::test]
    async fn provisioning_twice_drops_prior_points() {
        let root = tempfile::tempdir().unwrap();
        let mut store = UserStore::provision_with(root.path(), "u1", small_config())
            .await
            .unwrap();
        store.insert(vec![1.0, 2.0, 3.0, 4.0], "a.mp4").await.unwrap();
        assert_eq!(store.count(), 1);

        let store = UserStore::provision_with(root.path(), "u1", small_config())
            .await
            .unwrap();
        assert_eq!(store.count(), 0);
        assert!(store.search(&[1.0, 2.0, 3.0, 4.0], 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_preserves_points_across_handles() {
        let root = tempfile::tempdir().unwrap();
        let mut store = UserStore::provision_with(root.path(), "u1", small_config())
            .await
            .unwrap();
        store.insert(vec![0.0, 1.0, 0.0, 0.0], "a.mp4").await.unwrap();
        store.insert(vec![0.0, 0.0, 1.0, 0.0], "b.mp4").await.unwrap();
        drop(store);

        let reopened = UserStore::open(root.path(), "u1").await.unwrap();
        assert_eq!(reopened.count(), 2);
        let hits = reopened.search(&[0.0, 0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].source, "b.mp4");
    }

    #[tokio::test]
    async fn search_on_empty_collection_returns_empty() {
        let root = tempfile::tempdir().unwrap();
        let store = UserStore::provision_with(root.path(), "u1", small_config())
            .await
            .unwrap();
        assert!(store.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn identical_vector_is_top_hit_with_max_score() {
        let root = tempfile::tempdir().unwrap();
        let mut store = UserStore::provision_with(root.path(), "u1", small_config())
            .await
            .unwrap();
        store.insert(vec![0.5, 0.5, 0.0, 0.0], "match.mp4").await.unwrap();
        store.insert(vec![0.0, 0.0, 1.0, 0.0], "other.mp4").await.unwrap();

        let hits = store.search(&[0.5, 0.5, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits[0].source, "match.mp4");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension() {
        let root = tempfile::tempdir().unwrap();
        let mut store = UserStore::provision_with(root.path(), "u1", small_config())
            .await
            .unwrap();
        let err = store.insert(vec![1.0, 2.0], "a.mp4").await.unwrap_err();
        assert!(matches!(
            err,
            crate::errors::VidSearchError::InvalidDimension { expected: 4, actual: 2 }
        ));
        assert_eq!(store.count(), 0);
    }
}
