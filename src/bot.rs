use std::fmt::Write as _;

use crate::config::Config;
use crate::defaults;
use crate::errors::VidSearchError;
use crate::extractor::Extractor;
use crate::ingest;
use crate::model::{CollectionConfig, Distance, SearchHit};
use crate::query;
use crate::session::Sessions;

pub const WELCOME_PROMPT: &str = "Welcome to Database Video Search Bot!";

/// One incoming user interaction, already stripped of transport details.
#[derive(Debug)]
pub enum Event {
    /// "start"-style command: provision (or reset) the user's store.
    Start,
    /// Ingest every video already sitting in the user's video directory.
    ProcessVideos,
    /// A video upload annotated with a directive caption.
    Upload {
        file_name: String,
        bytes: Vec<u8>,
        caption: String,
    },
}

/// The front-end layer: routes events to the workflows and turns every
/// outcome, including errors, into a user-readable reply. The chat transport
/// that delivers events and replies lives outside this crate.
pub struct Bot {
    extractor: Extractor,
    sessions: Sessions,
}

impl Bot {
    pub fn new(config: &Config) -> Self {
        let collection = CollectionConfig {
            name: config.collection_name.clone(),
            dim: config.embedding_dim,
            distance: Distance::Cosine,
        };
        Self {
            extractor: Extractor::from_config(config),
            sessions: Sessions::new(config.users_root.clone(), collection),
        }
    }

    /// Handle one event for one user to completion. Events are processed one
    /// at a time; the per-user lock keeps a second process from racing the
    /// collection.
    pub async fn handle(&mut self, user_id: &str, event: Event) -> String {
        match event {
            Event::Start => match self.sessions.start(user_id).await {
                Ok(_) => WELCOME_PROMPT.to_string(),
                Err(e) => failure_reply(user_id, &e),
            },
            Event::ProcessVideos => {
                let Some(handle) = self.sessions.resume(user_id).await else {
                    return "Please send /start first".to_string();
                };
                let mut store = handle.lock().await;
                match ingest::ingest_all(&self.extractor, &mut store).await {
                    Ok(_) => "Done".to_string(),
                    Err(e) => failure_reply(user_id, &e),
                }
            }
            Event::Upload {
                file_name,
                bytes,
                caption,
            } => self.handle_upload(user_id, &file_name, bytes, &caption).await,
        }
    }

    async fn handle_upload(
        &mut self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> String {
        if bytes.len() as u64 > defaults::MAX_VIDEO_BYTES {
            return "Video too big".to_string();
        }

        let Some(handle) = self.sessions.resume(user_id).await else {
            return "Please send /start first".to_string();
        };
        let mut store = handle.lock().await;

        // Same-named uploads overwrite the stored video.
        let video_path = store.video_dir().join(file_name);
        if let Err(e) = tokio::fs::write(&video_path, bytes).await {
            return failure_reply(user_id, &VidSearchError::Store(e.to_string()));
        }

        // Directive matching is case-folded but otherwise literal: stray
        // whitespace falls through to the unrecognized branch.
        match caption.to_lowercase().as_str() {
            "add_db" => match ingest::ingest(&self.extractor, &mut store, file_name).await {
                Ok(_) => "Video added to db".to_string(),
                Err(e) => failure_reply(user_id, &e),
            },
            "get_closest" => {
                match query::retrieve(
                    &self.extractor,
                    &store,
                    file_name,
                    defaults::DEFAULT_TOP_K,
                )
                .await
                {
                    Ok(hits) => format_hits(&hits),
                    Err(e) => failure_reply(user_id, &e),
                }
            }
            _ => "Wrong command".to_string(),
        }
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    let Some((best, rest)) = hits.split_first() else {
        return "No videos in the database yet".to_string();
    };
    let mut reply = format!("Best match:\n{}\t{}\n", best.source, best.score);
    reply.push_str("Closest matches:\n");
    for hit in rest {
        let _ = writeln!(reply, "{}\tScore: {}", hit.source, hit.score);
    }
    reply
}

fn failure_reply(user_id: &str, err: &VidSearchError) -> String {
    tracing::warn!(user = user_id, error = %err, "request failed");
    format!("Sorry, that did not work: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn test_config(users_root: &Path, extractor_bin: &Path) -> Config {
        Config {
            users_root: users_root.to_path_buf(),
            python_bin: extractor_bin.to_path_buf(),
            embedding_script: PathBuf::from("video2vec.py"),
            graph_file: PathBuf::from("graph.pb"),
            fcnn_model: PathBuf::from("model.ckpt"),
            extractor_timeout: Duration::from_secs(5),
            collection_name: defaults::COLLECTION_NAME.to_string(),
            embedding_dim: defaults::EMBEDDING_DIM,
        }
    }

    /// Stub classifier: copies the "video" file to the output path, so the
    /// video's contents stand in for the raw vector line.
    fn write_stub_extractor(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("stub_extractor.sh");
        let script = "#!/bin/sh\n\
                      in=\"\"; out=\"\"\n\
                      while [ \"$#\" -gt 0 ]; do\n\
                        case \"$1\" in\n\
                          --input_file) in=\"$2\"; shift 2 ;;\n\
                          --output_file) out=\"$2\"; shift 2 ;;\n\
                          *) shift ;;\n\
                        esac\n\
                      done\n\
                      cp \"$in\" \"$out\"\n";
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn raw_line(seed: usize) -> String {
        let components: Vec<String> = (0..defaults::EMBEDDING_DIM)
            .map(|i| format!("{}.0", (i + seed) % 7))
            .collect();
        format!("video,{}", components.join("_"))
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        // An extractor that would blow up if it ever ran.
        let config = test_config(tmp.path(), Path::new("/nonexistent/extractor"));
        let mut bot = Bot::new(&config);

        bot.handle("42", Event::Start).await;
        let reply = bot
            .handle(
                "42",
                Event::Upload {
                    file_name: "big.mp4".to_string(),
                    bytes: vec![0u8; defaults::MAX_VIDEO_BYTES as usize + 1],
                    caption: "add_db".to_string(),
                },
            )
            .await;
        assert_eq!(reply, "Video too big");
    }

    #[tokio::test]
    async fn unrecognized_caption_does_not_touch_the_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let stub = write_stub_extractor(tmp.path());
        let config = test_config(tmp.path(), &stub);
        let mut bot = Bot::new(&config);

        bot.handle("42", Event::Start).await;
        for caption in ["add_db ", " get_closest", "delete_db"] {
            let reply = bot
                .handle(
                    "42",
                    Event::Upload {
                        file_name: "a.mp4".to_string(),
                        bytes: raw_line(0).into_bytes(),
                        caption: caption.to_string(),
                    },
                )
                .await;
            assert_eq!(reply, "Wrong command");
        }

        let handle = bot.sessions.resume("42").await.unwrap();
        assert_eq!(handle.lock().await.count(), 0);
    }

    #[tokio::test]
    async fn upload_without_start_asks_for_start() {
        let tmp = tempfile::tempdir().unwrap();
        let stub = write_stub_extractor(tmp.path());
        let config = test_config(tmp.path(), &stub);
        let mut bot = Bot::new(&config);

        let reply = bot
            .handle(
                "99",
                Event::Upload {
                    file_name: "a.mp4".to_string(),
                    bytes: raw_line(0).into_bytes(),
                    caption: "add_db".to_string(),
                },
            )
            .await;
        assert_eq!(reply, "Please send /start first");
    }

    #[tokio::test]
    async fn add_then_get_closest_returns_the_same_video_first() {
        let tmp = tempfile::tempdir().unwrap();
        let stub = write_stub_extractor(tmp.path());
        let config = test_config(tmp.path(), &stub);
        let mut bot = Bot::new(&config);

        assert_eq!(bot.handle("7", Event::Start).await, WELCOME_PROMPT);
        let reply = bot
            .handle(
                "7",
                Event::Upload {
                    file_name: "a.mp4".to_string(),
                    bytes: raw_line(0).into_bytes(),
                    caption: "Add_DB".to_string(),
                },
            )
            .await;
        assert_eq!(reply, "Video added to db");

        let reply = bot
            .handle(
                "7",
                Event::Upload {
                    file_name: "query.mp4".to_string(),
                    bytes: raw_line(0).into_bytes(),
                    caption: "get_closest".to_string(),
                },
            )
            .await;
        assert!(reply.starts_with("Best match:\na.mp4\t"), "reply was: {reply}");
    }

    #[tokio::test]
    async fn start_resets_the_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let stub = write_stub_extractor(tmp.path());
        let config = test_config(tmp.path(), &stub);
        let mut bot = Bot::new(&config);

        bot.handle("7", Event::Start).await;
        bot.handle(
            "7",
            Event::Upload {
                file_name: "a.mp4".to_string(),
                bytes: raw_line(0).into_bytes(),
                caption: "add_db".to_string(),
            },
        )
        .await;
        bot.handle("7", Event::Start).await;

        let handle = bot.sessions.resume("7").await.unwrap();
        assert_eq!(handle.lock().await.count(), 0);
    }
}
