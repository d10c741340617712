use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use redmon_core::StateError;

/// One processed submission: when it was handled, its fingerprint text, and
/// its author.
#[derive(Debug, Clone, Serialize)]
pub struct SeenRecord {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub author: String,
}

/// On-disk document, canonical shape. Older deployments wrote two other
/// shapes; see [`SeenPostsRepr`].
#[derive(Serialize)]
struct SeenFileOut<'a> {
    seen_posts: &'a HashMap<String, SeenRecord>,
    last_updated: DateTime<Utc>,
    total_posts: usize,
}

#[derive(Deserialize)]
struct SeenFileIn {
    seen_posts: SeenPostsRepr,
}

/// Every `seen_posts` shape ever written: the legacy bare ID list, and maps
/// whose values are either a plain timestamp string or a full record. A single
/// document may mix the two value shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum SeenPostsRepr {
    Legacy(Vec<String>),
    Map(HashMap<String, SeenValue>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeenValue {
    Record(RecordRepr),
    Timestamp(String),
}

/// Wire form of a record. Timestamps are kept as strings here because older
/// files carry naive local ISO stamps without an offset.
#[derive(Deserialize)]
struct RecordRepr {
    timestamp: String,
    text: String,
    author: String,
}

/// Convert whatever shape was on disk into the canonical in-memory map. Runs
/// exactly once, inside `load`; nothing else ever branches on shape.
fn migrate(repr: SeenPostsRepr, loaded_at: DateTime<Utc>) -> HashMap<String, SeenRecord> {
    match repr {
        SeenPostsRepr::Legacy(ids) => {
            info!(
                count = ids.len(),
                "converting legacy seen-posts list to timestamped records"
            );
            ids.into_iter()
                .map(|id| {
                    (
                        id,
                        SeenRecord {
                            timestamp: loaded_at,
                            text: String::new(),
                            author: "unknown".to_string(),
                        },
                    )
                })
                .collect()
        }
        SeenPostsRepr::Map(values) => values
            .into_iter()
            .map(|(id, value)| {
                let record = match value {
                    SeenValue::Record(r) => SeenRecord {
                        timestamp: parse_timestamp(&r.timestamp, loaded_at),
                        text: r.text,
                        author: r.author,
                    },
                    SeenValue::Timestamp(s) => SeenRecord {
                        timestamp: parse_timestamp(&s, loaded_at),
                        text: String::new(),
                        author: "unknown".to_string(),
                    },
                };
                (id, record)
            })
            .collect(),
    }
}

/// Accepts RFC 3339 stamps (our own output) and naive ISO stamps (older
/// files). Unparseable stamps fall back to the load instant.
fn parse_timestamp(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc();
    }
    warn!(raw, "unparseable seen-post timestamp, using load time");
    fallback
}

/// Persisted record of processed post IDs. Owned by exactly one monitor
/// process; loaded once at startup and saved at run boundaries.
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    posts: HashMap<String, SeenRecord>,
}

impl SeenStore {
    /// Load from `path`. A missing, unreadable, or unrecognizable file yields
    /// an empty store; possible reprocessing is the lesser failure compared to
    /// refusing to start.
    pub fn load(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let posts = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<SeenFileIn>(&raw) {
                Ok(file) => migrate(file.seen_posts, now),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unexpected seen-posts format, starting fresh");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read seen posts, starting fresh");
                HashMap::new()
            }
        };
        debug!(count = posts.len(), "loaded seen posts");
        Self { path, posts }
    }

    pub fn has(&self, id: &str) -> bool {
        self.posts.contains_key(id)
    }

    /// Record a processed post, overwriting any existing entry for the ID.
    pub fn record(&mut self, id: &str, text: &str, author: &str, now: DateTime<Utc>) {
        self.posts.insert(
            id.to_string(),
            SeenRecord {
                timestamp: now,
                text: text.to_string(),
                author: author.to_string(),
            },
        );
    }

    /// Drop records strictly older than `now - horizon_days`. Returns how many
    /// were removed.
    pub fn cleanup(&mut self, horizon_days: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - chrono::Duration::days(horizon_days);
        let before = self.posts.len();
        self.posts.retain(|_, record| record.timestamp >= cutoff);
        let removed = before - self.posts.len();
        if removed > 0 {
            info!(removed, horizon_days, "cleaned up old seen posts");
        }
        removed
    }

    /// Persist the full store. Writes to a sibling temp file and renames over
    /// the target, so a reader never observes a partial document.
    pub fn save(&self, now: DateTime<Utc>) -> Result<(), StateError> {
        let doc = SeenFileOut {
            seen_posts: &self.posts,
            last_updated: now,
            total_posts: self.posts.len(),
        };
        let body = serde_json::to_string_pretty(&doc).map_err(|e| StateError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| StateError::WriteFailed {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StateError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// All retained records, for the deduplication scan.
    pub fn records(&self) -> impl Iterator<Item = (&str, &SeenRecord)> {
        self.posts.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}
