//! Typed payload schemas per queue, validated at the enqueue boundary.
//!
//! Every external JSON blob is parsed into one of these before a row is
//! written; a row whose payload no longer parses at claim time is a
//! permanent failure, not a retryable one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const QUEUE_ALBUMS: &str = "albums";
pub const QUEUE_STORIES: &str = "stories";
pub const QUEUE_SOCIAL: &str = "social";

/// All queues this build knows how to process.
pub fn known_queues() -> [&'static str; 3] {
    [QUEUE_ALBUMS, QUEUE_STORIES, QUEUE_SOCIAL]
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("unknown queue '{0}'")]
    UnknownQueue(String),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Album enrichment request: marketplace lookup plus shop listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumPayload {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub discogs_id: Option<String>,
    /// Set by the artwork pipeline; enrichment waits until present.
    #[serde(default)]
    pub artwork_url: Option<String>,
}

/// Story generation request: text, images, listing, social announce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryPayload {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default = "default_image_count")]
    pub image_count: u32,
}

fn default_image_count() -> u32 {
    1
}

const MAX_IMAGE_COUNT: u32 = 4;

/// Social post, optionally recycled on a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPayload {
    pub message: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    /// When set, completing the post enqueues a fresh copy this many
    /// days out (the recycle queue behavior).
    #[serde(default)]
    pub recycle_after_days: Option<u32>,
    /// Recycle generation; stamped into the dedup key so each cycle is
    /// its own unit of work.
    #[serde(default)]
    pub cycle: u32,
}

/// Validate a raw payload against its queue's schema.
pub fn validate_payload(queue: &str, payload: &serde_json::Value) -> Result<(), PayloadError> {
    match queue {
        QUEUE_ALBUMS => {
            let p: AlbumPayload = parse(payload)?;
            require_text("artist", &p.artist)?;
            require_text("title", &p.title)?;
            require_url("artwork_url", p.artwork_url.as_deref())?;
            Ok(())
        }
        QUEUE_STORIES => {
            let p: StoryPayload = parse(payload)?;
            require_text("artist", &p.artist)?;
            require_text("title", &p.title)?;
            if p.image_count == 0 || p.image_count > MAX_IMAGE_COUNT {
                return Err(PayloadError::InvalidField {
                    field: "image_count",
                    reason: format!("must be 1-{}", MAX_IMAGE_COUNT),
                });
            }
            Ok(())
        }
        QUEUE_SOCIAL => {
            let p: SocialPayload = parse(payload)?;
            require_text("message", &p.message)?;
            require_url("image_url", p.image_url.as_deref())?;
            require_url("source_url", p.source_url.as_deref())?;
            Ok(())
        }
        other => Err(PayloadError::UnknownQueue(other.to_string())),
    }
}

/// Derive the dedup key for a payload.
///
/// Albums and stories key on catalog id when present, otherwise on the
/// normalized artist+title pair. Social posts key on the source URL when
/// present, otherwise on a hash of the message text.
pub fn dedup_key(queue: &str, payload: &serde_json::Value) -> Result<String, PayloadError> {
    match queue {
        QUEUE_ALBUMS => {
            let p: AlbumPayload = parse(payload)?;
            Ok(match p.discogs_id.as_deref().filter(|s| !s.trim().is_empty()) {
                Some(id) => format!("discogs::{}", id.trim()),
                None => format!("{}::{}", norm(&p.artist), norm(&p.title)),
            })
        }
        QUEUE_STORIES => {
            let p: StoryPayload = parse(payload)?;
            Ok(format!("{}::{}", norm(&p.artist), norm(&p.title)))
        }
        QUEUE_SOCIAL => {
            let p: SocialPayload = parse(payload)?;
            let base = match p.source_url.as_deref().filter(|s| !s.trim().is_empty()) {
                Some(url) => url.trim().to_string(),
                None => format!("post::{}", short_hash(&p.message)),
            };
            Ok(if p.cycle > 0 {
                format!("{}::c{}", base, p.cycle)
            } else {
                base
            })
        }
        other => Err(PayloadError::UnknownQueue(other.to_string())),
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: &serde_json::Value) -> Result<T, PayloadError> {
    serde_json::from_value(payload.clone()).map_err(|e| PayloadError::Malformed(e.to_string()))
}

fn require_text(field: &'static str, value: &str) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        return Err(PayloadError::MissingField(field));
    }
    Ok(())
}

/// Optional URL fields must parse when present.
fn require_url(field: &'static str, value: Option<&str>) -> Result<(), PayloadError> {
    let Some(value) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    url::Url::parse(value).map_err(|e| PayloadError::InvalidField {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Lowercase, trim and collapse inner whitespace.
fn norm(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn short_hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_album_key_from_artist_title() {
        let payload = json!({"artist": "  Miles  Davis ", "title": "Kind of Blue"});
        let key = dedup_key(QUEUE_ALBUMS, &payload).unwrap();
        assert_eq!(key, "miles davis::kind of blue");
    }

    #[test]
    fn test_album_key_prefers_catalog_id() {
        let payload = json!({"artist": "Miles Davis", "title": "Kind of Blue", "discogs_id": "r12345"});
        assert_eq!(dedup_key(QUEUE_ALBUMS, &payload).unwrap(), "discogs::r12345");
    }

    #[test]
    fn test_album_blank_catalog_id_falls_back() {
        let payload = json!({"artist": "A", "title": "B", "discogs_id": "  "});
        assert_eq!(dedup_key(QUEUE_ALBUMS, &payload).unwrap(), "a::b");
    }

    #[test]
    fn test_social_key_from_url_or_hash() {
        let with_url = json!({"message": "new story!", "source_url": "https://waxworks.example/s/1"});
        assert_eq!(
            dedup_key(QUEUE_SOCIAL, &with_url).unwrap(),
            "https://waxworks.example/s/1"
        );

        let without = json!({"message": "new story!"});
        let key = dedup_key(QUEUE_SOCIAL, &without).unwrap();
        assert!(key.starts_with("post::"));
        assert_eq!(key.len(), "post::".len() + 16);
        // Same message, same key
        assert_eq!(dedup_key(QUEUE_SOCIAL, &without).unwrap(), key);
    }

    #[test]
    fn test_social_cycle_stamps_key() {
        let original = json!({"message": "spin it again"});
        let recycled = json!({"message": "spin it again", "cycle": 2});
        let base = dedup_key(QUEUE_SOCIAL, &original).unwrap();
        let stamped = dedup_key(QUEUE_SOCIAL, &recycled).unwrap();
        assert_ne!(base, stamped);
        assert_eq!(stamped, format!("{}::c2", base));
    }

    #[test]
    fn test_validate_missing_field() {
        let err = validate_payload(QUEUE_ALBUMS, &json!({"artist": "", "title": "x"})).unwrap_err();
        assert!(matches!(err, PayloadError::MissingField("artist")));

        let err = validate_payload(QUEUE_SOCIAL, &json!({})).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed(_)));
    }

    #[test]
    fn test_validate_image_count_bounds() {
        let ok = json!({"artist": "A", "title": "B", "image_count": 4});
        assert!(validate_payload(QUEUE_STORIES, &ok).is_ok());

        let too_many = json!({"artist": "A", "title": "B", "image_count": 5});
        let err = validate_payload(QUEUE_STORIES, &too_many).unwrap_err();
        assert!(matches!(
            err,
            PayloadError::InvalidField {
                field: "image_count",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_unknown_queue() {
        let err = validate_payload("quizzes", &json!({})).unwrap_err();
        assert!(matches!(err, PayloadError::UnknownQueue(_)));
    }

    #[test]
    fn test_validate_url_fields() {
        let bad = json!({"artist": "A", "title": "B", "artwork_url": "not a url"});
        let err = validate_payload(QUEUE_ALBUMS, &bad).unwrap_err();
        assert!(matches!(
            err,
            PayloadError::InvalidField {
                field: "artwork_url",
                ..
            }
        ));

        let good = json!({"artist": "A", "title": "B", "artwork_url": "https://img.example/a.jpg"});
        assert!(validate_payload(QUEUE_ALBUMS, &good).is_ok());

        // Absent and blank URLs are fine
        let blank = json!({"message": "hi", "image_url": ""});
        assert!(validate_payload(QUEUE_SOCIAL, &blank).is_ok());
    }
}
