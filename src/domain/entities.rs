//! Domain entities mirrored from persistent storage.
//!
//! Image bytes are absent: records carry only the reference
//! columns. Payloads are read through the blob store when serving.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Image reference columns shared by every owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImageReference {
    pub image_url: Option<String>,
    pub image_filename: Option<String>,
    pub image_content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub author: String,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
    #[serde(flatten)]
    pub image: ImageReference,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub tagline: Option<String>,
    pub best_for: Option<String>,
    pub players: Option<String>,
    pub play_time: Option<String>,
    pub teach_time: Option<String>,
    pub energy: Option<String>,
    pub brain_space: Option<String>,
    pub spice_level: Option<String>,
    pub why: Option<String>,
    pub when_to_skip: Option<String>,
    pub how_to_pitch: Option<String>,
    pub additional_notes: Option<String>,
    pub conversation_spark: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
    #[serde(flatten)]
    pub image: ImageReference,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
