use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed SAM prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub video_id: String,
    pub video_time_sec: u64,
    pub valence: u8,
    pub arousal: u8,
    pub recorded_at: DateTime<Utc>,
}

/// What the playback controller hands to the store; id and timestamp are
/// assigned on record.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingInput {
    pub video_id: String,
    pub video_time_sec: f64,
    pub valence: u8,
    pub arousal: u8,
}
