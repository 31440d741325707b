//! Study session record.
//!
//! The session is persisted as a single JSON document and re-saved after every
//! recording operation, so an export always reflects the latest state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FusedPrediction, PassivePrediction, Rating, VideoDescriptor, VisualPrediction};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoVisit {
    pub id: String,
    pub name: String,
    pub first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub participant_id: String,
    pub start_time: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub videos: Vec<VideoVisit>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub visual_predictions: Vec<VisualPrediction>,
    #[serde(default)]
    pub passive_predictions: Vec<PassivePrediction>,
    #[serde(default)]
    pub fused_predictions: Vec<FusedPrediction>,
}

impl Session {
    pub fn begin(participant_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            participant_id: participant_id.into(),
            start_time: Utc::now(),
            status: SessionStatus::Active,
            videos: Vec::new(),
            ratings: Vec::new(),
            visual_predictions: Vec::new(),
            passive_predictions: Vec::new(),
            fused_predictions: Vec::new(),
        }
    }

    /// Appends a visit for `video` unless one with the same id exists.
    /// Returns whether the list changed.
    pub fn note_video(&mut self, video: &VideoDescriptor, seen_at: DateTime<Utc>) -> bool {
        if self.videos.iter().any(|visit| visit.id == video.id) {
            return false;
        }
        self.videos.push(VideoVisit {
            id: video.id.clone(),
            name: video.name.clone(),
            first_seen_at: seen_at,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoKind;
    use chrono::Duration;

    fn clip(id: &str) -> VideoDescriptor {
        VideoDescriptor {
            id: id.into(),
            name: format!("clip {id}"),
            kind: VideoKind::File,
            link: format!("/media/{id}.mp4"),
        }
    }

    #[test]
    fn note_video_keeps_first_seen_timestamp() {
        let mut session = Session::begin("p1");
        let first = Utc::now();
        assert!(session.note_video(&clip("v1"), first));
        assert!(!session.note_video(&clip("v1"), first + Duration::seconds(30)));
        assert!(session.note_video(&clip("v2"), first));

        assert_eq!(session.videos.len(), 2);
        assert_eq!(session.videos[0].first_seen_at, first);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let session = Session::begin("p1");
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["participantId"], "p1");
        assert_eq!(value["status"], "active");
        assert!(value["fusedPredictions"].as_array().unwrap().is_empty());
    }
}
