use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::models::VideoDescriptor;

use super::BoundaryGate;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    /// No video loaded (empty playlist or not started).
    Idle,
    Playing,
    PausedForRating,
    PausedManual,
    /// Media finished; the open prompt advances the playlist when completed.
    Ended,
    /// Prompt closed after a rating, waiting out the resume delay.
    Resuming,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        PlaybackStatus::Idle
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RatingPrompt {
    pub advance_after: bool,
}

#[derive(Debug, Default)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub playlist: Vec<VideoDescriptor>,
    pub video_index: usize,
    pub prompt: Option<RatingPrompt>,
    pub rating_gate: BoundaryGate,
    pub pending_resume: Option<CancellationToken>,
}

impl PlaybackState {
    pub fn new(playlist: Vec<VideoDescriptor>) -> Self {
        Self {
            playlist,
            ..Self::default()
        }
    }

    pub fn cancel_pending_resume(&mut self) -> bool {
        match self.pending_resume.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Index of the entry after the current one, wrapping past the end.
    pub fn next_index(&self) -> Option<usize> {
        if self.playlist.is_empty() {
            None
        } else {
            Some((self.video_index + 1) % self.playlist.len())
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status: self.status,
            video_index: self.video_index,
            playlist_len: self.playlist.len(),
            prompt: self.prompt,
            last_rating_boundary: self.rating_gate.last(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub video_index: usize,
    pub playlist_len: usize,
    pub prompt: Option<RatingPrompt>,
    pub last_rating_boundary: Option<u64>,
}
