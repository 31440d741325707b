use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{AffectPrediction, VideoDescriptor};

/// One line on stdin.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    Register {
        name: String,
    },
    StartSession,
    FinishSession,
    Reset,
    TimeUpdate {
        seconds: f64,
    },
    MediaEnded,
    TogglePause,
    SubmitRating {
        #[serde(default)]
        valence: Option<u8>,
        #[serde(default)]
        arousal: Option<u8>,
    },
    ClosePrompt,
    VisualPrediction(AffectPrediction),
    PassivePrediction(AffectPrediction),
    SetStudyConfig {
        config: Value,
    },
    SetPlaylist {
        playlist: Vec<VideoDescriptor>,
    },
    ExportAll {
        path: PathBuf,
    },
    ExportSession {
        path: PathBuf,
    },
}

/// One line on stdout.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SurfaceEvent {
    LoadVideo {
        video: VideoDescriptor,
    },
    Pause,
    Play,
    ShowRatingPrompt {
        #[serde(rename = "advanceAfter")]
        advance_after: bool,
    },
    HideRatingPrompt,
    CommandFailed {
        message: String,
    },
}

pub fn parse_line(line: &str) -> Result<HostEvent> {
    serde_json::from_str(line).with_context(|| format!("Unrecognised host event: {line}"))
}
