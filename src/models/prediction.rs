//! Affect predictions.
//!
//! Visual (camera) and passive (physiology) estimators share one record shape;
//! fields are optional because the external sensors do not always report them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AffectPrediction {
    pub video_id: String,
    pub video_time_sec: f64,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub arousal: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

pub type VisualPrediction = AffectPrediction;
pub type PassivePrediction = AffectPrediction;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FusedPrediction {
    pub id: String,
    pub at: DateTime<Utc>,
    pub video_id: String,
    /// Always a positive multiple of the fusion boundary interval.
    pub video_time_sec: u64,
    pub valence: Option<f64>,
    pub arousal: Option<f64>,
    pub discrete_emotion: Option<String>,
    pub fusion_confidence: Option<f64>,
    pub strategy: String,
}
