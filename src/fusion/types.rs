//! Wire types for the fusion service.
//!
//! Request: `{visual: {valence, arousal, confidence} | null,
//! passive: {valence, arousal} | null, videoId, videoTimeSec}`.
//! Response fields are all optional; anything that is not the expected JSON
//! type is treated as absent.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{AffectPrediction, FusedPrediction};

pub const DEFAULT_STRATEGY: &str = "rule_based";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualInput {
    pub valence: f64,
    pub arousal: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassiveInput {
    pub valence: f64,
    pub arousal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FusionRequest {
    pub visual: Option<VisualInput>,
    pub passive: Option<PassiveInput>,
    pub video_id: String,
    pub video_time_sec: u64,
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

impl FusionRequest {
    pub fn build(
        video_id: &str,
        boundary: u64,
        visual: Option<&AffectPrediction>,
        passive: Option<&AffectPrediction>,
    ) -> Self {
        Self {
            visual: visual.map(|p| VisualInput {
                valence: finite_or_zero(p.valence),
                arousal: finite_or_zero(p.arousal),
                confidence: finite_or_zero(p.confidence).clamp(0.0, 1.0),
            }),
            passive: passive.map(|p| PassiveInput {
                valence: finite_or_zero(p.valence),
                arousal: finite_or_zero(p.arousal),
            }),
            video_id: video_id.to_string(),
            video_time_sec: boundary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionResponse {
    pub valence: Option<f64>,
    pub arousal: Option<f64>,
    pub discrete_emotion: Option<String>,
    pub fusion_confidence: Option<f64>,
    pub strategy: Option<String>,
}

impl FusionResponse {
    pub fn from_json(body: &Value) -> Self {
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Self {
            valence: body.get("valence").and_then(Value::as_f64),
            arousal: body.get("arousal").and_then(Value::as_f64),
            discrete_emotion: text("discrete_emotion"),
            fusion_confidence: body.get("fusion_confidence").and_then(Value::as_f64),
            strategy: text("strategy"),
        }
    }

    /// Stamps the response into a record for `video_id` at `boundary`.
    pub fn into_prediction(self, video_id: &str, boundary: u64) -> FusedPrediction {
        FusedPrediction {
            id: Uuid::new_v4().to_string(),
            at: Utc::now(),
            video_id: video_id.to_string(),
            video_time_sec: boundary,
            valence: self.valence,
            arousal: self.arousal,
            discrete_emotion: self.discrete_emotion,
            fusion_confidence: self.fusion_confidence,
            strategy: self.strategy.unwrap_or_else(|| DEFAULT_STRATEGY.to_string()),
        }
    }
}
