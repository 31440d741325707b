//! SAM rating capture.
//!
//! Drafts come straight from the prompt UI, where either axis may still be
//! unset. Only complete, in-range drafts reach the store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SAM_MIN: u8 = 1;
pub const SAM_MAX: u8 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RatingError {
    #[error("valence has not been selected")]
    MissingValence,

    #[error("arousal has not been selected")]
    MissingArousal,

    #[error("{axis} value {value} is outside the 1-5 scale")]
    OutOfRange { axis: &'static str, value: u8 },

    #[error("no rating prompt is open")]
    NoPromptOpen,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RatingDraft {
    pub valence: Option<u8>,
    pub arousal: Option<u8>,
}

/// A validated two-axis response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamResponse {
    pub valence: u8,
    pub arousal: u8,
}

impl RatingDraft {
    pub fn new(valence: u8, arousal: u8) -> Self {
        Self {
            valence: Some(valence),
            arousal: Some(arousal),
        }
    }

    pub fn validate(&self) -> Result<SamResponse, RatingError> {
        let valence = self.valence.ok_or(RatingError::MissingValence)?;
        let arousal = self.arousal.ok_or(RatingError::MissingArousal)?;
        check_axis("valence", valence)?;
        check_axis("arousal", arousal)?;
        Ok(SamResponse { valence, arousal })
    }
}

fn check_axis(axis: &'static str, value: u8) -> Result<(), RatingError> {
    if (SAM_MIN..=SAM_MAX).contains(&value) {
        Ok(())
    } else {
        Err(RatingError::OutOfRange { axis, value })
    }
}
