use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    FusedPrediction, Participant, PassivePrediction, Session, VideoDescriptor, VisualPrediction,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StudyPhase {
    Registration,
    Video,
    Rating,
    Complete,
}

impl Default for StudyPhase {
    fn default() -> Self {
        StudyPhase::Registration
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyState {
    pub phase: StudyPhase,
    pub participant: Option<Participant>,
    pub session: Option<Session>,
    pub study_config: Option<Value>,
    pub storage_available: bool,
    pub current_video: Option<VideoDescriptor>,
    pub video_time: f64,
    pub is_paused: bool,
    pub error: Option<String>,
    /// In-memory copies for fast lookups; the session holds the persisted ones.
    pub visual_predictions: Vec<VisualPrediction>,
    pub passive_predictions: Vec<PassivePrediction>,
    pub fused_predictions: Vec<FusedPrediction>,
}

#[derive(Debug, Clone)]
pub enum StudyAction {
    SetParticipant(Option<Participant>),
    SetSession(Option<Session>),
    SetStudyConfig(Option<Value>),
    SetStorageAvailable(bool),
    SetCurrentVideo(Option<VideoDescriptor>),
    SetVideoTime(f64),
    SetPaused(bool),
    SetPhase(StudyPhase),
    SetError(String),
    ClearError,
    BufferVisual(VisualPrediction),
    BufferPassive(PassivePrediction),
    BufferFused(FusedPrediction),
    Reset,
}

impl StudyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one transition. Side effects (persistence, sensor release) are
    /// the store's job; this only rewrites state.
    pub fn apply(&mut self, action: StudyAction) {
        match action {
            StudyAction::SetParticipant(participant) => self.participant = participant,
            StudyAction::SetSession(session) => self.session = session,
            StudyAction::SetStudyConfig(config) => self.study_config = config,
            StudyAction::SetStorageAvailable(available) => self.storage_available = available,
            StudyAction::SetCurrentVideo(video) => self.current_video = video,
            StudyAction::SetVideoTime(time) => self.video_time = time,
            StudyAction::SetPaused(paused) => self.is_paused = paused,
            StudyAction::SetPhase(phase) => self.phase = phase,
            StudyAction::SetError(message) => self.error = Some(message),
            StudyAction::ClearError => self.error = None,
            StudyAction::BufferVisual(prediction) => self.visual_predictions.push(prediction),
            StudyAction::BufferPassive(prediction) => self.passive_predictions.push(prediction),
            StudyAction::BufferFused(prediction) => self.fused_predictions.push(prediction),
            StudyAction::Reset => {
                *self = Self {
                    storage_available: self.storage_available,
                    ..Self::default()
                };
            }
        }
    }

    pub fn current_video_id(&self) -> Option<&str> {
        self.current_video.as_ref().map(|video| video.id.as_str())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.id.as_str())
    }
}
