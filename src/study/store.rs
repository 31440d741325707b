use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{Database, RecordKind},
    models::{
        FusedPrediction, Participant, PassivePrediction, Rating, RatingInput, Session,
        SessionStatus, VideoDescriptor, VisualPrediction,
    },
};

use super::{StudyAction, StudyPhase, StudyState};

const STUDY_CONFIG_ID: &str = "study";

/// Something the study holds open on behalf of a sensor (camera stream,
/// physiology link) that must be let go when the study resets.
pub trait SensorResource: Send + Sync {
    fn name(&self) -> &str;
    fn release(&self);
}

/// Shared handle over the study state. Every mutation goes through a named
/// operation; operations that change the session re-save it when storage is
/// available. Persistence is best-effort and never undoes a transition.
#[derive(Clone)]
pub struct StudyStore {
    state: Arc<Mutex<StudyState>>,
    db: Option<Database>,
    sensors: Arc<Mutex<Vec<Arc<dyn SensorResource>>>>,
}

impl StudyStore {
    pub fn new(db: Option<Database>) -> Self {
        let mut state = StudyState::new();
        state.apply(StudyAction::SetStorageAvailable(db.is_some()));
        Self {
            state: Arc::new(Mutex::new(state)),
            db,
            sensors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StudyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, action: StudyAction) {
        self.lock().apply(action);
    }

    /// Runs `write` against the database while `state` is still locked, so
    /// queued writes land in the same order as the transitions they follow.
    fn persist<F>(&self, state: &StudyState, what: &str, write: F)
    where
        F: FnOnce(&Database) -> Result<()>,
    {
        let Some(db) = self.db.as_ref().filter(|_| state.storage_available) else {
            return;
        };
        if let Err(err) = write(db) {
            warn!("Could not persist {what}, continuing in memory: {err:#}");
        }
    }

    /// Rewrites the current session with `change` and saves it if `change`
    /// reports a modification. Returns `None` when there is no session.
    fn update_session<F, R>(&self, operation: &str, change: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> (bool, R),
    {
        let mut state = self.lock();
        let Some(session) = state.session.as_mut() else {
            warn!("{operation}: no active session, ignoring");
            return None;
        };
        let (changed, result) = change(session);
        if changed {
            if let Some(session) = state.session.as_ref() {
                self.persist(&state, "session", |db| db.save_session(session));
            }
        }
        Some(result)
    }

    pub fn snapshot(&self) -> StudyState {
        self.lock().clone()
    }

    /// Runs `read` against the current state without cloning it.
    pub fn with_state<R>(&self, read: impl FnOnce(&StudyState) -> R) -> R {
        read(&self.lock())
    }

    pub fn storage_available(&self) -> bool {
        self.lock().storage_available
    }

    pub fn set_participant(&self, participant: Participant) {
        info!("Participant {} registered", participant.id);
        let mut state = self.lock();
        self.persist(&state, "participant", |db| {
            db.save_participant(&participant)?;
            db.set_current_participant_id(&participant.id)
        });
        state.apply(StudyAction::SetParticipant(Some(participant)));
    }

    /// Creates a fresh session and makes it current, replacing any previous one.
    pub fn start_session(&self, participant_id: &str) -> Session {
        let session = Session::begin(participant_id);
        info!(
            "Starting session {} for participant {}",
            session.id, participant_id
        );
        let mut state = self.lock();
        state.apply(StudyAction::SetSession(Some(session.clone())));
        state.apply(StudyAction::SetPhase(StudyPhase::Video));
        self.persist(&state, "session", |db| {
            db.save_session(&session)?;
            db.set_current_session_id(&session.id)
        });
        session
    }

    pub fn finish_session(&self) -> Option<Session> {
        let finished = self.update_session("finish_session", |session| {
            let changed = session.status != SessionStatus::Completed;
            session.status = SessionStatus::Completed;
            (changed, session.clone())
        })?;
        self.dispatch(StudyAction::SetPhase(StudyPhase::Complete));
        Some(finished)
    }

    /// Sets the current video and notes the first time the session reaches it.
    pub fn set_current_video(&self, video: VideoDescriptor) {
        self.dispatch(StudyAction::SetCurrentVideo(Some(video.clone())));
        let has_session = self.lock().session.is_some();
        if has_session {
            let now = Utc::now();
            self.update_session("set_current_video", |session| {
                (session.note_video(&video, now), ())
            });
        }
    }

    /// Forgets the current video. The session's visit list is kept.
    pub fn clear_current_video(&self) {
        let mut state = self.lock();
        state.apply(StudyAction::SetCurrentVideo(None));
        state.apply(StudyAction::SetVideoTime(0.0));
    }

    pub fn set_video_time(&self, seconds: f64) {
        self.dispatch(StudyAction::SetVideoTime(seconds));
    }

    pub fn set_paused(&self, paused: bool) {
        self.dispatch(StudyAction::SetPaused(paused));
    }

    pub fn set_study_phase(&self, phase: StudyPhase) {
        self.dispatch(StudyAction::SetPhase(phase));
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("Study error: {message}");
        self.dispatch(StudyAction::SetError(message));
    }

    pub fn clear_error(&self) {
        self.dispatch(StudyAction::ClearError);
    }

    pub fn set_study_config(&self, config: Value) {
        let mut state = self.lock();
        self.persist(&state, "study config", |db| {
            db.save_record(RecordKind::Config, STUDY_CONFIG_ID, &config)
        });
        state.apply(StudyAction::SetStudyConfig(Some(config)));
    }

    pub fn record_rating(&self, input: RatingInput) -> Option<Rating> {
        let rating = Rating {
            id: Uuid::new_v4().to_string(),
            video_id: input.video_id,
            video_time_sec: input.video_time_sec.max(0.0).floor() as u64,
            valence: input.valence,
            arousal: input.arousal,
            recorded_at: Utc::now(),
        };
        self.update_session("record_rating", |session| {
            session.ratings.push(rating.clone());
            (true, rating)
        })
    }

    pub fn record_visual_prediction(&self, prediction: VisualPrediction) -> bool {
        let buffered = prediction.clone();
        let recorded = self
            .update_session("record_visual_prediction", |session| {
                session.visual_predictions.push(prediction);
                (true, ())
            })
            .is_some();
        if recorded {
            self.dispatch(StudyAction::BufferVisual(buffered));
        }
        recorded
    }

    pub fn record_passive_prediction(&self, prediction: PassivePrediction) -> bool {
        let buffered = prediction.clone();
        let recorded = self
            .update_session("record_passive_prediction", |session| {
                session.passive_predictions.push(prediction);
                (true, ())
            })
            .is_some();
        if recorded {
            self.dispatch(StudyAction::BufferPassive(buffered));
        }
        recorded
    }

    pub fn record_fused_prediction(&self, prediction: FusedPrediction) -> bool {
        let buffered = prediction.clone();
        let recorded = self
            .update_session("record_fused_prediction", |session| {
                session.fused_predictions.push(prediction);
                (true, ())
            })
            .is_some();
        if recorded {
            self.dispatch(StudyAction::BufferFused(buffered));
        }
        recorded
    }

    pub fn register_sensor(&self, sensor: Arc<dyn SensorResource>) {
        self.sensors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sensor);
    }

    /// Releases sensors and returns to the initial state. The storage flag
    /// survives; persisted records are left untouched.
    pub fn reset_study(&self) {
        let sensors: Vec<_> = self
            .sensors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for sensor in sensors {
            info!("Releasing sensor {}", sensor.name());
            sensor.release();
        }
        self.dispatch(StudyAction::Reset);
        info!("Study state reset");
    }

    /// Restores the config, participant and session recorded as current by a
    /// previous run.
    pub async fn hydrate(&self) -> Result<()> {
        let Some(db) = self.db.clone().filter(|_| self.storage_available()) else {
            return Ok(());
        };

        if let Some(config) = db
            .load_record::<Value>(RecordKind::Config, STUDY_CONFIG_ID)
            .await?
        {
            self.dispatch(StudyAction::SetStudyConfig(Some(config)));
        }

        if let Some(participant_id) = db.current_participant_id().await? {
            match db.load_participant(&participant_id).await? {
                Some(participant) => {
                    info!("Rehydrated participant {}", participant.id);
                    let mut state = self.lock();
                    state.apply(StudyAction::SetParticipant(Some(participant)));
                    state.apply(StudyAction::SetPhase(StudyPhase::Video));
                }
                None => warn!("Current participant {participant_id} has no stored record"),
            }
        }

        if let Some(session_id) = db.current_session_id().await? {
            match db.load_session(&session_id).await? {
                Some(session) => {
                    info!("Rehydrated session {}", session.id);
                    let mut state = self.lock();
                    for prediction in &session.visual_predictions {
                        state.apply(StudyAction::BufferVisual(prediction.clone()));
                    }
                    for prediction in &session.passive_predictions {
                        state.apply(StudyAction::BufferPassive(prediction.clone()));
                    }
                    for prediction in &session.fused_predictions {
                        state.apply(StudyAction::BufferFused(prediction.clone()));
                    }
                    state.apply(StudyAction::SetSession(Some(session)));
                }
                None => warn!("Current session {session_id} has no stored record"),
            }
        }

        Ok(())
    }
}
