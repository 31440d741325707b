use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    models::{Rating, RatingInput, VideoDescriptor},
    rating::{RatingDraft, RatingError},
    settings::TimingSettings,
    study::{StudyPhase, StudyStore},
};

use super::{
    state::{PlaybackState, RatingPrompt},
    PlaybackSnapshot, PlaybackStatus, PlayerSurface,
};

// Set to true to log every prompt and playlist transition
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Result of a completed rating prompt. `resume` finishes once playback has
/// been resumed (or the resume was cancelled).
pub struct RatingOutcome {
    pub rating: Option<Rating>,
    pub resume: JoinHandle<()>,
}

/// Drives the rating cadence and the playlist from player callbacks.
#[derive(Clone)]
pub struct PlaybackController {
    state: Arc<Mutex<PlaybackState>>,
    store: StudyStore,
    surface: Arc<dyn PlayerSurface>,
    rating_interval_secs: u64,
    resume_delay: Duration,
}

impl PlaybackController {
    pub fn new(
        store: StudyStore,
        surface: Arc<dyn PlayerSurface>,
        timing: &TimingSettings,
        playlist: Vec<VideoDescriptor>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlaybackState::new(playlist))),
            store,
            surface,
            rating_interval_secs: timing.rating_interval_secs.max(1),
            resume_delay: timing.resume_delay(),
        }
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Loads the first playlist entry. With an empty playlist nothing is
    /// loaded and the controller stays idle.
    pub async fn start(&self) -> Option<VideoDescriptor> {
        let mut state = self.state.lock().await;
        if state.playlist.is_empty() {
            log_warn!("Playlist is empty; playback stays idle");
            return None;
        }
        state.cancel_pending_resume();
        state.prompt = None;
        let video = self.load_entry(&mut state, 0);
        self.store.set_paused(false);
        self.surface.play();
        state.status = PlaybackStatus::Playing;
        video
    }

    /// Periodic time update from the player. Returns true when this update
    /// opened a rating prompt.
    pub async fn on_time_update(&self, elapsed_secs: f64) -> bool {
        if !elapsed_secs.is_finite() {
            log_warn!("Ignoring non-finite playback time {elapsed_secs}");
            return false;
        }
        let mut state = self.state.lock().await;
        if state.status == PlaybackStatus::Idle {
            return false;
        }
        self.store.set_video_time(elapsed_secs);

        let Some(video_id) = self.current_video_id() else {
            return false;
        };

        let second = elapsed_secs.max(0.0).floor() as u64;
        state.rating_gate.follow(&video_id);

        if second == 0 || second % self.rating_interval_secs != 0 {
            return false;
        }
        if state.rating_gate.is_handled(second) {
            log_debug!("Rating at {second}s already triggered for {video_id}");
            return false;
        }

        state.rating_gate.mark(second);
        log_info!("Rating prompt at {second}s of {video_id}");
        self.open_prompt(&mut state, false);
        true
    }

    /// End-of-media callback: prompt for a rating that advances the playlist.
    pub async fn on_media_ended(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.status == PlaybackStatus::Idle {
            return false;
        }
        let Some(video_id) = self.current_video_id() else {
            return false;
        };
        if state.prompt.map(|prompt| prompt.advance_after) == Some(true) {
            log_debug!("End-of-media prompt already open for {video_id}");
            return false;
        }
        log_info!("Video {video_id} ended");
        self.open_prompt(&mut state, true);
        true
    }

    /// User-initiated pause/resume. Ignored while a prompt is open.
    pub async fn toggle_manual_pause(&self) -> PlaybackStatus {
        let mut state = self.state.lock().await;
        match state.status {
            PlaybackStatus::Playing => {
                self.surface.pause();
                self.store.set_paused(true);
                state.status = PlaybackStatus::PausedManual;
            }
            PlaybackStatus::PausedManual => {
                self.surface.play();
                self.store.set_paused(false);
                state.status = PlaybackStatus::Playing;
            }
            other => log_debug!("Manual pause ignored while {other:?}"),
        }
        state.status
    }

    /// Records the rating, closes the prompt and schedules the resume. The
    /// prompt stays open if the draft is incomplete.
    pub async fn complete_rating(&self, draft: RatingDraft) -> Result<RatingOutcome, RatingError> {
        let mut state = self.state.lock().await;
        let prompt = state.prompt.ok_or(RatingError::NoPromptOpen)?;
        let response = draft.validate()?;
        state.prompt = None;

        let (video_id, video_time) = self.store.with_state(|study| {
            (
                study.current_video_id().map(str::to_owned),
                study.video_time,
            )
        });
        let rating = match video_id {
            Some(video_id) => self.store.record_rating(RatingInput {
                video_id,
                video_time_sec: video_time,
                valence: response.valence,
                arousal: response.arousal,
            }),
            None => {
                log_warn!("Rating submitted with no current video; not recorded");
                None
            }
        };

        self.surface.hide_rating_prompt();
        self.store.set_paused(false);
        self.store.set_study_phase(StudyPhase::Video);
        state.status = PlaybackStatus::Resuming;

        state.cancel_pending_resume();
        let token = CancellationToken::new();
        state.pending_resume = Some(token.clone());
        drop(state);

        let controller = self.clone();
        let resume = tokio::spawn(async move {
            controller.resume_after_delay(token, prompt).await;
        });

        Ok(RatingOutcome { rating, resume })
    }

    /// Dismisses the prompt without a rating. An auto-paused player resumes
    /// immediately; nothing is recorded.
    pub async fn close_prompt(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.prompt.take().is_none() {
            return false;
        }
        self.surface.hide_rating_prompt();
        self.store.set_paused(false);
        self.store.set_study_phase(StudyPhase::Video);
        self.surface.play();
        state.status = PlaybackStatus::Playing;
        log_info!("Rating prompt dismissed without a rating");
        true
    }

    /// Hides an open prompt, pauses the player and forgets the current video.
    /// The playlist is kept; playback stays idle until `start`.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        self.halt(&mut state);
        let playlist = std::mem::take(&mut state.playlist);
        *state = PlaybackState::new(playlist);
    }

    /// Replaces the playlist. Playback stops and stays idle until `start`.
    pub async fn set_playlist(&self, playlist: Vec<VideoDescriptor>) {
        let mut state = self.state.lock().await;
        self.halt(&mut state);
        log_info!("Playlist replaced ({} entries)", playlist.len());
        *state = PlaybackState::new(playlist);
    }

    fn halt(&self, state: &mut PlaybackState) {
        state.cancel_pending_resume();
        if state.prompt.take().is_some() {
            self.surface.hide_rating_prompt();
        }
        if state.status != PlaybackStatus::Idle {
            self.surface.pause();
            self.store.set_paused(true);
            log_info!("Playback stopped");
        }
        self.store.clear_current_video();
    }

    async fn resume_after_delay(&self, token: CancellationToken, prompt: RatingPrompt) {
        tokio::select! {
            _ = time::sleep(self.resume_delay) => {}
            _ = token.cancelled() => {
                log_debug!("Pending resume cancelled");
                return;
            }
        }

        let mut state = self.state.lock().await;
        if token.is_cancelled() {
            return;
        }
        state.pending_resume = None;

        if prompt.advance_after {
            if let Some(next) = state.next_index() {
                self.load_entry(&mut state, next);
            }
        }
        self.surface.play();
        state.status = PlaybackStatus::Playing;
    }

    fn open_prompt(&self, state: &mut PlaybackState, advance_after: bool) {
        state.cancel_pending_resume();
        self.surface.pause();
        self.store.set_paused(true);
        self.surface.show_rating_prompt(advance_after);
        self.store.set_study_phase(StudyPhase::Rating);
        state.prompt = Some(RatingPrompt { advance_after });
        state.status = if advance_after {
            PlaybackStatus::Ended
        } else {
            PlaybackStatus::PausedForRating
        };
    }

    fn load_entry(&self, state: &mut PlaybackState, index: usize) -> Option<VideoDescriptor> {
        let video = state.playlist.get(index)?.clone();
        state.video_index = index;
        state.rating_gate.follow(&video.id);
        self.store.set_current_video(video.clone());
        self.store.set_video_time(0.0);
        self.surface.load_video(&video);
        log_info!("Loaded playlist entry {index}: {}", video.id);
        Some(video)
    }

    fn current_video_id(&self) -> Option<String> {
        self.store
            .with_state(|study| study.current_video_id().map(str::to_owned))
    }
}
