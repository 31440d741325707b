use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    models::AffectPrediction,
    playback::{align_to_boundary, BoundaryGate},
    settings::TimingSettings,
    study::StudyStore,
};

use super::{FusionBackend, FusionRequest};

// Set to true to log boundary decisions and fusion outcomes
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// A request that has claimed its boundary and is ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFusion {
    pub session_id: String,
    pub request: FusionRequest,
}

/// Newest entry for `video_id` at or before `boundary`.
pub fn latest_at<'a>(
    buffer: &'a [AffectPrediction],
    video_id: &str,
    boundary: u64,
) -> Option<&'a AffectPrediction> {
    buffer.iter().rev().find(|p| {
        p.video_id == video_id && p.video_time_sec.is_finite() && p.video_time_sec <= boundary as f64
    })
}

/// Emits at most one fusion request per (video, boundary).
///
/// The boundary is claimed synchronously in `plan`, before any request is in
/// flight, so repeated time updates on the same boundary cannot double-send.
#[derive(Clone)]
pub struct FusionScheduler {
    store: StudyStore,
    backend: Arc<dyn FusionBackend>,
    gate: Arc<Mutex<BoundaryGate>>,
    in_flight: Arc<Mutex<CancellationToken>>,
    boundary_secs: u64,
}

impl FusionScheduler {
    pub fn new(store: StudyStore, backend: Arc<dyn FusionBackend>, timing: &TimingSettings) -> Self {
        Self {
            store,
            backend,
            gate: Arc::new(Mutex::new(BoundaryGate::new())),
            in_flight: Arc::new(Mutex::new(CancellationToken::new())),
            boundary_secs: timing.fusion_boundary_secs.max(1),
        }
    }

    fn gate(&self) -> MutexGuard<'_, BoundaryGate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_boundary(&self) -> Option<u64> {
        self.gate().last()
    }

    /// Decides whether the current playback position needs a fusion request
    /// and, if so, claims the boundary and builds the payload.
    pub fn plan(&self) -> Option<PlannedFusion> {
        let (session_id, video_id, video_time) = self.store.with_state(|study| {
            if study.is_paused {
                return None;
            }
            Some((
                study.session_id()?.to_owned(),
                study.current_video_id()?.to_owned(),
                study.video_time,
            ))
        })?;

        let mut gate = self.gate();
        if gate.follow(&video_id) {
            log_debug!("Fusion boundary marker reset for video {video_id}");
        }

        let boundary = align_to_boundary(video_time, self.boundary_secs);
        if boundary == 0 || gate.is_handled(boundary) {
            return None;
        }

        let (visual, passive) = self.store.with_state(|study| {
            (
                latest_at(&study.visual_predictions, &video_id, boundary).cloned(),
                latest_at(&study.passive_predictions, &video_id, boundary).cloned(),
            )
        });
        if visual.is_none() && passive.is_none() {
            log_debug!("No predictions yet for {video_id} at {boundary}s");
            return None;
        }

        gate.mark(boundary);
        Some(PlannedFusion {
            session_id,
            request: FusionRequest::build(&video_id, boundary, visual.as_ref(), passive.as_ref()),
        })
    }

    /// Called on every playback time update. Returns the handle of the
    /// spawned request, if one was issued.
    pub fn on_playback_tick(&self) -> Option<JoinHandle<()>> {
        let planned = self.plan()?;
        let token = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        log_info!(
            "Fusion request for {} at {}s (visual: {}, passive: {})",
            planned.request.video_id,
            planned.request.video_time_sec,
            planned.request.visual.is_some(),
            planned.request.passive.is_some()
        );

        let store = self.store.clone();
        let backend = self.backend.clone();
        Some(tokio::spawn(dispatch(store, backend, planned, token)))
    }

    /// Cancels in-flight requests and forgets the processed boundary.
    pub fn reset(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.cancel();
        *in_flight = CancellationToken::new();
        self.gate().clear();
    }
}

async fn dispatch(
    store: StudyStore,
    backend: Arc<dyn FusionBackend>,
    planned: PlannedFusion,
    token: CancellationToken,
) {
    let PlannedFusion {
        session_id,
        request,
    } = planned;
    let video_id = request.video_id.clone();
    let boundary = request.video_time_sec;

    let result = tokio::select! {
        result = backend.predict(request) => result,
        _ = token.cancelled() => {
            log_debug!("Fusion request for {video_id} at {boundary}s cancelled");
            return;
        }
    };

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            log_warn!("Fusion for {video_id} at {boundary}s dropped: {err}");
            return;
        }
    };

    let still_current = store.with_state(|study| study.session_id() == Some(session_id.as_str()));
    if !still_current {
        log_warn!("Fusion response for session {session_id} arrived after it ended; dropped");
        return;
    }

    let fused = response.into_prediction(&video_id, boundary);
    if store.record_fused_prediction(fused) {
        log_debug!("Recorded fused prediction for {video_id} at {boundary}s");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fusion::{FusionError, FusionFuture, FusionResponse, DEFAULT_STRATEGY},
        models::{VideoDescriptor, VideoKind},
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// Records requests; optionally holds each response until released.
    struct ScriptedBackend {
        requests: Mutex<Vec<FusionRequest>>,
        fail: AtomicBool,
        hold: Option<Arc<Notify>>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                hold: None,
            }
        }

        fn held(release: Arc<Notify>) -> Self {
            Self {
                hold: Some(release),
                ..Self::new()
            }
        }

        fn requests(&self) -> Vec<FusionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl FusionBackend for ScriptedBackend {
        fn predict(&self, request: FusionRequest) -> FusionFuture {
            self.requests.lock().unwrap().push(request);
            let fail = self.fail.load(Ordering::SeqCst);
            let hold = self.hold.clone();
            Box::pin(async move {
                if let Some(release) = hold {
                    release.notified().await;
                }
                if fail {
                    Err(FusionError::Status(500))
                } else {
                    Ok(FusionResponse {
                        valence: Some(0.3),
                        arousal: Some(0.6),
                        ..FusionResponse::default()
                    })
                }
            })
        }
    }

    fn clip(id: &str) -> VideoDescriptor {
        VideoDescriptor {
            id: id.into(),
            name: id.to_uppercase(),
            kind: VideoKind::File,
            link: format!("/media/{id}.mp4"),
        }
    }

    fn prediction(video_id: &str, at: f64, valence: f64) -> AffectPrediction {
        AffectPrediction {
            video_id: video_id.into(),
            video_time_sec: at,
            valence: Some(valence),
            arousal: Some(0.5),
            confidence: None,
        }
    }

    fn setup(backend: Arc<ScriptedBackend>) -> (FusionScheduler, StudyStore) {
        let store = StudyStore::new(None);
        store.start_session("p1");
        store.set_current_video(clip("v1"));
        let scheduler = FusionScheduler::new(store.clone(), backend, &TimingSettings::default());
        (scheduler, store)
    }

    #[tokio::test]
    async fn visual_only_boundary_sends_null_passive() {
        let backend = Arc::new(ScriptedBackend::new());
        let (scheduler, store) = setup(backend.clone());
        store.record_visual_prediction(prediction("v1", 5.0, 0.2));

        store.set_video_time(12.0);
        scheduler.on_playback_tick().unwrap().await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].passive, None);
        assert_eq!(requests[0].video_time_sec, 12);
        let visual = requests[0].visual.clone().unwrap();
        assert_eq!((visual.valence, visual.arousal), (0.2, 0.5));
    }

    #[tokio::test]
    async fn one_request_per_boundary() {
        let backend = Arc::new(ScriptedBackend::new());
        let (scheduler, store) = setup(backend.clone());
        store.record_passive_prediction(prediction("v1", 2.0, 0.1));

        let mut handles = Vec::new();
        for t in [11.9, 12.0, 12.2, 12.9, 17.0, 23.99, 24.0, 24.5] {
            store.set_video_time(t);
            handles.extend(scheduler.on_playback_tick());
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let boundaries: Vec<u64> = backend.requests().iter().map(|r| r.video_time_sec).collect();
        assert_eq!(boundaries, vec![12, 24]);
        assert_eq!(store.snapshot().fused_predictions.len(), 2);
    }

    #[tokio::test]
    async fn boundary_without_predictions_stays_open() {
        let backend = Arc::new(ScriptedBackend::new());
        let (scheduler, store) = setup(backend.clone());

        store.set_video_time(12.0);
        assert!(scheduler.on_playback_tick().is_none());
        assert_eq!(scheduler.last_boundary(), None);

        store.record_visual_prediction(prediction("v1", 11.0, 0.4));
        store.set_video_time(12.6);
        scheduler.on_playback_tick().unwrap().await.unwrap();
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(scheduler.last_boundary(), Some(12));
    }

    #[tokio::test]
    async fn picks_newest_prediction_not_after_boundary() {
        let backend = Arc::new(ScriptedBackend::new());
        let (scheduler, store) = setup(backend.clone());
        store.record_visual_prediction(prediction("v1", 3.0, 0.1));
        store.record_visual_prediction(prediction("v1", 10.0, 0.7));
        store.record_visual_prediction(prediction("v2", 11.0, 0.9));
        store.record_visual_prediction(prediction("v1", 13.0, 0.8));

        store.set_video_time(12.4);
        let planned = scheduler.plan().unwrap();
        assert_eq!(planned.request.visual.unwrap().valence, 0.7);
    }

    #[tokio::test]
    async fn paused_playback_is_skipped() {
        let backend = Arc::new(ScriptedBackend::new());
        let (scheduler, store) = setup(backend.clone());
        store.record_visual_prediction(prediction("v1", 5.0, 0.2));
        store.set_video_time(12.0);
        store.set_paused(true);

        assert!(scheduler.on_playback_tick().is_none());
        store.set_paused(false);
        assert!(scheduler.on_playback_tick().is_some());
    }

    #[tokio::test]
    async fn video_change_resets_marker() {
        let backend = Arc::new(ScriptedBackend::new());
        let (scheduler, store) = setup(backend.clone());
        store.record_visual_prediction(prediction("v1", 5.0, 0.2));
        store.record_visual_prediction(prediction("v2", 6.0, 0.3));

        store.set_video_time(12.0);
        scheduler.on_playback_tick().unwrap().await.unwrap();

        store.set_current_video(clip("v2"));
        store.set_video_time(12.0);
        scheduler.on_playback_tick().unwrap().await.unwrap();

        let sent: Vec<(String, u64)> = backend
            .requests()
            .into_iter()
            .map(|r| (r.video_id, r.video_time_sec))
            .collect();
        assert_eq!(sent, vec![("v1".to_string(), 12), ("v2".to_string(), 12)]);
    }

    #[tokio::test]
    async fn success_is_recorded_with_default_strategy() {
        let backend = Arc::new(ScriptedBackend::new());
        let (scheduler, store) = setup(backend);
        store.record_visual_prediction(prediction("v1", 30.0, 0.2));

        store.set_video_time(36.2);
        scheduler.on_playback_tick().unwrap().await.unwrap();

        let session = store.snapshot().session.unwrap();
        assert_eq!(session.fused_predictions.len(), 1);
        let fused = &session.fused_predictions[0];
        assert_eq!(fused.video_id, "v1");
        assert_eq!(fused.video_time_sec, 36);
        assert_eq!(fused.valence, Some(0.3));
        assert_eq!(fused.strategy, DEFAULT_STRATEGY);
    }

    #[tokio::test]
    async fn failed_call_records_nothing_and_keeps_marker() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail.store(true, Ordering::SeqCst);
        let (scheduler, store) = setup(backend.clone());
        store.record_visual_prediction(prediction("v1", 5.0, 0.2));

        store.set_video_time(12.0);
        scheduler.on_playback_tick().unwrap().await.unwrap();
        store.set_video_time(12.5);
        assert!(scheduler.on_playback_tick().is_none());

        assert_eq!(backend.requests().len(), 1);
        assert!(store.snapshot().fused_predictions.is_empty());
    }

    #[tokio::test]
    async fn response_for_replaced_session_is_dropped() {
        let release = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::held(release.clone()));
        let (scheduler, store) = setup(backend);
        store.record_visual_prediction(prediction("v1", 5.0, 0.2));

        store.set_video_time(12.0);
        let handle = scheduler.on_playback_tick().unwrap();
        store.start_session("p2");
        release.notify_one();
        handle.await.unwrap();

        assert!(store.snapshot().session.unwrap().fused_predictions.is_empty());
        assert!(store.snapshot().fused_predictions.is_empty());
    }

    #[tokio::test]
    async fn late_response_keeps_original_video() {
        let release = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::held(release.clone()));
        let (scheduler, store) = setup(backend);
        store.record_visual_prediction(prediction("v1", 5.0, 0.2));

        store.set_video_time(12.0);
        let handle = scheduler.on_playback_tick().unwrap();
        store.set_current_video(clip("v2"));
        release.notify_one();
        handle.await.unwrap();

        let fused = store.snapshot().fused_predictions;
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].video_id, "v1");
    }

    #[tokio::test]
    async fn reset_cancels_in_flight_request() {
        let release = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::held(release));
        let (scheduler, store) = setup(backend);
        store.record_visual_prediction(prediction("v1", 5.0, 0.2));

        store.set_video_time(12.0);
        let handle = scheduler.on_playback_tick().unwrap();
        scheduler.reset();
        handle.await.unwrap();

        assert_eq!(scheduler.last_boundary(), None);
        assert!(store.snapshot().fused_predictions.is_empty());
    }
}
