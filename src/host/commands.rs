use std::path::Path;

use serde_json::Value;

use crate::{
    db::write_json_file,
    models::{AffectPrediction, Participant, Rating, Session, VideoDescriptor},
    playback::PlaybackStatus,
    rating::RatingDraft,
    AppState,
};

pub fn register(state: &AppState, name: &str) -> Result<Participant, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Participant name is required".to_string());
    }
    let participant = Participant::register(name);
    state.store.set_participant(participant.clone());
    Ok(participant)
}

/// Opens a new session for the registered participant and starts the
/// playlist from its first entry.
pub async fn start_session(state: &AppState) -> Result<Session, String> {
    let participant_id = state
        .store
        .with_state(|study| study.participant.as_ref().map(|p| p.id.clone()))
        .ok_or_else(|| "No participant registered".to_string())?;

    state.fusion.reset();
    state.playback.stop().await;
    let session = state.store.start_session(&participant_id);
    state.playback.start().await;
    Ok(session)
}

/// Completes the session and stops the player so no further prompts or
/// fused records reach it.
pub async fn finish_session(state: &AppState) -> Result<Option<Session>, String> {
    state.fusion.reset();
    state.playback.stop().await;
    Ok(state.store.finish_session())
}

/// Stops the player, wipes stored study data and returns to registration.
pub async fn reset(state: &AppState) -> Result<(), String> {
    state.fusion.reset();
    state.playback.stop().await;
    if let Some(db) = state.db.as_ref().filter(|_| state.store.storage_available()) {
        db.clear_all().map_err(|e| format!("{e:#}"))?;
    }
    state.store.reset_study();
    Ok(())
}

/// Player time update: rating cadence first, then the fusion boundary check.
pub async fn time_update(state: &AppState, seconds: f64) -> Result<(), String> {
    state.playback.on_time_update(seconds).await;
    // The spawned request records its own result.
    let _ = state.fusion.on_playback_tick();
    Ok(())
}

pub async fn media_ended(state: &AppState) -> Result<bool, String> {
    Ok(state.playback.on_media_ended().await)
}

pub async fn toggle_pause(state: &AppState) -> Result<PlaybackStatus, String> {
    Ok(state.playback.toggle_manual_pause().await)
}

pub async fn submit_rating(state: &AppState, draft: RatingDraft) -> Result<Option<Rating>, String> {
    let outcome = state
        .playback
        .complete_rating(draft)
        .await
        .map_err(|e| e.to_string())?;
    Ok(outcome.rating)
}

pub async fn close_prompt(state: &AppState) -> Result<bool, String> {
    Ok(state.playback.close_prompt().await)
}

pub fn visual_prediction(state: &AppState, prediction: AffectPrediction) -> Result<bool, String> {
    Ok(state.store.record_visual_prediction(prediction))
}

pub fn passive_prediction(state: &AppState, prediction: AffectPrediction) -> Result<bool, String> {
    Ok(state.store.record_passive_prediction(prediction))
}

pub fn set_study_config(state: &AppState, config: Value) -> Result<(), String> {
    state.store.set_study_config(config);
    Ok(())
}

pub async fn set_playlist(state: &AppState, playlist: Vec<VideoDescriptor>) -> Result<(), String> {
    state
        .settings
        .update_playlist(playlist.clone())
        .map_err(|e| format!("{e:#}"))?;
    state.playback.set_playlist(playlist).await;
    Ok(())
}

pub async fn export_all(state: &AppState, path: &Path) -> Result<(), String> {
    let db = state
        .db
        .as_ref()
        .filter(|_| state.store.storage_available())
        .ok_or_else(|| "Storage is unavailable; nothing to export".to_string())?;
    let export = db.export_all().await.map_err(|e| format!("{e:#}"))?;
    write_json_file(path, &export).map_err(|e| format!("{e:#}"))
}

pub fn export_session(state: &AppState, path: &Path) -> Result<(), String> {
    let session = state
        .store
        .snapshot()
        .session
        .ok_or_else(|| "No active session to export".to_string())?;
    write_json_file(path, &session).map_err(|e| format!("{e:#}"))
}
