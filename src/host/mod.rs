//! Line-delimited JSON bridge between the study core and the renderer.
//!
//! Host events arrive one per line on stdin and are handled strictly in
//! order. Commands that fail are answered with a `commandFailed` line.

pub mod commands;
pub mod emitter;
pub mod events;

pub use emitter::JsonLineSurface;
pub use events::{parse_line, HostEvent, SurfaceEvent};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{rating::RatingDraft, AppState};

// Set to true to log every inbound host event
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

pub async fn handle_event(state: &AppState, event: HostEvent) -> Result<(), String> {
    match event {
        HostEvent::Register { name } => commands::register(state, &name).map(|_| ()),
        HostEvent::StartSession => commands::start_session(state).await.map(|_| ()),
        HostEvent::FinishSession => commands::finish_session(state).await.map(|_| ()),
        HostEvent::Reset => commands::reset(state).await,
        HostEvent::TimeUpdate { seconds } => commands::time_update(state, seconds).await,
        HostEvent::MediaEnded => commands::media_ended(state).await.map(|_| ()),
        HostEvent::TogglePause => commands::toggle_pause(state).await.map(|_| ()),
        HostEvent::SubmitRating { valence, arousal } => {
            commands::submit_rating(state, RatingDraft { valence, arousal })
                .await
                .map(|_| ())
        }
        HostEvent::ClosePrompt => commands::close_prompt(state).await.map(|_| ()),
        HostEvent::VisualPrediction(prediction) => {
            commands::visual_prediction(state, prediction).map(|_| ())
        }
        HostEvent::PassivePrediction(prediction) => {
            commands::passive_prediction(state, prediction).map(|_| ())
        }
        HostEvent::SetStudyConfig { config } => commands::set_study_config(state, config),
        HostEvent::SetPlaylist { playlist } => commands::set_playlist(state, playlist).await,
        HostEvent::ExportAll { path } => commands::export_all(state, &path).await,
        HostEvent::ExportSession { path } => commands::export_session(state, &path),
    }
}

/// Reads host events until `input` closes.
pub async fn serve<R>(state: &AppState, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read host event")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = match parse_line(line) {
            Ok(event) => {
                log_debug!("Host event: {event:?}");
                handle_event(state, event).await
            }
            Err(err) => {
                log_error!("Dropping malformed host event: {err:#}");
                Err(format!("{err:#}"))
            }
        };

        match outcome {
            Ok(()) => state.store.clear_error(),
            Err(message) => {
                state.store.set_error(message.clone());
                state.events.emit(&SurfaceEvent::CommandFailed { message });
            }
        }
    }
    log_debug!("Host input closed");
    Ok(())
}
