pub mod db;
pub mod fusion;
pub mod host;
pub mod models;
pub mod playback;
pub mod rating;
pub mod settings;
pub mod study;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use db::Database;
use fusion::{FusionBackend, FusionScheduler, HttpFusionClient};
use host::JsonLineSurface;
use log::{info, warn};
use playback::PlaybackController;
use settings::SettingsStore;
use study::StudyStore;

const DATABASE_FILE: &str = "affect-study.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

pub struct AppState {
    pub(crate) store: StudyStore,
    pub(crate) playback: PlaybackController,
    pub(crate) fusion: FusionScheduler,
    pub(crate) settings: SettingsStore,
    pub(crate) db: Option<Database>,
    pub(crate) events: Arc<JsonLineSurface>,
}

impl AppState {
    /// Wires the store, controller and scheduler together. Without a
    /// database the study runs in memory only.
    pub fn assemble(
        db: Option<Database>,
        settings: SettingsStore,
        events: Arc<JsonLineSurface>,
        backend: Arc<dyn FusionBackend>,
    ) -> Self {
        let snapshot = settings.snapshot();
        let store = StudyStore::new(db.clone());
        let playback = PlaybackController::new(
            store.clone(),
            events.clone(),
            &snapshot.timing,
            snapshot.playlist,
        );
        let fusion = FusionScheduler::new(store.clone(), backend, &snapshot.timing);

        Self {
            store,
            playback,
            fusion,
            settings,
            db,
            events,
        }
    }
}

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("affect-study starting up...");

    if let Err(err) = serve_stdio() {
        log::error!("affect-study stopped: {err:#}");
        std::process::exit(1);
    }
}

fn serve_stdio() -> anyhow::Result<()> {
    let data_dir = settings::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    let db = match Database::new(data_dir.join(DATABASE_FILE)) {
        Ok(db) => Some(db),
        Err(err) => {
            warn!("Storage unavailable, running in memory only: {err:#}");
            None
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve_app(db, settings))
}

async fn serve_app(db: Option<Database>, settings: SettingsStore) -> anyhow::Result<()> {
    let backend = HttpFusionClient::new(&settings.snapshot().fusion_api_base)?;
    info!("Fusion endpoint: {}", backend.endpoint());

    let state = AppState::assemble(
        db,
        settings,
        Arc::new(JsonLineSurface::stdout()),
        Arc::new(backend),
    );

    // Pick up where a previous run left off.
    if let Err(err) = state.store.hydrate().await {
        warn!("Could not restore previous study state: {err:#}");
    }
    if state.store.with_state(|study| study.session.is_some()) {
        state.playback.start().await;
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    host::serve(&state, stdin).await
}
