use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::models::VideoDescriptor;

pub const DATA_DIR_ENV: &str = "AFFECT_STUDY_DATA_DIR";
pub const FUSION_API_ENV: &str = "AFFECT_STUDY_FUSION_API";
const DEFAULT_DATA_DIR: &str = "study-data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingSettings {
    /// Seconds of playback between automatic rating prompts.
    pub rating_interval_secs: u64,
    /// Fusion boundary spacing in seconds of playback.
    pub fusion_boundary_secs: u64,
    /// Delay between closing a completed prompt and resuming playback.
    pub resume_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            rating_interval_secs: 60,
            fusion_boundary_secs: 12,
            resume_delay_ms: 300,
        }
    }
}

impl TimingSettings {
    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StudySettings {
    pub fusion_api_base: String,
    pub timing: TimingSettings,
    pub playlist: Vec<VideoDescriptor>,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            fusion_api_base: "http://localhost:8001".into(),
            timing: TimingSettings::default(),
            playlist: Vec::new(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StudySettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                StudySettings::default()
            })
        } else {
            StudySettings::default()
        };

        if let Ok(base) = std::env::var(FUSION_API_ENV) {
            if !base.trim().is_empty() {
                data.fusion_api_base = base.trim().to_string();
            }
        }

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> StudySettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update_playlist(&self, playlist: Vec<VideoDescriptor>) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.playlist = playlist;
        self.persist(&guard)
    }

    fn persist(&self, data: &StudySettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// Data directory from `AFFECT_STUDY_DATA_DIR`, falling back to `./study-data`.
pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}
