//! Bulk export of everything the study has persisted.
//!
//! Records are exported verbatim (as stored JSON) so an export never fails on a
//! record whose shape predates the current models.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::db::{
    helpers::{parse_kind, parse_record, RecordKind},
    Database,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyExport {
    pub exported_at: DateTime<Utc>,
    pub participants: Vec<Value>,
    pub sessions: Vec<Value>,
    pub config: Option<Value>,
}

impl Database {
    pub async fn export_all(&self) -> Result<StudyExport> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, id, data FROM records
                 ORDER BY created_at ASC, id ASC",
            )?;

            let mut export = StudyExport {
                exported_at: Utc::now(),
                participants: Vec::new(),
                sessions: Vec::new(),
                config: None,
            };

            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let kind: String = row.get(0)?;
                let id: String = row.get(1)?;
                let raw: String = row.get(2)?;

                let kind = parse_kind(&kind)?;
                let value = parse_record(&raw, kind, &id)?;
                match kind {
                    RecordKind::Participant => export.participants.push(value),
                    RecordKind::Session => export.sessions.push(value),
                    RecordKind::Config => export.config = Some(value),
                }
            }

            Ok(export)
        })
        .await
    }
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create export directory {}", parent.display()))?;
        }
    }
    let serialized = serde_json::to_string_pretty(value)?;
    std::fs::write(path, serialized)
        .with_context(|| format!("failed to write export to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Participant, Session};

    #[tokio::test]
    async fn export_groups_records_by_kind() {
        let db = Database::in_memory().unwrap();
        let participant = Participant::register("Grace");
        let session = Session::begin(&participant.id);
        db.save_participant(&participant).unwrap();
        db.save_session(&session).unwrap();
        db.save_record(RecordKind::Config, "study", &serde_json::json!({"cohort": "A"}))
            .unwrap();

        let export = db.export_all().await.unwrap();
        assert_eq!(export.participants.len(), 1);
        assert_eq!(export.sessions.len(), 1);
        assert_eq!(export.sessions[0]["id"], session.id.as_str());
        assert_eq!(export.config.unwrap()["cohort"], "A");
    }

    #[tokio::test]
    async fn export_file_is_pretty_json() {
        let db = Database::in_memory().unwrap();
        db.save_participant(&Participant::register("Alan")).unwrap();
        let export = db.export_all().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("all.json");
        write_json_file(&path, &export).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["participants"][0]["name"], "Alan");
        assert!(written["exportedAt"].is_string());
    }
}
