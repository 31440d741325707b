use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    db::{
        helpers::{parse_record, RecordKind},
        Database,
    },
    models::{Participant, Session},
};

impl Database {
    /// Upserts a JSON record. The write is queued, not awaited.
    pub fn save_record<T: Serialize>(&self, kind: RecordKind, id: &str, record: &T) -> Result<()> {
        let data = serde_json::to_string(record)
            .with_context(|| format!("failed to serialize {} record {id}", kind.as_str()))?;
        let id = id.to_string();
        self.enqueue("save record", move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO records (kind, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(kind, id) DO UPDATE
                 SET data = excluded.data,
                     updated_at = excluded.updated_at",
                params![kind.as_str(), id, data, now],
            )
            .with_context(|| format!("failed to save {} record {id}", kind.as_str()))?;
            Ok(())
        })
    }

    pub async fn load_record<T>(&self, kind: RecordKind, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let id = id.to_string();
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT data FROM records WHERE kind = ?1 AND id = ?2",
                    params![kind.as_str(), id],
                    |row| row.get(0),
                )
                .optional()?;

            match raw {
                Some(raw) => {
                    let value = parse_record(&raw, kind, &id)?;
                    let record = serde_json::from_value(value).with_context(|| {
                        format!("stored {} record {id} has an unexpected shape", kind.as_str())
                    })?;
                    Ok(Some(record))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// Drops every stored record and the current-id pointers. Queued behind
    /// any pending writes.
    pub fn clear_all(&self) -> Result<()> {
        self.enqueue("clear all records", |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM records", [])
                .context("failed to clear records")?;
            tx.execute("DELETE FROM pointers", [])
                .context("failed to clear pointers")?;
            tx.commit().context("failed to commit clear")?;
            Ok(())
        })
    }

    pub fn save_participant(&self, participant: &Participant) -> Result<()> {
        self.save_record(RecordKind::Participant, &participant.id, participant)
    }

    pub async fn load_participant(&self, participant_id: &str) -> Result<Option<Participant>> {
        self.load_record(RecordKind::Participant, participant_id).await
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        self.save_record(RecordKind::Session, &session.id, session)
    }

    pub async fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.load_record(RecordKind::Session, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn session_round_trips_through_store() {
        let db = Database::in_memory().unwrap();
        let mut session = Session::begin("p1");
        db.save_session(&session).unwrap();

        session.status = crate::models::SessionStatus::Completed;
        db.save_session(&session).unwrap();

        let loaded = db.load_session(&session.id).await.unwrap();
        assert_eq!(loaded, Some(session));
    }

    #[tokio::test]
    async fn missing_record_loads_as_none() {
        let db = Database::in_memory().unwrap();
        let loaded = db.load_participant("nobody").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.sqlite3");
        let participant = Participant::register("Ada");

        {
            let db = Database::new(path.clone()).unwrap();
            db.save_participant(&participant).unwrap();
            // Flush the queued write before the handle is dropped.
            db.load_participant(&participant.id).await.unwrap();
        }

        let reopened = Database::new(path).unwrap();
        let loaded = reopened.load_participant(&participant.id).await.unwrap();
        assert_eq!(loaded, Some(participant));
    }

    #[tokio::test]
    async fn clear_all_drops_records_and_pointers() {
        let db = Database::in_memory().unwrap();
        let participant = Participant::register("Ada");
        let session = Session::begin(&participant.id);
        db.save_participant(&participant).unwrap();
        db.save_session(&session).unwrap();
        db.set_current_participant_id(&participant.id).unwrap();
        db.set_current_session_id(&session.id).unwrap();

        db.clear_all().unwrap();

        assert!(db.load_participant(&participant.id).await.unwrap().is_none());
        assert!(db.load_session(&session.id).await.unwrap().is_none());
        assert_eq!(db.current_participant_id().await.unwrap(), None);
        assert_eq!(db.current_session_id().await.unwrap(), None);
    }
}
