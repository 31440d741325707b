use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

const CURRENT_PARTICIPANT: &str = "current_participant_id";
const CURRENT_SESSION: &str = "current_session_id";

impl Database {
    fn set_pointer(&self, name: &'static str, value: &str) -> Result<()> {
        let value = value.to_string();
        self.enqueue("set pointer", move |conn| {
            conn.execute(
                "INSERT INTO pointers (name, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE
                 SET value = excluded.value,
                     updated_at = excluded.updated_at",
                params![name, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to update pointer {name}"))?;
            Ok(())
        })
    }

    async fn get_pointer(&self, name: &'static str) -> Result<Option<String>> {
        self.execute(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM pointers WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    pub fn set_current_participant_id(&self, participant_id: &str) -> Result<()> {
        self.set_pointer(CURRENT_PARTICIPANT, participant_id)
    }

    pub async fn current_participant_id(&self) -> Result<Option<String>> {
        self.get_pointer(CURRENT_PARTICIPANT).await
    }

    pub fn set_current_session_id(&self, session_id: &str) -> Result<()> {
        self.set_pointer(CURRENT_SESSION, session_id)
    }

    pub async fn current_session_id(&self) -> Result<Option<String>> {
        self.get_pointer(CURRENT_SESSION).await
    }
}
