use anyhow::{anyhow, Context, Result};

/// Record families kept in the `records` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Participant,
    Session,
    Config,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Participant => "participant",
            RecordKind::Session => "session",
            RecordKind::Config => "config",
        }
    }
}

pub fn parse_kind(value: &str) -> Result<RecordKind> {
    match value {
        "participant" => Ok(RecordKind::Participant),
        "session" => Ok(RecordKind::Session),
        "config" => Ok(RecordKind::Config),
        other => Err(anyhow!("unknown record kind {other}")),
    }
}

pub fn parse_record(raw: &str, kind: RecordKind, id: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw)
        .with_context(|| format!("stored {} record {id} is not valid JSON", kind.as_str()))
}
