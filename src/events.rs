use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structured event emitted during a conversion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ConversionStarted {
        run_id: uuid::Uuid,
        ts: DateTime<Utc>,
        source: PathBuf,
        target: PathBuf,
        database: String,
    },
    ChangelogParsed {
        run_id: uuid::Uuid,
        change_sets: usize,
    },
    ChangeSetsFiltered {
        run_id: uuid::Uuid,
        kept: usize,
        dropped: usize,
    },
    OutputWritten {
        run_id: uuid::Uuid,
        target: PathBuf,
        change_sets: usize,
        bytes: u64,
    },
    ConversionFailed {
        run_id: uuid::Uuid,
        message: String,
        error: String,
    },
    TargetRemoved {
        run_id: uuid::Uuid,
        target: PathBuf,
    },
}

/// JSON Schema of the `--json` event stream.
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(Event);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
