//! Whole-collection export and import.
//!
//! Exports are a unified JSON snapshot carrying both entity arrays under one
//! version tag. Import accepts that unified format or a single-entity legacy
//! snapshot (the per-collection files written by earlier versions), detected
//! by shape: a payload must carry a `tasks` array, a `stories` array, or
//! both. Anything else is a malformed snapshot.
//!
//! Parsing is completed before any state is touched; the `App` façade then
//! swaps both collections in one pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::story::Story;
use crate::task::Task;

/// Schema version tag written into unified exports
pub const EXPORT_SCHEMA_VERSION: &str = "planbook.export.v1";

/// Unified snapshot of both collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub schema_version: String,
    pub exported_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub stories: Vec<Story>,
}

impl ExportSnapshot {
    pub fn new(tasks: Vec<Task>, stories: Vec<Story>) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            tasks,
            stories,
        }
    }
}

/// What an import payload turned out to contain
#[derive(Debug, Clone)]
pub enum ImportPayload {
    /// Unified snapshot with both collections
    Unified {
        tasks: Vec<Task>,
        stories: Vec<Story>,
    },
    /// Legacy tasks-only snapshot; stories are left untouched
    TasksOnly(Vec<Task>),
    /// Legacy stories-only snapshot; tasks are left untouched
    StoriesOnly(Vec<Story>),
}

#[derive(Deserialize)]
struct LegacyTasks {
    tasks: Vec<Task>,
}

#[derive(Deserialize)]
struct LegacyStories {
    stories: Vec<Story>,
}

#[derive(Deserialize)]
struct UnifiedSnapshot {
    tasks: Vec<Task>,
    stories: Vec<Story>,
}

/// Format-detect and fully parse an import payload.
///
/// Detection looks at which entity arrays are present; entity shapes are
/// validated by deserialization before anything is applied.
pub fn parse_snapshot(json: &str) -> Result<ImportPayload> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| Error::MalformedSnapshot(format!("not valid JSON: {err}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::MalformedSnapshot("expected a JSON object".to_string()))?;

    let has_tasks = object.get("tasks").map(|v| v.is_array()).unwrap_or(false);
    let has_stories = object
        .get("stories")
        .map(|v| v.is_array())
        .unwrap_or(false);

    match (has_tasks, has_stories) {
        (true, true) => {
            let snapshot: UnifiedSnapshot = serde_json::from_value(value)
                .map_err(|err| Error::MalformedSnapshot(err.to_string()))?;
            Ok(ImportPayload::Unified {
                tasks: snapshot.tasks,
                stories: snapshot.stories,
            })
        }
        (true, false) => {
            let snapshot: LegacyTasks = serde_json::from_value(value)
                .map_err(|err| Error::MalformedSnapshot(err.to_string()))?;
            Ok(ImportPayload::TasksOnly(snapshot.tasks))
        }
        (false, true) => {
            let snapshot: LegacyStories = serde_json::from_value(value)
                .map_err(|err| Error::MalformedSnapshot(err.to_string()))?;
            Ok(ImportPayload::StoriesOnly(snapshot.stories))
        }
        (false, false) => Err(Error::MalformedSnapshot(
            "expected a tasks or stories array".to_string(),
        )),
    }
}
