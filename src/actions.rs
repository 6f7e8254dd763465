//! Audit trail of what the assistant did, kept as a capped JSON array.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Entries beyond this many are dropped, oldest first.
pub const MAX_ACTIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ScriptCreated,
    ScriptModified,
    AiRequest,
    AiError,
    ProjectOpened,
    MemoryCleared,
    TodoAdded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failure,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub status: ActionStatus,
    pub details: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionStats {
    pub total_actions: usize,
    pub scripts_created: usize,
    pub scripts_modified: usize,
    pub ai_requests: usize,
    pub errors: usize,
    pub warnings: usize,
}

pub struct ActionLog {
    path: PathBuf,
}

impl ActionLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Append an entry. Failures are logged, never returned.
    pub fn log_action(&self, kind: ActionKind, details: Value, status: ActionStatus) {
        let mut entries = self.load();
        entries.push(ActionEntry {
            timestamp: Utc::now(),
            kind,
            status,
            details,
        });
        let start = entries.len().saturating_sub(MAX_ACTIONS);
        if let Err(error) = self.write(&entries[start..]) {
            warn!(path = %self.path.display(), %error, "failed to save action log");
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<ActionEntry> {
        let mut entries = self.load();
        let start = entries.len().saturating_sub(limit);
        entries.split_off(start)
    }

    pub fn stats(&self) -> ActionStats {
        let entries = self.load();
        let mut stats = ActionStats {
            total_actions: entries.len(),
            ..ActionStats::default()
        };
        for entry in &entries {
            match entry.kind {
                ActionKind::ScriptCreated => stats.scripts_created += 1,
                ActionKind::ScriptModified => stats.scripts_modified += 1,
                ActionKind::AiRequest => stats.ai_requests += 1,
                _ => {}
            }
            match entry.status {
                ActionStatus::Failure => stats.errors += 1,
                ActionStatus::Warning => stats.warnings += 1,
                ActionStatus::Success => {}
            }
        }
        stats
    }

    /// All entries on disk; an unreadable file reads as empty.
    fn load(&self) -> Vec<ActionEntry> {
        if !self.path.exists() {
            return Vec::new();
        }
        std::fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|contents| Ok(serde_json::from_str::<Vec<ActionEntry>>(&contents)?))
            .unwrap_or_else(|error| {
                warn!(path = %self.path.display(), %error, "ignoring unreadable action log");
                Vec::new()
            })
    }

    fn write(&self, entries: &[ActionEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(entries).with_context(|| "serializing action log")?;
        std::fs::write(&self.path, json).with_context(|| "writing action log")?;
        Ok(())
    }
}
