//! Project memory persisted as a single JSON document.
//!
//! The store owns the on-disk file: every mutation rewrites the whole
//! document, and a failed write is logged without disturbing the in-memory
//! state, which stays authoritative until the next successful save.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::reconcile::reconcile;

/// Priority used when a todo is added without one.
pub const DEFAULT_PRIORITY: &str = "medium";

/// Identity and profile of the tracked project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub name: String,
    pub genre: String,
    pub description: String,
    pub engine: String,
    /// Set when the document is first created and never touched afterwards.
    pub created: String,
    /// Keys written by other versions of the assistant.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Missing fields decode as empty so one partial record does not sink a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptRecord {
    pub name: String,
    pub purpose: String,
    pub features: Vec<String>,
    pub created: String,
    pub last_modified: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoRecord {
    pub task: String,
    /// Free text; `low`, `medium` and `high` by convention only.
    pub priority: String,
    pub added: String,
    pub completed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TodoRecord {
    fn default() -> Self {
        Self {
            task: String::new(),
            priority: DEFAULT_PRIORITY.into(),
            added: String::new(),
            completed: false,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub coding_style: String,
    pub naming_convention: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            coding_style: "standard".into(),
            naming_convention: "PascalCase".into(),
            extra: Map::new(),
        }
    }
}

/// The root persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMemory {
    pub project_info: ProjectInfo,
    /// Insertion order is creation order.
    pub scripts: Vec<ScriptRecord>,
    pub assets: Vec<Value>,
    pub todos: Vec<TodoRecord>,
    pub completed_tasks: Vec<Value>,
    pub user_preferences: UserPreferences,
    pub last_updated: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectMemory {
    /// A fresh document stamped with the current time.
    pub fn empty() -> Self {
        Self::empty_at(&now_timestamp())
    }

    pub fn empty_at(timestamp: &str) -> Self {
        Self {
            project_info: ProjectInfo {
                name: String::new(),
                genre: String::new(),
                description: String::new(),
                engine: String::new(),
                created: timestamp.to_string(),
                extra: Map::new(),
            },
            scripts: Vec::new(),
            assets: Vec::new(),
            todos: Vec::new(),
            completed_tasks: Vec::new(),
            user_preferences: UserPreferences::default(),
            last_updated: timestamp.to_string(),
            extra: Map::new(),
        }
    }
}

/// Aggregate counts shown by `stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_scripts: usize,
    pub total_assets: usize,
    /// Every todo counts; nothing marks one completed.
    pub pending_todos: usize,
    pub completed_tasks: usize,
    pub days_active: i64,
    pub last_updated: String,
}

/// How the document came into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No file existed yet.
    Created,
    /// The file decoded and reconciled cleanly.
    Loaded,
    /// The file was unreadable or corrupt and was replaced by an empty document.
    Recovered,
}

/// Whether an upsert added a record or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptChange {
    Created,
    Updated,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing project memory: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Read and reconcile the document at `path`.
///
/// Never fails: a missing file yields a fresh document, and anything that
/// cannot be read or decoded is discarded in favour of one.
pub fn load_document(path: &Path) -> (ProjectMemory, LoadStatus) {
    if !path.exists() {
        return (ProjectMemory::empty(), LoadStatus::Created);
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            warn!(path = %path.display(), %error, "unreadable project memory, starting fresh");
            return (ProjectMemory::empty(), LoadStatus::Recovered);
        }
    };

    let decoded = serde_json::from_str::<Value>(&contents)
        .map_err(|e| e.to_string())
        .and_then(|raw| reconcile(raw).map_err(|e| e.to_string()));

    match decoded {
        Ok(memory) => (memory, LoadStatus::Loaded),
        Err(error) => {
            warn!(path = %path.display(), %error, "corrupt project memory, starting fresh");
            (ProjectMemory::empty(), LoadStatus::Recovered)
        }
    }
}

/// Handle for loading/saving project memory to disk.
pub struct MemoryStore {
    path: PathBuf,
    memory: ProjectMemory,
    status: LoadStatus,
}

impl MemoryStore {
    /// Load memory from the given path, or start empty if there is nothing usable.
    pub fn load(path: &Path) -> Self {
        let (memory, status) = load_document(path);
        debug!(path = %path.display(), ?status, "project memory loaded");
        Self {
            path: path.to_path_buf(),
            memory,
            status,
        }
    }

    pub fn load_status(&self) -> LoadStatus {
        self.status
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &ProjectMemory {
        &self.memory
    }

    /// Write the whole document to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.memory)?;
        std::fs::write(&self.path, json).map_err(io_err)?;
        Ok(())
    }

    /// Stamp `last_updated` and save, logging instead of failing.
    fn persist(&mut self) {
        self.memory.last_updated = now_timestamp();
        if let Err(error) = self.save() {
            warn!(%error, "failed to persist project memory; keeping in-memory state");
        }
    }

    /// Overwrite identity fields that are given and non-empty.
    pub fn set_project_info(
        &mut self,
        name: Option<&str>,
        genre: Option<&str>,
        engine: Option<&str>,
    ) {
        let info = &mut self.memory.project_info;
        if let Some(name) = name.filter(|s| !s.is_empty()) {
            info.name = name.to_string();
        }
        if let Some(genre) = genre.filter(|s| !s.is_empty()) {
            info.genre = genre.to_string();
        }
        if let Some(engine) = engine.filter(|s| !s.is_empty()) {
            info.engine = engine.to_string();
        }
        self.persist();
    }

    pub fn project_info(&self) -> &ProjectInfo {
        &self.memory.project_info
    }

    /// Add a script, or update the one with the same name.
    ///
    /// An empty `features` list leaves existing features in place.
    pub fn upsert_script(
        &mut self,
        name: &str,
        purpose: &str,
        features: Vec<String>,
    ) -> ScriptChange {
        let now = now_timestamp();
        let change = match self.memory.scripts.iter_mut().find(|s| s.name == name) {
            Some(existing) => {
                existing.purpose = purpose.to_string();
                if !features.is_empty() {
                    existing.features = features;
                }
                existing.last_modified = now;
                ScriptChange::Updated
            }
            None => {
                self.memory.scripts.push(ScriptRecord {
                    name: name.to_string(),
                    purpose: purpose.to_string(),
                    features,
                    created: now.clone(),
                    last_modified: now,
                    extra: Map::new(),
                });
                ScriptChange::Created
            }
        };
        self.persist();
        change
    }

    pub fn get_script(&self, name: &str) -> Option<&ScriptRecord> {
        self.memory.scripts.iter().find(|s| s.name == name)
    }

    pub fn list_scripts(&self) -> &[ScriptRecord] {
        &self.memory.scripts
    }

    /// Append a todo. Duplicates are allowed and priority is not validated.
    pub fn add_todo(&mut self, task: &str, priority: Option<&str>) {
        self.memory.todos.push(TodoRecord {
            task: task.to_string(),
            priority: priority.unwrap_or(DEFAULT_PRIORITY).to_string(),
            added: now_timestamp(),
            completed: false,
            extra: Map::new(),
        });
        self.persist();
    }

    pub fn list_todos(&self) -> &[TodoRecord] {
        &self.memory.todos
    }

    /// Case-insensitive substring search over script names and purposes.
    pub fn search_scripts(&self, query: &str) -> Vec<&ScriptRecord> {
        let query = query.to_lowercase();
        self.memory
            .scripts
            .iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&query) || s.purpose.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> MemoryStats {
        MemoryStats {
            total_scripts: self.memory.scripts.len(),
            total_assets: self.memory.assets.len(),
            pending_todos: self.memory.todos.len(),
            completed_tasks: self.memory.completed_tasks.len(),
            days_active: days_between(&self.memory.project_info.created, now),
            last_updated: self.memory.last_updated.clone(),
        }
    }

    /// Replace everything with a fresh document and persist it.
    pub fn clear_memory(&mut self) {
        self.memory = ProjectMemory::empty();
        self.persist();
    }
}

/// Current time in the format stored in documents.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and offset-less ISO 8601, the latter read as local time.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole days from `created` to `now`; 0 when unparsable or in the future.
fn days_between(created: &str, now: DateTime<Utc>) -> i64 {
    parse_timestamp(created)
        .map(|created| (now - created).num_days().max(0))
        .unwrap_or(0)
}
