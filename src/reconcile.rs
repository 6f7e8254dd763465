//! Brings a decoded memory document up to the current schema.
//!
//! Top-level fields and `project_info` sub-fields that are present are kept
//! as they are; absent ones (or `null`) take the value from a fresh empty
//! document. A field of the wrong shape also takes its default, with a
//! warning. Records inside `scripts` and `todos` fill their own missing
//! fields with empty values. Keys the schema does not know survive untouched.
//! Only a root that is not a JSON object is rejected.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::memory::{ProjectInfo, ProjectMemory};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("document root is {found}, expected an object")]
    NotAnObject { found: &'static str },
}

/// Reconcile `raw` against the current schema.
pub fn reconcile(raw: Value) -> Result<ProjectMemory, ReconcileError> {
    let mut root = match raw {
        Value::Object(map) => map,
        other => return Err(ReconcileError::NotAnObject { found: kind(&other) }),
    };
    let defaults = ProjectMemory::empty();

    let project_info = match root.remove("project_info") {
        Some(Value::Object(map)) => reconcile_project_info(map, defaults.project_info),
        Some(Value::Null) | None => defaults.project_info,
        Some(other) => {
            warn!(field = "project_info", found = kind(&other), "expected an object, using defaults");
            defaults.project_info
        }
    };

    Ok(ProjectMemory {
        project_info,
        scripts: take_records(&mut root, "scripts"),
        assets: take_field(&mut root, "", "assets", defaults.assets),
        todos: take_records(&mut root, "todos"),
        completed_tasks: take_field(&mut root, "", "completed_tasks", defaults.completed_tasks),
        user_preferences: take_field(&mut root, "", "user_preferences", defaults.user_preferences),
        last_updated: take_field(&mut root, "", "last_updated", defaults.last_updated),
        extra: root,
    })
}

fn reconcile_project_info(mut map: Map<String, Value>, defaults: ProjectInfo) -> ProjectInfo {
    let scope = "project_info";
    ProjectInfo {
        name: take_field(&mut map, scope, "name", defaults.name),
        genre: take_field(&mut map, scope, "genre", defaults.genre),
        description: take_field(&mut map, scope, "description", defaults.description),
        engine: take_field(&mut map, scope, "engine", defaults.engine),
        created: take_field(&mut map, scope, "created", defaults.created),
        extra: map,
    }
}

/// Remove `key` from `map` and decode it, or fall back to `default`.
fn take_field<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    scope: &str,
    key: &str,
    default: T,
) -> T {
    match map.remove(key) {
        Some(Value::Null) | None => default,
        Some(value) => serde_json::from_value(value).unwrap_or_else(|error| {
            let field = if scope.is_empty() {
                key.to_string()
            } else {
                format!("{scope}.{key}")
            };
            warn!(%field, %error, "unexpected shape, using default");
            default
        }),
    }
}

/// Decode a record sequence one element at a time.
///
/// Elements that still fail to decode (a known field of the wrong type) are
/// dropped with a warning; the rest keep their order.
fn take_records<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Vec<T> {
    match map.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(error) => {
                    warn!(field = key, index, %error, "skipping undecodable record");
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(field = key, found = kind(&other), "expected an array, using empty");
            Vec::new()
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DEFAULT_PRIORITY;
    use serde_json::json;

    fn sample() -> ProjectMemory {
        let mut memory = ProjectMemory::empty_at("2025-01-02T03:04:05.000000Z");
        memory.project_info.name = "Skyfall".into();
        memory.project_info.engine = "unity".into();
        memory.todos.push(crate::memory::TodoRecord {
            task: "add enemies".into(),
            priority: "high".into(),
            added: "2025-01-03T00:00:00Z".into(),
            completed: false,
            extra: Map::new(),
        });
        memory.assets.push(json!({"path": "Assets/hero.png"}));
        memory
            .extra
            .insert("schema_note".into(), json!({"from": "newer build"}));
        memory
    }

    #[test]
    fn complete_document_is_unchanged() {
        let memory = sample();
        let raw = serde_json::to_value(&memory).unwrap();
        assert_eq!(reconcile(raw).unwrap(), memory);
    }

    #[test]
    fn reconciling_twice_is_stable() {
        let once = reconcile(json!({"scripts": []})).unwrap();
        let twice = reconcile(serde_json::to_value(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_todos_default_to_empty() {
        let memory = sample();
        let mut raw = serde_json::to_value(&memory).unwrap();
        raw.as_object_mut().unwrap().remove("todos");

        let reconciled = reconcile(raw).unwrap();
        assert!(reconciled.todos.is_empty());
        assert_eq!(reconciled.project_info, memory.project_info);
        assert_eq!(reconciled.assets, memory.assets);
        assert_eq!(reconciled.last_updated, memory.last_updated);
        assert_eq!(reconciled.extra, memory.extra);
    }

    #[test]
    fn project_info_is_merged_one_level_deep() {
        let raw = json!({
            "project_info": {"name": "Skyfall", "created": "2024-06-01T10:00:00", "studio": "Nimbus"},
        });
        let reconciled = reconcile(raw).unwrap();
        let info = reconciled.project_info;
        assert_eq!(info.name, "Skyfall");
        assert_eq!(info.created, "2024-06-01T10:00:00");
        assert_eq!(info.engine, "");
        assert_eq!(info.extra.get("studio"), Some(&json!("Nimbus")));
        assert_eq!(reconciled.user_preferences.naming_convention, "PascalCase");
    }

    #[test]
    fn partial_records_keep_what_they_have() {
        let raw = json!({
            "project_info": {"name": "Skyfall"},
            "scripts": [
                {"name": "Player.cs", "purpose": "moves player", "features": ["jump"],
                 "created": "2025-01-01T00:00:00", "last_modified": "2025-01-01T00:00:00"},
                {"name": "Enemy.cs", "purpose": "chases player", "layer": "ai"},
            ],
            "todos": [{"task": "add enemies"}],
        });
        let reconciled = reconcile(raw).unwrap();

        assert_eq!(reconciled.project_info.name, "Skyfall");
        let names: Vec<_> = reconciled.scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Player.cs", "Enemy.cs"]);
        assert_eq!(reconciled.scripts[0].features, vec!["jump"]);
        let enemy = &reconciled.scripts[1];
        assert!(enemy.features.is_empty());
        assert_eq!(enemy.last_modified, "");
        assert_eq!(enemy.extra.get("layer"), Some(&json!("ai")));

        let todo = &reconciled.todos[0];
        assert_eq!(todo.task, "add enemies");
        assert_eq!(todo.priority, DEFAULT_PRIORITY);
        assert!(!todo.completed);
    }

    #[test]
    fn wrong_shapes_fall_back_instead_of_failing() {
        assert!(matches!(
            reconcile(json!([1, 2, 3])),
            Err(ReconcileError::NotAnObject { found: "an array" })
        ));

        let reconciled = reconcile(json!({
            "project_info": {"name": 7, "genre": "rpg"},
            "scripts": [{"name": "Hud.cs"}, {"name": ["bad"]}],
            "todos": "add enemies",
            "last_updated": false,
        }))
        .unwrap();
        assert_eq!(reconciled.project_info.name, "");
        assert_eq!(reconciled.project_info.genre, "rpg");
        assert_eq!(reconciled.scripts.len(), 1);
        assert_eq!(reconciled.scripts[0].name, "Hud.cs");
        assert!(reconciled.todos.is_empty());
        assert!(!reconciled.last_updated.is_empty());
    }
}
