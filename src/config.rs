use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::Engine;
use crate::prompt::DEFAULT_SYSTEM_PROMPT;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE: &str = "gamedev-assistant.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Model name on the local server.
    pub model: String,
    /// Base URL of the local model server.
    pub api_url: String,
    /// Where project memory is stored.
    pub memory_path: PathBuf,
    /// Where chat history is stored.
    pub history_path: PathBuf,
    /// Where the action audit trail is stored.
    pub action_log_path: PathBuf,
    /// System prompt file; created with a default prompt when missing.
    pub system_prompt_path: PathBuf,
    /// Engine of the open project.
    pub current_engine: Engine,
    /// Folder of the open project, if any.
    pub project_path: Option<PathBuf>,
    /// Where overwritten script files are copied.
    pub backup_dir: PathBuf,
    /// Include the project memory summary in requests.
    pub memory_enabled: bool,
    /// Turns kept in the chat history file.
    pub max_chat_history: usize,
    /// Turns of history sent with each request.
    pub context_turns: usize,
    pub temperature: f32,
    /// Token limit for one reply.
    pub num_predict: u32,
    pub request_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".into(),
            api_url: "http://localhost:11434".into(),
            memory_path: PathBuf::from("data/project_memory.json"),
            history_path: PathBuf::from("data/chat_history.json"),
            action_log_path: PathBuf::from("logs/actions.json"),
            system_prompt_path: PathBuf::from("data/system_prompt.txt"),
            current_engine: Engine::Unity,
            project_path: None,
            backup_dir: PathBuf::from("backups"),
            memory_enabled: true,
            max_chat_history: 100,
            context_turns: 10,
            temperature: 0.7,
            num_predict: 2048,
            request_timeout_secs: 120,
        }
    }
}

impl AssistantConfig {
    /// Load config from `gamedev-assistant.toml` in the given directory, falling back to defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: AssistantConfig =
                toml::from_str(&contents).with_context(|| format!("parsing {CONFIG_FILE}"))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply CLI overrides on top of the loaded config.
    pub fn with_overrides(mut self, model: Option<String>, memory_path: Option<PathBuf>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(path) = memory_path {
            self.memory_path = path;
        }
        self
    }

    /// Read the system prompt, writing the default one first if the file is missing.
    pub fn system_prompt(&self) -> Result<String> {
        let path = &self.system_prompt_path;
        if path.exists() {
            return std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        std::fs::write(path, DEFAULT_SYSTEM_PROMPT)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssistantConfig::load(dir.path()).unwrap();
        assert_eq!(config.memory_path, PathBuf::from("data/project_memory.json"));
        assert_eq!(config.context_turns, 10);
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert!(config.memory_enabled);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "current_engine = \"godot\"\nmemory_enabled = false\nproject_path = \"/games/skyfall\"\n",
        )
        .unwrap();

        let config = AssistantConfig::load(dir.path())
            .unwrap()
            .with_overrides(Some("qwen2.5:7b".into()), None);
        assert_eq!(config.current_engine, Engine::Godot);
        assert!(!config.memory_enabled);
        assert_eq!(config.project_path, Some(PathBuf::from("/games/skyfall")));
        assert_eq!(config.model, "qwen2.5:7b");
        assert_eq!(config.max_chat_history, 100);
    }

    #[test]
    fn system_prompt_is_seeded_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssistantConfig {
            system_prompt_path: dir.path().join("data/system_prompt.txt"),
            ..AssistantConfig::default()
        };
        assert_eq!(config.system_prompt().unwrap(), DEFAULT_SYSTEM_PROMPT);

        std::fs::write(&config.system_prompt_path, "custom").unwrap();
        assert_eq!(config.system_prompt().unwrap(), "custom");
    }
}
