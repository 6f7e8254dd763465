//! Chat history kept between runs as a single JSON array.
//!
//! The file holds at most the configured number of turns; the oldest are
//! dropped as new ones arrive. The request decides how many of them to send.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role label used in the flattened prompt.
    pub fn role(self) -> &'static str {
        match self {
            Sender::User => "USER",
            Sender::Assistant => "ASSISTANT",
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(sender: Sender, text: &str) -> Self {
        Self {
            sender,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Handle for loading/saving chat history.
pub struct ChatHistory {
    path: PathBuf,
    max_turns: usize,
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    /// Load history from `path`. A missing or corrupt file gives an empty history.
    pub fn load(path: &Path, max_turns: usize) -> Self {
        let turns = if path.exists() {
            std::fs::read_to_string(path)
                .map_err(anyhow::Error::from)
                .and_then(|contents| Ok(serde_json::from_str::<Vec<ChatTurn>>(&contents)?))
                .unwrap_or_else(|error| {
                    warn!(path = %path.display(), %error, "ignoring unreadable chat history");
                    Vec::new()
                })
        } else {
            Vec::new()
        };
        Self {
            path: path.to_path_buf(),
            max_turns,
            turns,
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn push(&mut self, sender: Sender, text: &str) {
        self.turns.push(ChatTurn::new(sender, text));
        let excess = self.turns.len().saturating_sub(self.max_turns);
        if excess > 0 {
            self.turns.drain(..excess);
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.turns)
            .with_context(|| "serializing chat history")?;
        std::fs::write(&self.path, json).with_context(|| "writing chat history")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_drops_oldest_beyond_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = ChatHistory::load(&dir.path().join("chat.json"), 3);
        for i in 0..5 {
            history.push(Sender::User, &format!("m{i}"));
        }
        let texts: Vec<_> = history.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["m2", "m3", "m4"]);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/chat.json");
        let mut history = ChatHistory::load(&path, 100);
        history.push(Sender::User, "make a jump script");
        history.push(Sender::Assistant, "here you go");
        history.save().unwrap();

        let reloaded = ChatHistory::load(&path, 100);
        assert_eq!(reloaded.turns().len(), 2);
        assert_eq!(reloaded.turns()[1].sender, Sender::Assistant);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(ChatHistory::load(&path, 100).turns().is_empty());
    }
}
