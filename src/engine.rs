//! Supported game engines: identifiers, project-folder checks, and picking
//! script names out of model replies.

use anyhow::{Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Unity,
    Godot,
    Unreal,
}

impl Engine {
    /// Identifier stored in project memory.
    pub fn id(self) -> &'static str {
        match self {
            Engine::Unity => "unity",
            Engine::Godot => "godot",
            Engine::Unreal => "unreal",
        }
    }

    /// File extension of the engine's scripts, without the dot.
    pub fn script_extension(self) -> &'static str {
        match self {
            Engine::Unity => "cs",
            Engine::Godot => "gd",
            Engine::Unreal => "cpp",
        }
    }

    /// Check that `dir` looks like a project for this engine.
    ///
    /// Looks for a single layout marker only: `Assets/` for Unity,
    /// `project.godot` for Godot, a `*.uproject` file for Unreal.
    pub fn validate_project(self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            bail!("{} is not a directory", dir.display());
        }
        let found = match self {
            Engine::Unity => dir.join("Assets").is_dir(),
            Engine::Godot => dir.join("project.godot").is_file(),
            Engine::Unreal => std::fs::read_dir(dir)?.filter_map(|e| e.ok()).any(|e| {
                let path = e.path();
                path.is_file() && path.extension().is_some_and(|ext| ext == "uproject")
            }),
        };
        if !found {
            bail!("{} does not look like a {} project", dir.display(), self);
        }
        Ok(())
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Engine::Unity => "Unity",
            Engine::Godot => "Godot",
            Engine::Unreal => "Unreal",
        })
    }
}

impl FromStr for Engine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unity" => Ok(Engine::Unity),
            "godot" => Ok(Engine::Godot),
            "unreal" => Ok(Engine::Unreal),
            other => bail!("unknown engine '{other}': expected unity, godot or unreal"),
        }
    }
}

static CLASS_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)").expect("valid regex"));

/// Guess the script a reply produced for a request.
///
/// The request must mention a script and the reply must both mention an
/// engine source file and declare a class; the class name plus the first
/// extension found (`.cs`, `.gd`, `.cpp` in that order) is the result.
pub fn detect_script(user_message: &str, reply: &str) -> Option<String> {
    if !user_message.to_lowercase().contains("script") {
        return None;
    }
    let extension = [Engine::Unity, Engine::Godot, Engine::Unreal]
        .into_iter()
        .map(Engine::script_extension)
        .find(|ext| reply.contains(&format!(".{ext}")))?;
    let class = CLASS_DECL.captures(reply)?.get(1)?.as_str();
    Some(format!("{class}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Godot".parse::<Engine>().unwrap(), Engine::Godot);
        assert_eq!(" UNREAL ".parse::<Engine>().unwrap(), Engine::Unreal);
        assert!("bevy".parse::<Engine>().is_err());
        assert_eq!(Engine::Unity.to_string(), "Unity");
        assert_eq!(Engine::Unity.id(), "unity");
    }

    #[test]
    fn validates_layout_markers() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Engine::Unity.validate_project(dir.path()).is_err());
        assert!(Engine::Unreal.validate_project(dir.path()).is_err());

        std::fs::create_dir(dir.path().join("Assets")).unwrap();
        std::fs::write(dir.path().join("project.godot"), "").unwrap();
        std::fs::write(dir.path().join("Skyfall.uproject"), "{}").unwrap();
        assert!(Engine::Unity.validate_project(dir.path()).is_ok());
        assert!(Engine::Godot.validate_project(dir.path()).is_ok());
        assert!(Engine::Unreal.validate_project(dir.path()).is_ok());
    }

    #[test]
    fn detects_script_from_reply() {
        let reply = "Save this as PlayerController.cs:\n\npublic class PlayerController : MonoBehaviour {}";
        assert_eq!(
            detect_script("Write a movement SCRIPT", reply).as_deref(),
            Some("PlayerController.cs")
        );
        assert_eq!(
            detect_script("write a script", "extends Node\nclass Enemy:\n# enemy.gd").as_deref(),
            Some("Enemy.gd")
        );
    }

    #[test]
    fn ignores_replies_without_all_signals() {
        assert_eq!(detect_script("hello", "class Foo in Foo.cs"), None);
        assert_eq!(detect_script("a script please", "class Foo"), None);
        assert_eq!(detect_script("a script please", "see Foo.cs"), None);
    }
}
