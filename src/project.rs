//! Reading and writing script files inside an engine project folder.
//!
//! Scripts live in the engine's conventional folder: `Assets/Scripts` for
//! Unity, `scripts/` for Godot, `Source/<Project>` for Unreal. Overwriting an
//! existing script first copies it into the backup directory.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use std::path::{Component, Path, PathBuf};

use crate::engine::Engine;

/// An opened, validated engine project.
#[derive(Debug, Clone)]
pub struct ProjectFolder {
    engine: Engine,
    scripts_dir: PathBuf,
}

/// Outcome of [`ProjectFolder::write_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptWrite {
    pub path: PathBuf,
    pub size_bytes: usize,
    /// Copy of the previous contents, when the script already existed.
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BackupFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

impl ProjectFolder {
    pub fn open(engine: Engine, root: &Path) -> Result<Self> {
        engine.validate_project(root)?;
        let scripts_dir = match engine {
            Engine::Unity => root.join("Assets").join("Scripts"),
            Engine::Godot => root.join("scripts"),
            Engine::Unreal => root.join("Source").join(unreal_project_name(root)?),
        };
        Ok(Self {
            engine,
            scripts_dir,
        })
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Path of `name` under the scripts folder.
    ///
    /// The engine's extension is appended when `name` lacks it; Unreal also
    /// accepts headers. Subfolders are allowed, leaving the folder is not.
    pub fn script_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name.trim());
        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("invalid script name '{name}'");
        }
        let has_extension = relative
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ext == self.engine.script_extension() || (self.engine == Engine::Unreal && ext == "h")
            });
        let file = if has_extension {
            relative.to_path_buf()
        } else {
            PathBuf::from(format!("{}.{}", relative.display(), self.engine.script_extension()))
        };
        Ok(self.scripts_dir.join(file))
    }

    /// Write a script, backing up any existing file into `backup_dir` first.
    pub fn write_script(&self, name: &str, content: &str, backup_dir: &Path) -> Result<ScriptWrite> {
        let path = self.script_path(name)?;
        let backup = if path.is_file() {
            Some(back_up(&path, backup_dir)?)
        } else {
            None
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(ScriptWrite {
            path,
            size_bytes: content.len(),
            backup,
        })
    }

    pub fn read_script(&self, name: &str) -> Result<String> {
        let path = self.script_path(name)?;
        if !path.is_file() {
            bail!("script not found: {}", path.display());
        }
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }
}

/// Backups in `backup_dir`, newest first, optionally only those of one script.
pub fn list_backups(backup_dir: &Path, script: Option<&str>) -> Result<Vec<BackupFile>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let prefix = script.map(|name| format!("{}_", file_stem(Path::new(name))));
    let entries = std::fs::read_dir(backup_dir)
        .with_context(|| format!("reading backup directory {}", backup_dir.display()))?;

    let mut backups = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".bak")
            || prefix.as_deref().is_some_and(|p| !file_name.starts_with(p))
        {
            continue;
        }
        let meta = std::fs::metadata(&path)
            .with_context(|| format!("reading metadata of {}", path.display()))?;
        backups.push(BackupFile {
            size_bytes: meta.len(),
            modified: meta.modified()?.into(),
            path,
        });
    }
    backups.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
    Ok(backups)
}

/// Copy `source` to `<backup_dir>/<stem>_<timestamp>.<ext>.bak`.
fn back_up(source: &Path, backup_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(backup_dir)
        .with_context(|| format!("creating directory {}", backup_dir.display()))?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let target = backup_dir.join(format!("{}_{stamp}{extension}.bak", file_stem(source)));
    std::fs::copy(source, &target)
        .with_context(|| format!("backing up {} to {}", source.display(), target.display()))?;
    Ok(target)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Stem of the first `*.uproject` file in `root`.
fn unreal_project_name(root: &Path) -> Result<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .with_context(|| format!("reading {}", root.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "uproject"))
        .map(|p| file_stem(&p))
        .collect();
    names.sort();
    match names.into_iter().next() {
        Some(name) => Ok(name),
        None => bail!("no .uproject file in {}", root.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unity_project() -> (tempfile::TempDir, ProjectFolder) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Assets")).unwrap();
        let project = ProjectFolder::open(Engine::Unity, dir.path()).unwrap();
        (dir, project)
    }

    #[test]
    fn scripts_go_in_the_engine_folder() {
        let (dir, unity) = unity_project();
        assert_eq!(
            unity.script_path("Player").unwrap(),
            dir.path().join("Assets/Scripts/Player.cs")
        );
        assert_eq!(
            unity.script_path("AI/Enemy.cs").unwrap(),
            dir.path().join("Assets/Scripts/AI/Enemy.cs")
        );

        std::fs::write(dir.path().join("project.godot"), "").unwrap();
        let godot = ProjectFolder::open(Engine::Godot, dir.path()).unwrap();
        assert_eq!(godot.script_path("enemy").unwrap(), dir.path().join("scripts/enemy.gd"));

        std::fs::write(dir.path().join("Skyfall.uproject"), "{}").unwrap();
        let unreal = ProjectFolder::open(Engine::Unreal, dir.path()).unwrap();
        assert_eq!(unreal.scripts_dir(), dir.path().join("Source/Skyfall"));
        assert_eq!(
            unreal.script_path("HeroCharacter.h").unwrap(),
            dir.path().join("Source/Skyfall/HeroCharacter.h")
        );
        assert_eq!(
            unreal.script_path("HeroCharacter").unwrap(),
            dir.path().join("Source/Skyfall/HeroCharacter.cpp")
        );
    }

    #[test]
    fn names_cannot_leave_the_scripts_folder() {
        let (_dir, unity) = unity_project();
        assert!(unity.script_path("../Secrets.cs").is_err());
        assert!(unity.script_path("/etc/passwd").is_err());
        assert!(unity.script_path("  ").is_err());
    }

    #[test]
    fn overwrite_backs_up_previous_contents() {
        let (dir, unity) = unity_project();
        let backups = dir.path().join("backups");

        let first = unity.write_script("Player", "class Player {}", &backups).unwrap();
        assert_eq!(first.backup, None);
        assert_eq!(first.size_bytes, "class Player {}".len());
        assert!(list_backups(&backups, None).unwrap().is_empty());

        let second = unity
            .write_script("Player.cs", "class Player { int hp; }", &backups)
            .unwrap();
        let backup = second.backup.unwrap();
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "class Player {}");
        let backup_name = backup.file_name().unwrap().to_str().unwrap();
        assert!(backup_name.starts_with("Player_"));
        assert!(backup_name.ends_with(".cs.bak"));
        assert_eq!(unity.read_script("Player").unwrap(), "class Player { int hp; }");

        let listed = list_backups(&backups, Some("Player.cs")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, backup);
        assert!(list_backups(&backups, Some("Enemy.cs")).unwrap().is_empty());
    }

    #[test]
    fn reading_a_missing_script_fails() {
        let (_dir, unity) = unity_project();
        assert!(unity.read_script("Ghost").is_err());
    }

    #[test]
    fn open_rejects_wrong_engine_layout() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectFolder::open(Engine::Godot, dir.path()).is_err());
        assert!(ProjectFolder::open(Engine::Unreal, dir.path()).is_err());
    }
}
