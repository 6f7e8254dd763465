//! CLI entrypoint and command routing for gamedev-assistant.
//!
//! The command handlers own the single `MemoryStore` for the run. Model
//! requests run to completion before any memory mutation, so project memory
//! is only changed from here.

mod actions;
mod config;
mod engine;
mod history;
mod memory;
mod model;
mod project;
mod prompt;
mod reconcile;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::actions::{ActionKind, ActionLog, ActionStatus};
use crate::config::AssistantConfig;
use crate::engine::Engine;
use crate::history::{ChatHistory, Sender};
use crate::memory::{LoadStatus, MemoryStore, ScriptChange, ScriptRecord};
use crate::project::{ProjectFolder, list_backups};
use crate::prompt::{build_context_summary, build_full_context, format_prompt, truncate_chars};

#[derive(Parser)]
/// Top-level CLI arguments parsed by clap.
#[command(
    name = "gamedev-assistant",
    about = "Local AI assistant that remembers your game project"
)]
struct Cli {
    /// Project memory file (overrides the config file)
    #[arg(long, global = true)]
    memory: Option<PathBuf>,

    /// Engine project folder (overrides project_path in the config file)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Model to use (e.g. llama3.2:3b)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Log operational events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
/// First-level CLI commands.
enum Commands {
    /// Show or edit project identity
    #[command(subcommand)]
    Project(ProjectAction),

    /// Open an engine project folder and record its engine
    Open {
        /// unity, godot or unreal
        engine: Engine,
        /// Project folder
        path: PathBuf,
    },

    /// Track scripts
    #[command(subcommand)]
    Script(ScriptAction),

    /// Track outstanding tasks
    #[command(subcommand)]
    Todo(TodoAction),

    /// Print the context summary sent with every request
    Context,

    /// Show memory statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete all project memory
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Ask the model a question with project context
    Chat {
        /// Message to send
        message: String,
    },

    /// Show the action log
    Log {
        /// Number of recent actions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
/// gamedev-assistant project subcommands.
enum ProjectAction {
    /// Show project identity
    Show,
    /// Set project identity fields
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        engine: Option<String>,
    },
}

#[derive(Subcommand)]
/// gamedev-assistant script subcommands.
enum ScriptAction {
    /// Record a script, or update the one with the same name
    Add {
        name: String,
        purpose: String,
        /// Feature of the script (repeatable)
        #[arg(short, long = "feature")]
        features: Vec<String>,
    },
    /// List all scripts
    List,
    /// Show one script
    Show { name: String },
    /// Search script names and purposes
    Search { query: String },
    /// Write a script file into the project, backing up the old version
    Write {
        name: String,
        /// File holding the new contents
        #[arg(long = "from")]
        from: PathBuf,
        /// Also record the script in project memory with this purpose
        #[arg(long)]
        purpose: Option<String>,
        /// Feature of the script (repeatable)
        #[arg(short, long = "feature", requires = "purpose")]
        features: Vec<String>,
    },
    /// Print a script file from the project
    Read { name: String },
    /// List script backups, newest first
    Backups { name: Option<String> },
}

#[derive(Subcommand)]
/// gamedev-assistant todo subcommands.
enum TodoAction {
    /// Add a task
    Add {
        task: String,
        /// low, medium or high
        #[arg(short, long, default_value = memory::DEFAULT_PRIORITY)]
        priority: String,
    },
    /// List tasks
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "error" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().with_context(|| "getting current directory")?;
    let mut cfg = AssistantConfig::load(&cwd)?.with_overrides(cli.model, cli.memory);
    if let Some(path) = cli.project {
        cfg.project_path = Some(path);
    }

    let mut store = MemoryStore::load(&cfg.memory_path);
    if store.load_status() == LoadStatus::Recovered {
        eprintln!(
            "Project memory at {} was unreadable; starting with empty memory.",
            store.path().display()
        );
    }
    let actions = ActionLog::new(&cfg.action_log_path);

    match cli.command {
        Commands::Project(action) => match action {
            ProjectAction::Show => {
                let info = store.project_info();
                println!("Name:        {}", or_dash(&info.name));
                println!("Genre:       {}", or_dash(&info.genre));
                println!("Engine:      {}", or_dash(&info.engine));
                println!("Description: {}", or_dash(&info.description));
                println!("Created:     {}", info.created);
            }
            ProjectAction::Set {
                name,
                genre,
                engine,
            } => {
                store.set_project_info(name.as_deref(), genre.as_deref(), engine.as_deref());
                println!("Project updated.");
            }
        },

        Commands::Open { engine, path } => {
            let folder = ProjectFolder::open(engine, &path)?;
            store.set_project_info(None, None, Some(engine.id()));
            actions.log_action(
                ActionKind::ProjectOpened,
                json!({"path": path.display().to_string(), "type": engine.id()}),
                ActionStatus::Success,
            );
            info!(engine = engine.id(), path = %path.display(), "project opened");
            println!("Opened {engine} project at {}", path.display());
            println!("Scripts folder: {}", folder.scripts_dir().display());
            println!(
                "Set `current_engine = \"{}\"` and `project_path` in {} to use it in chat.",
                engine.id(),
                config::CONFIG_FILE
            );
        }

        Commands::Script(action) => match action {
            ScriptAction::Add {
                name,
                purpose,
                features,
            } => {
                let change = store.upsert_script(&name, &purpose, features);
                log_script_change(&actions, &name, change);
                match change {
                    ScriptChange::Created => println!("Added script '{name}'."),
                    ScriptChange::Updated => println!("Updated script '{name}'."),
                }
            }
            ScriptAction::List => {
                let scripts = store.list_scripts();
                if scripts.is_empty() {
                    println!("No scripts yet.");
                } else {
                    println!("Scripts ({}):\n", scripts.len());
                    for script in scripts {
                        print_script(script);
                    }
                }
            }
            ScriptAction::Show { name } => match store.get_script(&name) {
                Some(script) => {
                    print_script(script);
                    println!("    created:       {}", script.created);
                    println!("    last modified: {}", script.last_modified);
                }
                None => println!("Script '{name}' not found."),
            },
            ScriptAction::Search { query } => {
                let results = store.search_scripts(&query);
                if results.is_empty() {
                    println!("No scripts found for '{query}'.");
                } else {
                    println!(
                        "Found {} script{}:\n",
                        results.len(),
                        if results.len() == 1 { "" } else { "s" }
                    );
                    for script in results {
                        print_script(script);
                    }
                }
            }
            ScriptAction::Write {
                name,
                from,
                purpose,
                features,
            } => {
                let folder = open_project(&cfg)?;
                let content = std::fs::read_to_string(&from)
                    .with_context(|| format!("reading {}", from.display()))?;
                let written = folder.write_script(&name, &content, &cfg.backup_dir)?;
                let kind = if written.backup.is_some() {
                    ActionKind::ScriptModified
                } else {
                    ActionKind::ScriptCreated
                };
                let file_name = written
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(name);
                actions.log_action(
                    kind,
                    json!({
                        "script_name": file_name,
                        "path": written.path.display().to_string(),
                        "size_bytes": written.size_bytes,
                        "backup": written.backup.as_ref().map(|p| p.display().to_string()),
                    }),
                    ActionStatus::Success,
                );
                info!(path = %written.path.display(), size_bytes = written.size_bytes, "script written");
                println!("Wrote {} ({} bytes).", written.path.display(), written.size_bytes);
                if let Some(backup) = &written.backup {
                    println!("Previous version saved to {}.", backup.display());
                }
                if let Some(purpose) = purpose {
                    store.upsert_script(&file_name, &purpose, features);
                    println!("Recorded '{file_name}' in project memory.");
                }
            }
            ScriptAction::Read { name } => {
                let folder = open_project(&cfg)?;
                print!("{}", folder.read_script(&name)?);
            }
            ScriptAction::Backups { name } => {
                let backups = list_backups(&cfg.backup_dir, name.as_deref())?;
                if backups.is_empty() {
                    println!("No backups in {}.", cfg.backup_dir.display());
                }
                for backup in &backups {
                    println!(
                        "{}  {:>8} bytes  {}",
                        backup.modified.format("%Y-%m-%d %H:%M:%S"),
                        backup.size_bytes,
                        backup.path.display()
                    );
                }
            }
        },

        Commands::Todo(action) => match action {
            TodoAction::Add { task, priority } => {
                store.add_todo(&task, Some(&priority));
                actions.log_action(
                    ActionKind::TodoAdded,
                    json!({"task": task, "priority": priority}),
                    ActionStatus::Success,
                );
                println!("Added TODO: {task}");
            }
            TodoAction::List => {
                let todos = store.list_todos();
                if todos.is_empty() {
                    println!("No pending tasks.");
                } else {
                    println!("Pending tasks:\n");
                    for (i, todo) in todos.iter().enumerate() {
                        println!("  {}. [{}] {}", i + 1, todo.priority.to_uppercase(), todo.task);
                    }
                }
            }
        },

        Commands::Context => {
            print!("{}", build_context_summary(store.document()));
        }

        Commands::Stats { json } => {
            let stats = store.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Scripts:     {}", stats.total_scripts);
                println!("Assets:      {}", stats.total_assets);
                println!("TODOs:       {}", stats.pending_todos);
                println!("Completed:   {}", stats.completed_tasks);
                println!("Days active: {}", stats.days_active);
                println!("Updated:     {}", stats.last_updated);
            }
        }

        Commands::Clear { yes } => {
            if !yes {
                println!(
                    "This deletes all project memory (scripts, assets and TODOs). \
                     Re-run with --yes to confirm."
                );
                return Ok(());
            }
            store.clear_memory();
            actions.log_action(ActionKind::MemoryCleared, json!({}), ActionStatus::Success);
            println!("Memory cleared.");
        }

        Commands::Chat { message } => {
            chat(&cfg, &mut store, &actions, &message).await?;
        }

        Commands::Log { limit } => {
            let entries = actions.recent(limit);
            if entries.is_empty() {
                println!("No actions logged.");
            } else {
                for entry in &entries {
                    println!(
                        "{} {:<16} {:<8} {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        serde_json::to_value(entry.kind)?.as_str().unwrap_or_default(),
                        serde_json::to_value(entry.status)?.as_str().unwrap_or_default(),
                        entry.details,
                    );
                }
            }
            let stats = actions.stats();
            println!(
                "\n{} actions: {} scripts created, {} modified, {} AI requests, {} errors, {} warnings",
                stats.total_actions,
                stats.scripts_created,
                stats.scripts_modified,
                stats.ai_requests,
                stats.errors,
                stats.warnings,
            );
        }
    }

    Ok(())
}

/// One request/response round trip.
///
/// The request runs first; history and project memory are updated only
/// after it has returned.
async fn chat(
    cfg: &AssistantConfig,
    store: &mut MemoryStore,
    actions: &ActionLog,
    message: &str,
) -> Result<()> {
    let mut history = ChatHistory::load(&cfg.history_path, cfg.max_chat_history);
    let system_prompt = cfg.system_prompt()?;
    let context = build_full_context(cfg, store.document());
    let prompt = format_prompt(
        &system_prompt,
        &context,
        history.turns(),
        cfg.context_turns,
        message,
    );

    let mut client = model::ModelClient::new(cfg)?;
    info!(model = client.model(), prompt_length = prompt.len(), "sending request");
    let started = Instant::now();
    let outcome = match client.check_connection().await {
        Ok(()) => client.generate(&prompt).await,
        Err(error) => Err(error),
    };
    let elapsed = started.elapsed().as_secs_f64();

    let reply = match outcome {
        Ok(reply) => reply,
        Err(error) => {
            actions.log_action(
                ActionKind::AiError,
                json!({"error": error.to_string(), "prompt": truncate_chars(message, 100)}),
                ActionStatus::Failure,
            );
            eprintln!("Error: {error}");
            return Ok(());
        }
    };

    actions.log_action(
        ActionKind::AiRequest,
        json!({
            "prompt_length": prompt.len(),
            "response_time_seconds": (elapsed * 100.0).round() / 100.0,
        }),
        ActionStatus::Success,
    );
    println!("{reply}");

    history.push(Sender::User, message);
    history.push(Sender::Assistant, &reply);
    history.save()?;

    if let Some(script) = engine::detect_script(message, &reply) {
        let change = store.upsert_script(&script, truncate_chars(message, 100), Vec::new());
        log_script_change(actions, &script, change);
        eprintln!("Remembered script {script}.");
    }

    Ok(())
}

/// The configured project folder, validated for the current engine.
fn open_project(cfg: &AssistantConfig) -> Result<ProjectFolder> {
    let Some(path) = &cfg.project_path else {
        bail!(
            "no project folder: pass --project or set project_path in {}",
            config::CONFIG_FILE
        );
    };
    ProjectFolder::open(cfg.current_engine, path)
}

fn log_script_change(actions: &ActionLog, name: &str, change: ScriptChange) {
    let kind = match change {
        ScriptChange::Created => ActionKind::ScriptCreated,
        ScriptChange::Updated => ActionKind::ScriptModified,
    };
    actions.log_action(kind, json!({"script_name": name}), ActionStatus::Success);
    info!(script = name, ?change, "script recorded");
}

fn print_script(script: &ScriptRecord) {
    println!("  {} - {}", script.name, script.purpose);
    if !script.features.is_empty() {
        println!("    features: {}", script.features.join(", "));
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}
