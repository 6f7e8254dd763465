//! Context summaries and prompt text handed to the model.

use crate::config::AssistantConfig;
use crate::history::ChatTurn;
use crate::memory::ProjectMemory;

/// How many of the most recent scripts the summary lists.
pub const SUMMARY_SCRIPTS: usize = 5;
/// How many of the earliest todos the summary lists.
pub const SUMMARY_TODOS: usize = 3;

/// Default system prompt written on first use.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a game development AI assistant.

Capabilities:
- Write C# scripts for Unity
- Write GDScript for Godot
- Write C++ for Unreal Engine
- Explain game development concepts
- Debug code and fix errors
- Suggest game architecture

Guidelines:
- Keep code clean and well-commented
- Follow engine-specific conventions
- Provide complete, working code
- Explain complex logic
- Be concise but thorough

Recommend performance-conscious solutions.";

/// Render a bounded digest of project memory.
///
/// Lists the last five scripts (oldest of those first) and the first three
/// todos; the section headers always carry the full counts. The todo section
/// is left out when there are none.
pub fn build_context_summary(memory: &ProjectMemory) -> String {
    let info = &memory.project_info;
    let name = non_empty_or(&info.name, "Unnamed");
    let engine = non_empty_or(&info.engine, "N/A");

    let mut out = String::from("PROJECT CONTEXT:\n");
    out.push_str(&format!("- Name: {name}\n"));
    out.push_str(&format!("- Engine: {engine}\n"));

    let scripts = &memory.scripts;
    out.push_str(&format!("\nSCRIPTS ({}):\n", scripts.len()));
    let start = scripts.len().saturating_sub(SUMMARY_SCRIPTS);
    for script in &scripts[start..] {
        out.push_str(&format!("  - {}: {}\n", script.name, script.purpose));
    }

    let todos = &memory.todos;
    if !todos.is_empty() {
        out.push_str(&format!("\nTODOs ({}):\n", todos.len()));
        for todo in todos.iter().take(SUMMARY_TODOS) {
            out.push_str(&format!("  - [{}] {}\n", todo.priority, todo.task));
        }
    }

    out
}

/// Context for one request: engine and project folder, then the memory
/// summary when memory is enabled.
pub fn build_full_context(config: &AssistantConfig, memory: &ProjectMemory) -> String {
    let mut context = format!("Engine: {}\n", config.current_engine);
    if let Some(ref path) = config.project_path {
        context.push_str(&format!("Project: {}\n", path.display()));
    }
    if config.memory_enabled {
        context.push('\n');
        context.push_str(&build_context_summary(memory));
    }
    context
}

/// Flatten the conversation into the role-labelled text the model expects.
///
/// Only the last `max_turns` turns of `history` are included.
pub fn format_prompt(
    system_prompt: &str,
    context: &str,
    history: &[ChatTurn],
    max_turns: usize,
    message: &str,
) -> String {
    let mut prompt = String::new();
    push_block(&mut prompt, "SYSTEM", system_prompt);
    if !context.is_empty() {
        push_block(&mut prompt, "SYSTEM", &format!("Context: {context}"));
    }

    let start = history.len().saturating_sub(max_turns);
    for turn in &history[start..] {
        push_block(&mut prompt, turn.sender.role(), &turn.text);
    }

    push_block(&mut prompt, "USER", message);
    prompt.push_str("ASSISTANT:\n");
    prompt
}

fn push_block(prompt: &mut String, role: &str, content: &str) {
    prompt.push_str(&format!("{role}:\n{content}\n\n"));
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Return `s` unchanged when short enough, otherwise cut to `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::history::Sender;
    use crate::memory::{ScriptRecord, TodoRecord};
    use serde_json::Map;
    use std::path::PathBuf;

    fn script(name: &str) -> ScriptRecord {
        ScriptRecord {
            name: name.into(),
            purpose: format!("{name} purpose"),
            features: Vec::new(),
            created: String::new(),
            last_modified: String::new(),
            extra: Map::new(),
        }
    }

    fn todo(task: &str) -> TodoRecord {
        TodoRecord {
            task: task.into(),
            priority: "medium".into(),
            added: String::new(),
            completed: false,
            extra: Map::new(),
        }
    }

    #[test]
    fn empty_memory_uses_fallbacks_and_omits_todos() {
        let summary = build_context_summary(&ProjectMemory::empty());
        assert!(summary.contains("- Name: Unnamed\n"));
        assert!(summary.contains("- Engine: N/A\n"));
        assert!(summary.contains("SCRIPTS (0):"));
        assert!(!summary.contains("TODOs"));
    }

    #[test]
    fn lists_only_the_last_five_scripts() {
        let mut memory = ProjectMemory::empty();
        memory.scripts = (1..=8).map(|i| script(&format!("S{i}"))).collect();

        let summary = build_context_summary(&memory);
        assert!(summary.contains("SCRIPTS (8):"));
        let listed: Vec<&str> = summary
            .lines()
            .filter_map(|l| l.strip_prefix("  - "))
            .map(|l| l.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(listed, ["S4", "S5", "S6", "S7", "S8"]);
    }

    #[test]
    fn lists_only_the_first_three_todos() {
        let mut memory = ProjectMemory::empty();
        memory.todos = (1..=5).map(|i| todo(&format!("T{i}"))).collect();

        let summary = build_context_summary(&memory);
        assert!(summary.contains("TODOs (5):"));
        assert!(summary.contains("  - [medium] T1\n  - [medium] T2\n  - [medium] T3\n"));
        assert!(!summary.contains("T4"));
    }

    #[test]
    fn full_context_respects_memory_toggle() {
        let mut config = AssistantConfig {
            current_engine: Engine::Godot,
            project_path: Some(PathBuf::from("/games/skyfall")),
            ..AssistantConfig::default()
        };
        let memory = ProjectMemory::empty();

        let context = build_full_context(&config, &memory);
        assert!(context.starts_with("Engine: Godot\nProject: /games/skyfall\n\nPROJECT CONTEXT:"));

        config.memory_enabled = false;
        assert_eq!(
            build_full_context(&config, &memory),
            "Engine: Godot\nProject: /games/skyfall\n"
        );
    }

    #[test]
    fn prompt_keeps_only_recent_turns() {
        let history: Vec<ChatTurn> = (0..12)
            .map(|i| {
                let sender = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
                ChatTurn::new(sender, &format!("turn {i}"))
            })
            .collect();

        let prompt = format_prompt("sys", "ctx", &history, 10, "hello");
        assert!(prompt.starts_with("SYSTEM:\nsys\n\nSYSTEM:\nContext: ctx\n\n"));
        assert!(!prompt.contains("turn 1\n"));
        assert!(prompt.contains("USER:\nturn 2\n\nASSISTANT:\nturn 3\n\n"));
        assert!(prompt.ends_with("USER:\nhello\n\nASSISTANT:\n"));
    }

    #[test]
    fn prompt_skips_empty_context() {
        let prompt = format_prompt("sys", "", &[], 10, "hi");
        assert_eq!(prompt, "SYSTEM:\nsys\n\nUSER:\nhi\n\nASSISTANT:\n");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
