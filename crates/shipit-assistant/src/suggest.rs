//! Shell commands suggested in an assistant reply.

const SHELL_FENCES: &[&str] = &["sh", "bash", "shell", "zsh", "console"];

/// Commands from ```sh / ```bash / ```shell blocks, in order. Prompts
/// (`$ `), comments and blank lines are dropped; backslash continuations are
/// joined.
pub fn extract_commands(reply: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut in_shell = false;
    let mut in_other = false;
    let mut pending = String::new();

    for line in reply.lines() {
        let trimmed = line.trim();
        if let Some(info) = trimmed.strip_prefix("```") {
            if in_shell || in_other {
                in_shell = false;
                in_other = false;
                pending.clear();
            } else if SHELL_FENCES.contains(&info.trim()) {
                in_shell = true;
            } else {
                in_other = true;
            }
            continue;
        }
        if !in_shell {
            continue;
        }

        let text = trimmed.strip_prefix("$ ").unwrap_or(trimmed);
        if pending.is_empty() && (text.is_empty() || text.starts_with('#')) {
            continue;
        }
        match text.strip_suffix('\\') {
            Some(head) => {
                pending.push_str(head.trim_end());
                pending.push(' ');
            }
            None => {
                pending.push_str(text);
                commands.push(std::mem::take(&mut pending).trim().to_string());
            }
        }
    }
    commands
}
