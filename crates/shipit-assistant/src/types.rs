use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation, in the shape the messages API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Instructions sent with every request.
pub const SYSTEM_PROMPT: &str = "You help a developer get a JavaScript/TypeScript monorepo building \
again before a push. Be concise. When you recommend shell commands, put each one on its own line \
inside a ```sh fenced block; the developer confirms every command before it runs.";

/// Flatten a conversation into plain text for backends that take a single
/// prompt on stdin.
pub fn render_transcript(history: &[ChatMessage]) -> String {
    let mut out = format!("{SYSTEM_PROMPT}\n\n");
    if let [only] = history {
        out.push_str(&only.content);
        return out;
    }
    for message in history {
        let speaker = match message.role {
            Role::User => "Developer",
            Role::Assistant => "Assistant",
        };
        out.push_str(&format!("{speaker}: {}\n\n", message.content));
    }
    out.push_str("Assistant:");
    out
}
