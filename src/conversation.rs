use serde::{Deserialize, Serialize};

/// How many stored turns accompany a request, newest last.
pub const HISTORY_WINDOW: usize = 10;

/// Persona text for the synthesized system turn. Never stored with the
/// conversation; prepended fresh to every outbound window.
pub const SYSTEM_PROMPT: &str = "You are Quill, a friendly AI chat assistant. \
You can chat naturally, write code, analyze documents and images, and search the web. \
Always introduce yourself as Quill when asked who you are. \
Be helpful, concise, and professional in your responses.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in the conversation log. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
}

/// Append-only, chronologically ordered log of turns. Unbounded in storage;
/// only a sliding window goes upstream.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    /// Build the outbound message list: the system turn followed by the last
    /// `HISTORY_WINDOW` stored turns. Stored history is left untouched.
    pub fn window_for_request(&self) -> Vec<Turn> {
        let start = self.turns.len().saturating_sub(HISTORY_WINDOW);
        let mut window = Vec::with_capacity(self.turns.len() - start + 1);
        window.push(Turn::system(SYSTEM_PROMPT));
        window.extend(self.turns[start..].iter().cloned());
        window
    }

    /// Drop the entire log. Irreversible.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_starts_with_system_turn() {
        let mut conv = Conversation::new();
        conv.append_user("hello");
        let window = conv.window_for_request();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].role, Role::System);
        assert_eq!(window[0].content, SYSTEM_PROMPT);
        assert_eq!(window[1].role, Role::User);
    }

    #[test]
    fn test_window_caps_history_at_ten() {
        let mut conv = Conversation::new();
        for i in 0..15 {
            conv.append_user(format!("message {}", i));
            conv.append_assistant(format!("reply {}", i));
        }
        let window = conv.window_for_request();
        assert_eq!(window.len(), HISTORY_WINDOW + 1);
        // Newest turn survives, oldest is cut
        assert_eq!(window.last().unwrap().content, "reply 14");
        assert_eq!(window[1].content, "message 10");
        // Storage itself is untouched
        assert_eq!(conv.len(), 30);
    }

    #[test]
    fn test_window_with_short_history() {
        let mut conv = Conversation::new();
        conv.append_user("one");
        conv.append_assistant("two");
        assert_eq!(conv.window_for_request().len(), 3);
    }

    #[test]
    fn test_system_turn_is_not_stored() {
        let mut conv = Conversation::new();
        conv.append_user("hi");
        conv.window_for_request();
        conv.window_for_request();
        assert_eq!(conv.len(), 1);
        assert!(conv.turns().iter().all(|t| t.role != Role::System));
    }

    #[test]
    fn test_clear_leaves_only_system_turn_in_window() {
        let mut conv = Conversation::new();
        conv.append_user("hi");
        conv.append_assistant("hello");
        conv.clear();
        assert!(conv.is_empty());
        let window = conv.window_for_request();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].role, Role::System);
    }

    #[test]
    fn test_turns_keep_chronological_order() {
        let mut conv = Conversation::new();
        conv.append_user("a");
        conv.append_assistant("b");
        conv.append_user("a");
        let contents: Vec<&str> = conv.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
