use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::client::{compose_content, ChatClient, ChatError};
use crate::conversation::Conversation;
use crate::files::{FileKind, UploadedFile};
use crate::format;
use crate::store::Store;

/// Shown in place of a reply when the request fails, whatever the cause.
pub const FALLBACK_MESSAGE: &str = "Hmm, something seems off. Please try again.";

pub const WELCOME_MESSAGE: &str =
    "Hello! I'm **Quill**, your AI assistant. How can I help you today?";

const MISSING_KEY_MESSAGE: &str = "No API key is configured. Set QUILL_API_KEY or add \
\"api_key\" to the config file, then try again.";

/// Fixed pause before the request goes out.
pub const SEND_DELAY_MS: u64 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub kind: FileKind,
}

/// One rendered transcript entry, kept for replay on the next launch.
/// `markup` is the serialized formatter output; `text` is the raw content the
/// render pass re-styles each frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiMessage {
    pub sender: Sender,
    pub text: String,
    pub markup: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl UiMessage {
    pub fn user(text: &str, attachment: Option<Attachment>) -> Self {
        let markup = if text.is_empty() {
            String::new()
        } else {
            format!("<p>{}</p>", format::escape(text))
        };
        Self {
            sender: Sender::User,
            text: text.to_string(),
            markup,
            attachment,
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.to_string(),
            markup: format::format(text),
            attachment: None,
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub theme: Theme,
    pub search_mode: bool,
    pub confirm_clear: bool,

    // Input state
    pub input: String,
    pub cursor: usize,
    pub attach_input: Option<String>,

    // Chat state
    pub transcript: Vec<UiMessage>,
    pub conversation: Conversation,
    pub uploaded_file: Option<UploadedFile>,
    typing: Option<u64>,
    typing_seq: u64,
    pub pending: Option<JoinHandle<Result<String, ChatError>>>,

    // Scroll state (sizes updated during render)
    pub scroll: u16,
    pub follow: bool,
    pub chat_height: u16,
    pub chat_width: u16,

    // Animation state
    pub animation_frame: u8,

    client: ChatClient,
    store: Store,
}

impl App {
    pub fn new(client: ChatClient, store: Store) -> Self {
        let theme = store.load_theme().unwrap_or(Theme::Light);
        let (transcript, turns) = store.load();

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            theme,
            search_mode: false,
            confirm_clear: false,

            input: String::new(),
            cursor: 0,
            attach_input: None,

            transcript: transcript.unwrap_or_default(),
            conversation: Conversation::from_turns(turns.unwrap_or_default()),
            uploaded_file: None,
            typing: None,
            typing_seq: 0,
            pending: None,

            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            client,
            store,
        };

        if app.transcript.is_empty() {
            app.seed_welcome();
        }
        app
    }

    /// Kick off one send: record the user's side, then spawn the request.
    /// A second call while a request is in flight is rejected outright.
    pub fn begin_send(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() && self.uploaded_file.is_none() {
            return;
        }

        let file = self.uploaded_file.take();
        let attachment = file.as_ref().map(|f| Attachment {
            name: f.name.clone(),
            kind: f.kind,
        });
        self.transcript.push(UiMessage::user(&text, attachment));
        self.input.clear();
        self.cursor = 0;

        let search_mode = self.search_mode;
        self.search_mode = false;

        // The composed content is appended before the request goes out, so a
        // failed send still leaves the user's turn in the log.
        let content = compose_content(&text, file.as_ref(), search_mode);
        self.conversation.append_user(content);

        if !self.client.has_key() {
            tracing::warn!("send attempted without an API key");
            self.transcript.push(UiMessage::assistant(MISSING_KEY_MESSAGE));
            self.follow = true;
            return;
        }

        self.typing_seq += 1;
        self.typing = Some(self.typing_seq);
        self.animation_frame = 0;

        let client = self.client.clone();
        let window = self.conversation.window_for_request();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(SEND_DELAY_MS)).await;
            client.complete(search_mode, &window).await
        }));
        self.follow = true;
    }

    pub fn resolve_reply(&mut self, reply: String) {
        self.typing.take();
        self.conversation.append_assistant(&reply);
        self.transcript.push(UiMessage::assistant(&reply));
        if let Err(err) = self.store.save(&self.transcript, self.conversation.turns()) {
            tracing::warn!("failed to persist chat history: {err:#}");
        }
        self.follow = true;
    }

    /// Failure leaves the conversation as it was after `begin_send`: the user
    /// turn stays recorded, no assistant turn is added, nothing is persisted.
    pub fn fail_reply(&mut self, reason: &dyn std::fmt::Display) {
        self.typing.take();
        tracing::error!("chat request failed: {reason}");
        self.transcript.push(UiMessage::assistant(FALLBACK_MESSAGE));
        self.follow = true;
    }

    pub fn clear_history(&mut self) {
        self.confirm_clear = false;
        self.conversation.clear();
        self.transcript.clear();
        self.store.clear();
        self.seed_welcome();
        self.scroll = 0;
        self.follow = true;
    }

    fn seed_welcome(&mut self) {
        self.transcript.push(UiMessage::assistant(WELCOME_MESSAGE));
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(err) = self.store.save_theme(self.theme) {
            tracing::warn!("failed to persist theme: {err:#}");
        }
    }

    pub fn toggle_search(&mut self) {
        self.search_mode = !self.search_mode;
    }

    /// A file that cannot be read changes nothing; the failure only lands in
    /// the log.
    pub fn attach_file(&mut self, path: &str) {
        match UploadedFile::read(Path::new(path)) {
            Ok(file) => self.uploaded_file = Some(file),
            Err(err) => tracing::warn!("file attach failed: {err:#}"),
        }
    }

    pub fn dismiss_file(&mut self) {
        self.uploaded_file = None;
    }

    pub fn is_typing(&self) -> bool {
        self.typing.is_some()
    }

    pub fn tick(&mut self) {
        if self.typing.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
        self.follow = false;
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_add(1);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatClient, SEARCH_DIRECTIVE};
    use crate::conversation::Role;

    fn test_app(dir: &std::path::Path, with_key: bool) -> App {
        let key = with_key.then(|| "pk-test".to_string());
        let client = ChatClient::new(
            "http://127.0.0.1:9/chat/completions".into(),
            key,
            "sonar".into(),
        );
        App::new(client, Store::at(dir))
    }

    #[tokio::test]
    async fn test_first_run_seeds_welcome() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), true);
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].sender, Sender::Assistant);
        assert!(app.transcript[0].markup.contains("<strong>Quill</strong>"));
        assert!(app.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_send_records_user_turn_before_any_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.input = "hello there".into();
        app.begin_send();

        assert_eq!(app.conversation.len(), 1);
        assert_eq!(app.conversation.turns()[0].role, Role::User);
        assert_eq!(app.conversation.turns()[0].content, "hello there");
        assert!(app.is_typing());
        assert!(app.pending.is_some());
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_reentrant_send_is_rejected_while_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.input = "first".into();
        app.begin_send();
        app.input = "second".into();
        app.begin_send();

        assert_eq!(app.conversation.len(), 1);
        assert_eq!(app.input, "second");
    }

    #[tokio::test]
    async fn test_empty_input_without_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.input = "   ".into();
        app.begin_send();
        assert!(app.pending.is_none());
        assert!(app.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_user_turn_and_shows_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.input = "hello".into();
        app.begin_send();
        if let Some(task) = app.pending.take() {
            task.abort();
        }

        app.fail_reply(&"simulated 500");

        assert_eq!(app.conversation.len(), 1);
        assert!(app.conversation.turns().iter().all(|t| t.role == Role::User));
        assert!(!app.is_typing());
        let last = app.transcript.last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.text, FALLBACK_MESSAGE);
        // Nothing was persisted for the failed exchange
        let (_, turns) = Store::at(dir.path()).load();
        assert!(turns.is_none());
    }

    #[tokio::test]
    async fn test_success_appends_assistant_turn_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.input = "hello".into();
        app.begin_send();
        if let Some(task) = app.pending.take() {
            task.abort();
        }

        app.resolve_reply("hi back".into());

        assert_eq!(app.conversation.len(), 2);
        assert_eq!(app.conversation.turns()[1].role, Role::Assistant);
        assert!(!app.is_typing());

        let (transcript, turns) = Store::at(dir.path()).load();
        assert_eq!(turns.unwrap().len(), 2);
        assert_eq!(transcript.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_search_mode_wraps_content_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.toggle_search();
        app.input = "weather".into();
        app.begin_send();

        assert!(!app.search_mode);
        let content = &app.conversation.turns()[0].content;
        assert!(content.starts_with(SEARCH_DIRECTIVE));
        assert!(content.contains("weather"));
    }

    #[tokio::test]
    async fn test_upload_slot_is_consumed_by_send() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("notes.txt");
        std::fs::write(&file_path, "file body").unwrap();

        let mut app = test_app(dir.path(), true);
        app.attach_file(file_path.to_str().unwrap());
        assert!(app.uploaded_file.is_some());

        app.input = "look at this".into();
        app.begin_send();

        assert!(app.uploaded_file.is_none());
        let content = &app.conversation.turns()[0].content;
        assert!(content.contains("a document: notes.txt"));
        assert!(content.contains("file body"));
        assert_eq!(
            app.transcript.last().unwrap().attachment.as_ref().unwrap().name,
            "notes.txt"
        );
    }

    #[tokio::test]
    async fn test_unreadable_file_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.attach_file("/nonexistent/missing.txt");
        assert!(app.uploaded_file.is_none());
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits_without_typing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), false);
        app.input = "hello".into();
        app.begin_send();

        assert!(app.pending.is_none());
        assert!(!app.is_typing());
        // User turn is still recorded; the notice is transcript-only
        assert_eq!(app.conversation.len(), 1);
        assert!(app.transcript.last().unwrap().text.contains("QUILL_API_KEY"));
    }

    #[tokio::test]
    async fn test_clear_reseeds_welcome_and_empties_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.input = "hello".into();
        app.begin_send();
        if let Some(task) = app.pending.take() {
            task.abort();
        }
        app.resolve_reply("hi".into());

        app.clear_history();

        assert!(app.conversation.is_empty());
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].text, WELCOME_MESSAGE);
        let (transcript, turns) = Store::at(dir.path()).load();
        assert!(transcript.is_none());
        assert!(turns.is_none());
    }

    #[tokio::test]
    async fn test_reload_restores_transcript_and_turns() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = test_app(dir.path(), true);
            app.input = "hello".into();
            app.begin_send();
            if let Some(task) = app.pending.take() {
                task.abort();
            }
            app.resolve_reply("hi back".into());
        }
        let app = test_app(dir.path(), true);
        assert_eq!(app.transcript.len(), 3);
        assert_eq!(app.conversation.len(), 2);
    }

    #[tokio::test]
    async fn test_theme_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        assert_eq!(app.theme, Theme::Light);
        app.toggle_theme();
        assert_eq!(app.theme, Theme::Dark);

        let app = test_app(dir.path(), true);
        assert_eq!(app.theme, Theme::Dark);
    }

    #[test]
    fn test_typing_indicator_animates_only_while_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path(), true);
        app.tick();
        assert_eq!(app.animation_frame, 0);
        app.typing = Some(1);
        app.tick();
        app.tick();
        assert_eq!(app.animation_frame, 2);
    }
}
