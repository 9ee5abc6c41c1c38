use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::Turn;
use crate::files::UploadedFile;

pub const DEFAULT_API_URL: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_MODEL: &str = "sonar";

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

/// Prefix applied to outbound content when search mode is active.
pub const SEARCH_DIRECTIVE: &str =
    "Perform a web search and provide current information about: ";

const CODE_FORMAT_INSTRUCTION: &str = "\n\nPlease format code snippets using proper \
markdown code blocks with language identifiers.";

/// Phrases in the user's own text that ask for generated code. Matched
/// case-insensitively against the original input, not the augmented content.
const CODE_TRIGGERS: &[&str] = &[
    "write code",
    "generate code",
    "create program",
    "write a program",
    "code for",
    "function that",
];

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat endpoint returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("response body had no reply content")]
    MissingReply,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Build the outbound content for one send: the user's text, then the file
/// annotation, then the search directive wrapping, then the code-format
/// instruction when the original text asks for code.
pub fn compose_content(user_text: &str, file: Option<&UploadedFile>, search_mode: bool) -> String {
    let mut content = user_text.to_string();
    if let Some(file) = file {
        content.push_str(&file.context_annotation());
    }
    if search_mode {
        content = format!("{}{}", SEARCH_DIRECTIVE, content);
    }
    if wants_code_formatting(user_text) {
        content.push_str(CODE_FORMAT_INSTRUCTION);
    }
    content
}

pub fn wants_code_formatting(user_text: &str) -> bool {
    let lower = user_text.to_lowercase();
    CODE_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// Thin client for an OpenAI-style chat-completions endpoint. One POST per
/// send, bearer auth, no retries.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatClient {
    pub fn new(api_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            http: Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    // Search and plain sends both resolve to the configured model today; the
    // flag stays in the signature because the selector is per-request.
    fn model_for(&self, _search_mode: bool) -> &str {
        &self.model
    }

    /// Issue the single completion request and extract the reply text.
    pub async fn complete(
        &self,
        search_mode: bool,
        messages: &[Turn],
    ) -> Result<String, ChatError> {
        let body = CompletionRequest {
            model: self.model_for(search_mode),
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stream: false,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.as_deref().unwrap_or_default()),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(800).collect();
            return Err(ChatError::Status { status, detail });
        }

        let text = response.text().await?;
        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|_| ChatError::MissingReply)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ChatError::MissingReply)
    }
}
