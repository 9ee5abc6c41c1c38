use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Text payloads are cut to this many characters before being sent upstream.
pub const MAX_TEXT_LEN: usize = 5000;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Other,
}

/// The single pending upload. Images carry a base64 data-URL, everything else
/// carries decoded text truncated to `MAX_TEXT_LEN` characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub kind: FileKind,
    pub payload: String,
}

impl UploadedFile {
    pub fn read(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let bytes = std::fs::read(path).with_context(|| format!("failed to read {:?}", path))?;

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(Self {
                name,
                kind: FileKind::Image,
                payload: format!("data:{};base64,{}", mime_for_extension(&ext), encoded),
            })
        } else {
            let text = String::from_utf8_lossy(&bytes);
            Ok(Self {
                name,
                kind: FileKind::Other,
                payload: truncate_chars(&text, MAX_TEXT_LEN),
            })
        }
    }

    /// The annotation appended to outbound content when this file rides along
    /// with a message.
    pub fn context_annotation(&self) -> String {
        match self.kind {
            FileKind::Image => format!(
                "\n\n[User uploaded an image: {}. Please describe or analyze it.]",
                self.name
            ),
            FileKind::Other => format!(
                "\n\n[User uploaded a document: {}. Content: {}]",
                self.name, self.payload
            ),
        }
    }
}

fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
