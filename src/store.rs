//! Persistence adapter: a file-backed string key-value store under the user
//! data directory. One file per key; a missing or unreadable value always
//! reads as absent, never as an error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::app::{Theme, UiMessage};
use crate::conversation::Turn;

/// Serialized transcript snapshots, kept for replay on the next launch.
pub const TRANSCRIPT_KEY: &str = "chat_history";
/// Raw conversation turns, the context window source.
pub const TURNS_KEY: &str = "conversation_history";
/// UI theme preference, stored independently of the chat data.
pub const THEME_KEY: &str = "theme";

pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        let dir = data_dir.join("quill");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open a store rooted at an explicit directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, transcript: &[UiMessage], turns: &[Turn]) -> Result<()> {
        self.set(TRANSCRIPT_KEY, &serde_json::to_string(transcript)?)?;
        self.set(TURNS_KEY, &serde_json::to_string(turns)?)
    }

    /// Both halves load independently; either may be absent on first run.
    pub fn load(&self) -> (Option<Vec<UiMessage>>, Option<Vec<Turn>>) {
        let transcript = self
            .get(TRANSCRIPT_KEY)
            .and_then(|s| serde_json::from_str(&s).ok());
        let turns = self
            .get(TURNS_KEY)
            .and_then(|s| serde_json::from_str(&s).ok());
        (transcript, turns)
    }

    pub fn clear(&self) {
        self.remove(TRANSCRIPT_KEY);
        self.remove(TURNS_KEY);
    }

    pub fn save_theme(&self, theme: Theme) -> Result<()> {
        self.set(THEME_KEY, theme.as_str())
    }

    pub fn load_theme(&self) -> Option<Theme> {
        self.get(THEME_KEY).and_then(|s| Theme::parse(s.trim()))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.key_path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.key_path(key));
    }
}
