use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::Config;

/// Name/value pairs that survive restarts, stored as a JSON object
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

/// Get the cookie file path (~/.config/veld/cookies.json)
pub fn cookie_file_path() -> Option<PathBuf> {
    Config::config_dir().map(|p| p.join("cookies.json"))
}

impl CookieJar {
    /// A jar that never touches the disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the jar at `path`; a missing or unreadable file gives an empty jar
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path: Some(path),
            values,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Set a cookie and write the jar back to disk
    pub fn set(&mut self, name: &str, value: impl ToString) {
        if name.is_empty() {
            return;
        }
        self.values.insert(name.to_string(), value.to_string());
        self.save();
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        match serde_json::to_string(&self.values) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!(path = %path.display(), error = %e, "failed to write cookies");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize cookies"),
        }
    }
}
