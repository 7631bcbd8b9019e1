use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;

/// RGB color representation for config
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_color(self) -> ratatui::style::Color {
        ratatui::style::Color::Rgb(self.r, self.g, self.b)
    }
}

/// Review server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Root of the review site, e.g. "https://codereview.example.org/"
    pub base_url: String,

    /// Token sent with star/unstar/close requests
    pub xsrf_token: String,

    /// User agent for all requests
    pub user_agent: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            xsrf_token: String::new(),
            user_agent: concat!("veld/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Diff page settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSettings {
    /// Lines of context fetched per "expand before/after"
    pub context: u32,

    /// Column width passed to the server when fetching skipped lines
    pub column_width: u32,

    /// Fetch static analysis warnings when a diff is opened
    pub analysis_warnings: bool,
}

impl Default for DiffSettings {
    fn default() -> Self {
        Self {
            context: 10,
            column_width: 80,
            analysis_warnings: false,
        }
    }
}

/// Request timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Inline comment submission deadline
    pub submit_secs: u64,

    /// Delay before a draft dialog status message clears itself
    pub status_clear_secs: u64,

    /// Deadline for every other request
    pub request_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            submit_secs: 60,
            status_clear_secs: 3,
            request_secs: 30,
        }
    }
}

impl TimeoutSettings {
    pub fn submit(&self) -> Duration {
        Duration::from_secs(self.submit_secs)
    }

    pub fn status_clear(&self) -> Duration {
        Duration::from_secs(self.status_clear_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Cookie the dashboard cursor position is stored under.
    /// Empty disables persistence.
    pub cookie_name: String,

    /// Cookie for the changelist file cursor
    pub changelist_cookie_name: String,

    /// Maximum number of issues fetched
    pub limit: u32,

    /// Only list issues owned by this account (empty = all open issues)
    pub owner: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            cookie_name: "veld-dashboard".to_string(),
            changelist_cookie_name: "veld-changelist".to_string(),
            limit: 100,
            owner: String::new(),
        }
    }
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Enable syntax highlighting
    pub syntax_highlighting: bool,

    /// Minimum brightness for syntax colors (0-255)
    pub min_brightness: u8,

    /// Syntax highlighting theme name
    pub theme: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            syntax_highlighting: true,
            min_brightness: 180,
            theme: "base16-eighties.dark".to_string(),
        }
    }
}

/// Diff color settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffColors {
    /// Background color for added lines
    pub add_bg: RgbColor,

    /// Background color for deleted lines
    pub del_bg: RgbColor,

    /// Background color for context lines
    pub context_bg: RgbColor,

    /// Background of the hook indicator row
    pub indicator_bg: RgbColor,

    /// Accent color used for markers and active elements
    pub accent: RgbColor,
}

impl Default for DiffColors {
    fn default() -> Self {
        Self {
            add_bg: RgbColor::new(30, 60, 30),
            del_bg: RgbColor::new(60, 30, 30),
            context_bg: RgbColor::new(22, 22, 22),
            indicator_bg: RgbColor::new(45, 45, 65),
            accent: RgbColor::new(106, 50, 159),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub diff: DiffSettings,
    pub timeouts: TimeoutSettings,
    pub dashboard: DashboardSettings,
    pub display: DisplaySettings,
    pub colors: DiffColors,
}

impl Config {
    /// Directory holding config, cookies and the log (~/.config/veld/)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("veld"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Load configuration from file, or return default if not found.
    /// A file that exists but does not parse is an error.
    pub fn load() -> Result<Self, ClientError> {
        let path = match Self::config_path() {
            Some(p) => p,
            None => return Ok(Self::default()),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.server.base_url = normalize_base_url(&config.server.base_url);
        Ok(config)
    }
}

/// Ensure the base url ends with exactly one slash so paths can be appended
pub fn normalize_base_url(base: &str) -> String {
    format!("{}/", base.trim().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.diff.context, 10);
        assert_eq!(config.diff.column_width, 80);
        assert_eq!(config.timeouts.submit(), Duration::from_secs(60));
        assert_eq!(config.timeouts.status_clear(), Duration::from_secs(3));
        assert_eq!(config.dashboard.cookie_name, "veld-dashboard");
    }

    #[test]
    fn test_parse_toml_partial() {
        let toml_str = r#"
[server]
base_url = "https://codereview.example.org"

[diff]
context = 25
"#;

        let config = Config::parse(toml_str).unwrap();
        assert_eq!(config.server.base_url, "https://codereview.example.org/");
        assert_eq!(config.diff.context, 25);
        assert_eq!(config.diff.column_width, 80); // Default
        assert_eq!(config.timeouts.submit_secs, 60);
    }

    #[test]
    fn test_parse_toml_with_timeouts() {
        let toml_str = r#"
[timeouts]
submit_secs = 5
status_clear_secs = 1
"#;

        let config = Config::parse(toml_str).unwrap();
        assert_eq!(config.timeouts.submit(), Duration::from_secs(5));
        assert_eq!(config.timeouts.status_clear(), Duration::from_secs(1));
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn test_parse_toml_with_colors() {
        let toml_str = r#"
[colors]
add_bg = { r = 0, g = 100, b = 0 }
"#;

        let config = Config::parse(toml_str).unwrap();
        assert_eq!(config.colors.add_bg.g, 100);
        assert_eq!(config.colors.del_bg.r, 60);
    }

    #[test]
    fn test_parse_invalid_toml_is_error() {
        assert!(Config::parse("[server\nbase_url = 1").is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://x.org"), "http://x.org/");
        assert_eq!(normalize_base_url("http://x.org///"), "http://x.org/");
        assert_eq!(normalize_base_url(" http://x.org/ "), "http://x.org/");
    }

    #[test]
    fn test_rgb_color_new() {
        let color = RgbColor::new(255, 128, 64);
        assert_eq!(color.r, 255);
        assert_eq!(color.g, 128);
        assert_eq!(color.b, 64);
    }
}
