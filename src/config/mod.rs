//! Configuration management.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config`, `./sheets-mcp.toml`, or
//!    `<config dir>/sheets-mcp/config.toml`)
//! 3. Prefixed environment variables, e.g. `SHEETS_MCP_GOOGLE__FOLDER_ID`
//! 4. The plain deployment variables `PORT`, `HOST`, `DRIVE_FOLDER_ID`,
//!    `GOOGLE_CLOUD_PROJECT`, `SERVICE_ACCOUNT_EMAIL` and
//!    `GOOGLE_OAUTH_ACCESS_TOKEN`
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! sse_keep_alive_secs = 15
//!
//! [google]
//! service_account = "sheets-bot@my-project.iam.gserviceaccount.com"
//! project_id = "my-project"
//! folder_id = "1AbCdEfGh"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default interval between SSE keep-alive comments
pub const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Prefix for structured environment overrides
pub const ENV_PREFIX: &str = "SHEETS_MCP";

/// Plain environment variables recognised at startup, with their config keys
pub const ENV_VARS: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("HOST", "server.host"),
    ("SERVICE_ACCOUNT_EMAIL", "google.service_account"),
    ("GOOGLE_CLOUD_PROJECT", "google.project_id"),
    ("DRIVE_FOLDER_ID", "google.folder_id"),
    ("GOOGLE_OAUTH_ACCESS_TOKEN", "google.access_token"),
];

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Google identity, target folder and API endpoints
    #[serde(default)]
    pub google: GoogleConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between SSE keep-alive comments
    #[serde(default = "default_sse_keep_alive_secs")]
    pub sse_keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            sse_keep_alive_secs: default_sse_keep_alive_secs(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_sse_keep_alive_secs() -> u64 {
    DEFAULT_SSE_KEEP_ALIVE_SECS
}

/// Google settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Service account to impersonate when minting tokens
    #[serde(default)]
    pub service_account: Option<String>,

    /// Cloud project identifier
    #[serde(default)]
    pub project_id: Option<String>,

    /// Drive folder used to scope listing and to file new spreadsheets
    #[serde(default)]
    pub folder_id: Option<String>,

    /// Pre-minted OAuth access token (local development)
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,

    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,

    #[serde(default = "default_metadata_base_url")]
    pub metadata_base_url: String,

    #[serde(default = "default_iam_base_url")]
    pub iam_base_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            service_account: None,
            project_id: None,
            folder_id: None,
            access_token: None,
            drive_base_url: default_drive_base_url(),
            sheets_base_url: default_sheets_base_url(),
            metadata_base_url: default_metadata_base_url(),
            iam_base_url: default_iam_base_url(),
        }
    }
}

fn default_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_metadata_base_url() -> String {
    "http://metadata.google.internal".to_string()
}

fn default_iam_base_url() -> String {
    "https://iamcredentials.googleapis.com".to_string()
}

impl GoogleConfig {
    /// The configured folder id, ignoring blank values
    pub fn folder_id(&self) -> Option<&str> {
        self.folder_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

impl Config {
    /// Human-readable warnings for settings that are missing.
    ///
    /// None of these abort startup; `list_spreadsheets` is the only operation
    /// that refuses to run without the folder id.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.google.service_account.is_none() && self.google.access_token.is_none() {
            warnings.push(
                "SERVICE_ACCOUNT_EMAIL is not set; tokens will be minted for the ambient identity"
                    .to_string(),
            );
        }
        if self.google.project_id.is_none() {
            warnings.push("GOOGLE_CLOUD_PROJECT is not set".to_string());
        }
        if self.google.folder_id().is_none() {
            warnings.push(
                "DRIVE_FOLDER_ID is not set; list_spreadsheets will fail and new spreadsheets stay in the root folder"
                    .to_string(),
            );
        }
        warnings
    }

    /// Copy of the configuration with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.google.access_token.is_some() {
            config.google.access_token = Some("********".to_string());
        }
        config
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Load configuration from defaults, an optional file and the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__"),
    );

    for (var, key) in ENV_VARS {
        let value = std::env::var(var).ok().filter(|v| !v.is_empty());
        builder = builder.set_override_option(*key, value)?;
    }

    builder.build()?.try_deserialize()
}

/// Look for a configuration file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("sheets-mcp.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("sheets-mcp").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert!(config.google.folder_id().is_none());
        assert_eq!(
            config.google.sheets_base_url,
            "https://sheets.googleapis.com/v4"
        );
    }

    #[test]
    fn test_warnings_for_missing_settings() {
        let config = Config::default();
        assert_eq!(config.warnings().len(), 3);

        let mut config = Config::default();
        config.google.service_account = Some("bot@example.iam.gserviceaccount.com".into());
        config.google.project_id = Some("demo".into());
        config.google.folder_id = Some("folder-1".into());
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_blank_folder_id_is_missing() {
        let mut config = Config::default();
        config.google.folder_id = Some("   ".into());
        assert!(config.google.folder_id().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"
[server]
port = 9191

[google]
project_id = "file-project"
drive_base_url = "http://127.0.0.1:1/drive"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.google.drive_base_url, "http://127.0.0.1:1/drive");
        assert_eq!(
            config.google.sheets_base_url,
            "https://sheets.googleapis.com/v4"
        );
        if std::env::var("PORT").is_err() {
            assert_eq!(config.server.port, 9191);
        }
        if std::env::var("GOOGLE_CLOUD_PROJECT").is_err() {
            assert_eq!(config.google.project_id.as_deref(), Some("file-project"));
        }
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load_config(Some(Path::new("/nonexistent/sheets-mcp.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_redacted_masks_token() {
        let mut config = Config::default();
        config.google.access_token = Some("ya29.secret".into());
        let shown = config.redacted().to_toml().unwrap();
        assert!(!shown.contains("ya29.secret"));
        assert!(shown.contains("port = 8080"));
    }
}
