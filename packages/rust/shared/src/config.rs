//! Application configuration for Doc2MD.
//!
//! User config lives at `~/.doc2md/doc2md.toml`.
//! CLI flags override environment variables, which override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Doc2MdError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "doc2md.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".doc2md";

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "PORT";

/// Environment variable overriding `fetch.markdown_new_url`.
pub const MARKDOWN_NEW_URL_ENV: &str = "DOC2MD_MARKDOWN_NEW_URL";

// ---------------------------------------------------------------------------
// Config structs (matching doc2md.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// REST server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// URL fetching and fallback chain.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// MCP tool server settings.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted upload size in MiB.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8087
}
fn default_max_upload_mb() -> usize {
    50
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Default timeout for outbound requests in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fall back to markdown.new when local conversion fails.
    #[serde(default = "default_true")]
    pub use_fallback: bool,

    /// Ask markdown.new first and only convert locally if it fails.
    #[serde(default)]
    pub prefer_markdown_new: bool,

    /// Base URL of the markdown.new service.
    #[serde(default = "default_markdown_new_url")]
    pub markdown_new_url: String,

    /// Local HTML conversions at or below this many characters count as failures.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Permit fetching loopback and private-network hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            use_fallback: true,
            prefer_markdown_new: false,
            markdown_new_url: default_markdown_new_url(),
            min_content_chars: default_min_content_chars(),
            allow_private_hosts: false,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_markdown_new_url() -> String {
    "https://markdown.new".into()
}
fn default_min_content_chars() -> usize {
    100
}

/// `[mcp]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// URL conversion output longer than this is truncated.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            max_output_chars: default_max_output_chars(),
        }
    }
}

fn default_max_output_chars() -> usize {
    100_000
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup(PORT_ENV).filter(|v| !v.is_empty()) {
            self.server.port = port.parse().map_err(|_| {
                Doc2MdError::config(format!("{PORT_ENV} must be a port number, got '{port}'"))
            })?;
        }
        if let Some(url) = lookup(MARKDOWN_NEW_URL_ENV).filter(|v| !v.is_empty()) {
            self.fetch.markdown_new_url = url;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.doc2md/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Doc2MdError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.doc2md/doc2md.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Doc2MdError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| Doc2MdError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| Doc2MdError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| Doc2MdError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| Doc2MdError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("markdown_new_url"));
        assert!(toml_str.contains("8087"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.server.port, 8087);
        assert_eq!(parsed.fetch.min_content_chars, 100);
        assert_eq!(parsed.mcp.max_output_chars, 100_000);
        assert!(parsed.fetch.use_fallback);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[fetch]
prefer_markdown_new = true
timeout_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.fetch.prefer_markdown_new);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(5));
        assert_eq!(config.fetch.markdown_new_url, "https://markdown.new");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn env_overrides_port_and_fallback_url() {
        let mut config = AppConfig::default();
        config
            .apply_env_from(|key| match key {
                PORT_ENV => Some("9000".into()),
                MARKDOWN_NEW_URL_ENV => Some("http://localhost:7000".into()),
                _ => None,
            })
            .expect("apply env");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.fetch.markdown_new_url, "http://localhost:7000");
    }

    #[test]
    fn env_rejects_bad_port() {
        let mut config = AppConfig::default();
        let result = config.apply_env_from(|key| (key == PORT_ENV).then(|| "eighty".to_string()));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("PORT"));
    }

    #[test]
    fn upload_limit_in_bytes() {
        let server = ServerConfig {
            max_upload_mb: 2,
            ..ServerConfig::default()
        };
        assert_eq!(server.max_upload_bytes(), 2 * 1024 * 1024);
    }
}
