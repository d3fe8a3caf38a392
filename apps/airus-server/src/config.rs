//! Server configuration
//!
//! Every setting can come from the command line or the environment (a `.env`
//! file is loaded first by `main`). The configuration is built once at
//! startup, validated, and then shared read-only behind an `Arc`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

pub const DEFAULT_FONT_URL: &str =
    "https://raw.githubusercontent.com/google/fonts/main/ofl/notosans/NotoSans-Regular.ttf";

/// Legacy name of the API key variable, read when `GEMINI_API_KEY` is unset
const LEGACY_API_KEY_ENV: &str = "API_KEY";

#[derive(Parser, Debug, Clone)]
#[command(name = "airus-server")]
#[command(about = "AiRus backend: study assistant and document conversion API")]
pub struct ServerConfig {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Gemini API key (falls back to API_KEY)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Generative model used for chat, slides and analysis
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-flash")]
    pub model: String,

    /// Base URL of the Generative Language API
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub ai_base_url: String,

    /// Timeout for a single completion request, in seconds
    #[arg(long, env = "AI_TIMEOUT_SECS", default_value = "60")]
    pub ai_timeout_secs: u64,

    /// TrueType font used for Word to PDF; empty selects built-in Helvetica
    #[arg(long, env = "FONT_URL", default_value = DEFAULT_FONT_URL)]
    pub font_url: String,

    /// Directory for transient uploads (default: <tmp>/airus-uploads)
    #[arg(long, env = "UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Maximum request body size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "52428800")]
    pub max_upload_bytes: usize,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "RATE_LIMIT", default_value = "10")]
    pub rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY (or API_KEY) is not set. Add it to the environment or a .env file.")]
    MissingApiKey,

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ServerConfig {
    /// Parse the command line and environment.
    pub fn load() -> Self {
        Self::parse().with_legacy_env()
    }

    fn with_legacy_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var(LEGACY_API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingApiKey),
        }

        if !(self.ai_base_url.starts_with("http://") || self.ai_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "ai_base_url",
                reason: format!("'{}' is not an http(s) URL", self.ai_base_url),
            });
        }
        if self.ai_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "ai_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                name: "max_upload_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "rate_limit",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    /// Font asset to fetch, `None` when the built-in font is selected.
    pub fn font_url(&self) -> Option<&str> {
        let url = self.font_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("airus-uploads"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["airus-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--api-key", "test-key", "--port", "8000"]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.ai_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        let config = parse(&["--api-key", "  "]);
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let config = parse(&["--api-key", "k", "--rate-limit", "0"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "rate_limit", .. })
        ));
    }

    #[test]
    fn test_non_http_base_url_is_rejected() {
        let config = parse(&["--api-key", "k", "--ai-base-url", "ftp://example.com"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "ai_base_url", .. })
        ));
    }

    #[test]
    fn test_empty_font_url_selects_builtin_font() {
        let config = parse(&["--api-key", "k", "--font-url", ""]);
        assert_eq!(config.font_url(), None);

        let config = parse(&["--api-key", "k", "--font-url", "http://fonts.local/a.ttf"]);
        assert_eq!(config.font_url(), Some("http://fonts.local/a.ttf"));
    }

    #[test]
    fn test_upload_dir_override() {
        let config = parse(&["--api-key", "k", "--upload-dir", "/srv/uploads"]);
        assert_eq!(config.upload_dir(), PathBuf::from("/srv/uploads"));
    }
}
