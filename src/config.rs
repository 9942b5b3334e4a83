use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to call the chat endpoint from a browser.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Inline key; mostly for tests. The env var wins when both are set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeminiConfig {
    /// Resolve the API key. `None` is not an error here; the client reports
    /// it when a request actually needs the key.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .or_else(|| self.api_key.clone())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    /// Instruction prepended to every forwarded conversation.
    #[serde(default = "default_instruction")]
    pub instruction: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            instruction: default_instruction(),
        }
    }
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "https://mysolvingerai.vercel.app".into(),
    ]
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_instruction() -> String {
    "Respond in a concise and brief manner, the way a person would answer in a conversation. \
     Keep answers to a few sentences unless asked for more detail."
        .into()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) -> Result<()> {
        let port = std::env::var("PORT").ok();
        self.apply_port_override(port.as_deref())
    }

    /// Replace the configured port with `PORT`, when set.
    pub fn apply_port_override(&mut self, port: Option<&str>) -> Result<()> {
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("PORT={port:?} is not a valid port: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.gemini.model.trim().is_empty() {
            return Err(Error::config("gemini.model must not be empty"));
        }
        if self.gemini.timeout_secs == 0 {
            return Err(Error::config("gemini.timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8080
allowed_origins = ["https://example.com"]

[gemini]
model = "gemini-1.5-flash-latest"
base_url = "http://localhost:9999/v1beta"
api_key_env = "SOLVINGER_TEST_KEY_UNSET"
timeout_secs = 5

[relay]
instruction = "Be short."
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.allowed_origins, vec!["https://example.com"]);
        assert_eq!(config.gemini.model, "gemini-1.5-flash-latest");
        assert_eq!(config.gemini.timeout(), Duration::from_secs(5));
        assert_eq!(config.relay.instruction, "Be short.");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.allowed_origins.len(), 2);
        assert!(
            config
                .server
                .allowed_origins
                .contains(&"http://localhost:3000".to_string())
        );
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.gemini.timeout_secs, 30);
        assert!(!config.relay.instruction.is_empty());
    }

    #[test]
    fn inline_key_used_when_env_unset() {
        let gemini = GeminiConfig {
            api_key_env: "SOLVINGER_TEST_KEY_NEVER_SET".into(),
            api_key: Some(" inline-key ".into()),
            ..GeminiConfig::default()
        };
        assert_eq!(gemini.resolve_api_key().as_deref(), Some("inline-key"));
    }

    #[test]
    fn missing_key_is_none() {
        let gemini = GeminiConfig {
            api_key_env: "SOLVINGER_TEST_KEY_NEVER_SET".into(),
            api_key: Some("".into()),
            ..GeminiConfig::default()
        };
        assert!(gemini.resolve_api_key().is_none());
    }

    #[test]
    fn port_env_overrides_file_value() {
        let mut config: Config = toml::from_str("[server]\nport = 8080\n").unwrap();
        config.apply_port_override(Some(" 9090 ")).unwrap();
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn unset_port_keeps_file_value() {
        let mut config: Config = toml::from_str("[server]\nport = 8080\n").unwrap();
        config.apply_port_override(None).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn bad_port_is_config_error() {
        let mut config = Config::default();
        for bad in ["http", "", "70000", "-1"] {
            let err = config.apply_port_override(Some(bad)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "PORT={bad:?}");
            assert!(err.to_string().contains("not a valid port"));
        }
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.gemini.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/solvinger.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
