//! Configuration management for Doru

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub front: FrontConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

fn default_db_path() -> String {
    "doru.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Where the web front end lives; confirmation links point there
#[derive(Debug, Clone, Deserialize)]
pub struct FrontConfig {
    #[serde(default = "default_front_url")]
    pub base_url: String,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self { base_url: default_front_url() }
    }
}

fn default_front_url() -> String {
    "http://localhost:3000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_images_dir")]
    pub dir: String,
    #[serde(default = "default_images_url")]
    pub base_url: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: default_images_dir(),
            base_url: default_images_url(),
        }
    }
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_images_url() -> String {
    "http://localhost:8080/images".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_backend")]
    pub backend: String,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_mail_from")]
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: default_mail_backend(),
            relay_url: None,
            api_key: None,
            from: default_mail_from(),
        }
    }
}

fn default_mail_backend() -> String {
    "log".to_string()
}

fn default_mail_from() -> String {
    "no-reply@doru.local".to_string()
}

impl Config {
    /// Load configuration from doru.toml
    pub fn load() -> Result<Self> {
        Self::load_from("doru.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;

            let mut config = Self::parse(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?;

            config.expand_env_vars();
            return Ok(config);
        }

        // Fall back to environment variables only
        Self::from_env()
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration entirely from environment variables
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("SERVER_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("SERVER_PORT is not a valid port: {}", raw))?,
            Err(_) => default_port(),
        };

        Ok(Config {
            database: DatabaseConfig {
                path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| default_db_path()),
            },
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| default_host()),
                port,
            },
            front: FrontConfig {
                base_url: std::env::var("FRONT_BASE_URL").unwrap_or_else(|_| default_front_url()),
            },
            images: ImagesConfig {
                dir: std::env::var("IMAGES_DIR").unwrap_or_else(|_| default_images_dir()),
                base_url: std::env::var("IMAGES_BASE_URL").unwrap_or_else(|_| default_images_url()),
            },
            mail: MailConfig {
                backend: std::env::var("MAIL_BACKEND").unwrap_or_else(|_| default_mail_backend()),
                relay_url: std::env::var("MAIL_RELAY_URL").ok(),
                api_key: std::env::var("MAIL_API_KEY").ok(),
                from: std::env::var("MAIL_FROM").unwrap_or_else(|_| default_mail_from()),
            },
        })
    }

    /// Expand ${VAR} patterns in secret fields
    fn expand_env_vars(&mut self) {
        if let Some(ref mut key) = self.mail.api_key {
            *key = expand_env(key);
        }
        if let Some(ref mut url) = self.mail.relay_url {
            *url = expand_env(url);
        }
    }
}

/// Expand ${VAR} patterns in a string
fn expand_env(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let replacement = std::env::var(var_name).unwrap_or_default();
            result = format!("{}{}{}", &result[..start], replacement, &result[start + end + 1..]);
        } else {
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_env() {
        std::env::set_var("DORU_TEST_VAR", "hello");
        assert_eq!(expand_env("${DORU_TEST_VAR}"), "hello");
        assert_eq!(expand_env("prefix_${DORU_TEST_VAR}_suffix"), "prefix_hello_suffix");
        assert_eq!(expand_env("no_vars"), "no_vars");
        std::env::remove_var("DORU_TEST_VAR");
    }

    #[test]
    fn test_parse_applies_defaults() {
        let config = Config::parse("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.path, "doru.db");
        assert_eq!(config.mail.backend, "log");
        assert_eq!(config.images.dir, "images");
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::parse(
            r#"
            [database]
            path = "/var/lib/doru/doru.db"

            [front]
            base_url = "https://doru.tj"

            [images]
            dir = "/srv/images"
            base_url = "https://img.doru.tj"

            [mail]
            backend = "http"
            relay_url = "https://mail.internal/send"
            api_key = "secret"
            from = "hello@doru.tj"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/var/lib/doru/doru.db");
        assert_eq!(config.front.base_url, "https://doru.tj");
        assert_eq!(config.images.base_url, "https://img.doru.tj");
        assert_eq!(config.mail.backend, "http");
        assert_eq!(config.mail.relay_url.as_deref(), Some("https://mail.internal/send"));
        assert_eq!(config.mail.from, "hello@doru.tj");
    }
}
