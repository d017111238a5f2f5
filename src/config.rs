use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub authless: bool,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

/// Outbound email configuration.
///
/// When `enabled` is false, notifications are logged instead of sent so the
/// send endpoint stays usable in development.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default = "default_mail_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
}

fn default_port() -> u16 {
    8080
}

fn default_api_key_env() -> String {
    "CHURNGUARD_API_KEY".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_mail_api_key_env() -> String {
    "MAIL_API_KEY".to_string()
}

fn default_from_email() -> String {
    "support@churnguard.local".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in CHURNGUARD_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("CHURNGUARD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.database.db_path.as_os_str().is_empty() {
            anyhow::bail!("database.db_path must not be empty");
        }

        // The API key env var only has to exist when auth is enforced
        if !self.server.authless {
            std::env::var(&self.server.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or enable server.authless for local development.",
                    self.server.api_key_env
                )
            })?;
        }

        if self.email.enabled {
            if self.email.api_url.is_empty() {
                anyhow::bail!("email.api_url must be set when email.enabled is true");
            }
            std::env::var(&self.email.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or disable email.enabled.",
                    self.email.api_key_env
                )
            })?;
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.database.db_path
    }

    /// Get migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.database.migrations_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn write_test_config(temp_dir: &TempDir, body: &str) -> PathBuf {
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, body).unwrap();
        config_path
    }

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("CHURNGUARD_CONFIG").ok();
        std::env::set_var("CHURNGUARD_CONFIG", config_path.to_str().unwrap());
        f();
        std::env::remove_var("CHURNGUARD_CONFIG");
        if let Some(val) = original {
            std::env::set_var("CHURNGUARD_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_test_config(
            &temp_dir,
            r#"
[server]
port = 9090
authless = true

[database]
db_path = "./churn.db"
"#,
        );

        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.server.port, 9090);
            assert!(config.server.authless);
            assert_eq!(config.db_path(), Path::new("./churn.db"));
            assert!(!config.email.enabled);
        });
    }

    #[test]
    fn test_config_missing_api_key() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_test_config(
            &temp_dir,
            r#"
[server]
api_key_env = "CHURNGUARD_TEST_MISSING_KEY"

[database]
db_path = "./churn.db"
"#,
        );

        std::env::remove_var("CHURNGUARD_TEST_MISSING_KEY");
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err(), "Expected missing API key error");
            assert!(config
                .unwrap_err()
                .to_string()
                .contains("CHURNGUARD_TEST_MISSING_KEY"));
        });
    }

    #[test]
    fn test_config_email_requires_api_url() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_test_config(
            &temp_dir,
            r#"
[server]
authless = true

[database]
db_path = "./churn.db"

[email]
enabled = true
"#,
        );

        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("email.api_url"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("CHURNGUARD_CONFIG").ok();
        std::env::set_var("CHURNGUARD_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("CHURNGUARD_CONFIG");
        if let Some(v) = original {
            std::env::set_var("CHURNGUARD_CONFIG", v);
        }
    }
}
