// src/core/config_manager.rs
//! Configuration loading: `config.yaml` per environment, then env overrides

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: String,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub upload_path: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub audience: String,
    pub issuer: Option<String>,
    pub student_email_domains: Vec<String>,
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub max_images: usize,
}

/// One environment section of `config.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct EnvironmentSection {
    server: ServerSettings,
    database: DatabaseSettings,
    auth: AuthSettings,
    llm: LlmSettings,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: Option<EnvironmentSection>,
    production: Option<EnvironmentSection>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            upload_path: PathBuf::from("data/uploads"),
            log_file: PathBuf::from("data/sublease.log"),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/sublease.db"),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            audience: "authenticated".to_string(),
            issuer: None,
            student_email_domains: vec!["psu.edu".to_string()],
            admin_emails: Vec::new(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LLM_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            timeout_seconds: 60,
            max_images: 4,
        }
    }
}

impl ConfigManager {
    /// Load configuration for the current environment
    pub fn load() -> Result<Self> {
        let environment = Self::get_environment();
        info!("Loading configuration for environment: {}", environment);

        let config_path = PathBuf::from(CONFIG_FILE);
        let section = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config.yaml")?;
            Self::section_from_yaml(&content, &environment)?
        } else {
            info!("config.yaml not found, using defaults");
            EnvironmentSection::default()
        };

        let base_dir = std::env::current_dir().context("Failed to get current directory")?;
        let mut config = Self::from_section(environment, section, &base_dir);
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Build a configuration from YAML text, without touching the process environment
    pub fn from_yaml(content: &str, environment: &str, base_dir: &Path) -> Result<Self> {
        let section = Self::section_from_yaml(content, environment)?;
        Ok(Self::from_section(environment.to_string(), section, base_dir))
    }

    fn get_environment() -> String {
        std::env::var("SUBLEASE_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .or_else(|_| std::env::var("ENV"))
            .unwrap_or_else(|_| "local".to_string())
    }

    fn section_from_yaml(content: &str, environment: &str) -> Result<EnvironmentSection> {
        let file: ConfigFile =
            serde_yaml::from_str(content).context("Failed to parse config.yaml")?;

        let section = match environment {
            "production" => file.production,
            _ => file.local,
        };
        Ok(section.unwrap_or_default())
    }

    fn from_section(environment: String, section: EnvironmentSection, base_dir: &Path) -> Self {
        let mut server = section.server;
        server.upload_path = resolve_path(base_dir, &server.upload_path);
        server.log_file = resolve_path(base_dir, &server.log_file);

        let mut database = section.database;
        database.path = resolve_path(base_dir, &database.path);

        Self {
            environment,
            server,
            database,
            auth: section.auth,
            llm: section.llm,
        }
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SUBLEASE_PORT").or_else(|| lookup("ROCKET_PORT")) {
            self.server.port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid port number: {}", port))?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("LOG_FILE") {
            self.server.log_file = PathBuf::from(path);
        }
        if let Some(secret) = lookup("AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(audience) = lookup("AUTH_JWT_AUDIENCE") {
            self.auth.audience = audience;
        }
        if let Some(issuer) = lookup("AUTH_JWT_ISSUER") {
            self.auth.issuer = Some(issuer);
        }
        if let Some(emails) = lookup("ADMIN_EMAILS") {
            self.auth.admin_emails = emails
                .split(',')
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(url) = lookup("LLM_API_URL") {
            self.llm.api_url = url;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        Ok(())
    }

    /// Refuse to serve without a token secret
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            anyhow::bail!("auth.jwt_secret is empty. Set it in config.yaml or AUTH_JWT_SECRET");
        }
        if self.llm.api_key.is_none() {
            info!("No LLM API key configured, Facebook extraction runs on heuristics only");
        }
        Ok(())
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        use crate::core::FsOps;

        FsOps::ensure_dir_exists(&self.server.upload_path).await?;

        if let Some(db_parent) = self.database.path.parent() {
            FsOps::ensure_dir_exists(db_parent).await?;
        }
        if let Some(log_parent) = self.server.log_file.parent() {
            FsOps::ensure_dir_exists(log_parent).await?;
        }

        Ok(())
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
local:
  server:
    port: 9001
    upload_path: uploads
  database:
    path: db/local.db
  auth:
    jwt_secret: local-secret
production:
  server:
    port: 80
  database:
    path: /var/lib/sublease/prod.db
  auth:
    jwt_secret: prod-secret
    admin_emails: ["ops@psu.edu"]
  llm:
    model: gpt-4o
"#;

    #[test]
    fn test_local_section_resolves_relative_paths() {
        let config = ConfigManager::from_yaml(SAMPLE, "local", Path::new("/srv/app")).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.upload_path, PathBuf::from("/srv/app/uploads"));
        assert_eq!(config.database.path, PathBuf::from("/srv/app/db/local.db"));
        assert_eq!(config.auth.audience, "authenticated");
        assert_eq!(config.auth.student_email_domains, vec!["psu.edu".to_string()]);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
    }

    #[test]
    fn test_production_section_keeps_absolute_paths() {
        let config =
            ConfigManager::from_yaml(SAMPLE, "production", Path::new("/srv/app")).unwrap();
        assert_eq!(config.server.port, 80);
        assert_eq!(config.database.path, PathBuf::from("/var/lib/sublease/prod.db"));
        assert_eq!(config.auth.admin_emails, vec!["ops@psu.edu".to_string()]);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigManager::from_yaml(SAMPLE, "local", Path::new("/srv")).unwrap();
        let vars: HashMap<&str, &str> = [
            ("ROCKET_PORT", "8123"),
            ("ADMIN_EMAILS", "A@psu.edu, b@psu.edu,"),
            ("LLM_API_KEY", "sk-test"),
            ("AUTH_JWT_ISSUER", "https://auth.example.com"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(
            config.auth.admin_emails,
            vec!["a@psu.edu".to_string(), "b@psu.edu".to_string()]
        );
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.auth.issuer.as_deref(), Some("https://auth.example.com"));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = ConfigManager::from_yaml(SAMPLE, "local", Path::new("/srv")).unwrap();
        let result = config.apply_env_overrides(|k| {
            (k == "SUBLEASE_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_secret() {
        let config = ConfigManager::from_yaml("local: {}", "local", Path::new("/srv")).unwrap();
        assert!(config.validate().is_err());
    }
}
