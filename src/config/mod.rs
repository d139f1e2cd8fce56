use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Upper bounds accepted by [`AppConfig::validate`]
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;
pub const MAX_SESSION_EXPIRY_HOURS: u64 = 30 * 24;
pub const MAX_RATE_LIMIT_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub magic_link: MagicLinkConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub session_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLinkConfig {
    pub ttl_secs: u64,
    /// Public origin of the respondent app; links are `{base_url}/s/{unique_link}?token=...`
    pub base_url: String,
    pub enable_rate_limiting: bool,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Echo the raw token in the HTTP `generate` response
    pub expose_token: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Log,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    pub webhook_url: Option<String>,
    pub api_key: Option<String>,
    pub from_address: String,
    pub timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment presets first, then the optional YAML file, then individual env vars
        let base = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        let base = match env::var("SURVEY_AUTH_CONFIG") {
            Ok(path) => match Self::from_yaml_file(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Ignoring config file: {}", e);
                    base
                }
            },
            Err(_) => base,
        };

        base.with_env_overrides()
    }

    /// Load a full configuration document from YAML
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("SURVEY_AUTH_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET").or_else(|_| env::var("JWT_SECRET")) {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_ISSUER") {
            self.security.jwt_issuer = v;
        }
        if let Ok(v) = env::var("SECURITY_SESSION_EXPIRY_HOURS") {
            self.security.session_expiry_hours = v.parse().unwrap_or(self.security.session_expiry_hours);
        }

        // Magic link overrides
        if let Ok(v) = env::var("MAGIC_LINK_TTL_SECS") {
            self.magic_link.ttl_secs = v.parse().unwrap_or(self.magic_link.ttl_secs);
        }
        if let Ok(v) = env::var("MAGIC_LINK_BASE_URL") {
            self.magic_link.base_url = v;
        }
        if let Ok(v) = env::var("MAGIC_LINK_ENABLE_RATE_LIMITING") {
            self.magic_link.enable_rate_limiting = v.parse().unwrap_or(self.magic_link.enable_rate_limiting);
        }
        if let Ok(v) = env::var("MAGIC_LINK_RATE_LIMIT_MAX_REQUESTS") {
            self.magic_link.rate_limit_max_requests = v.parse().unwrap_or(self.magic_link.rate_limit_max_requests);
        }
        if let Ok(v) = env::var("MAGIC_LINK_RATE_LIMIT_WINDOW_SECS") {
            self.magic_link.rate_limit_window_secs = v.parse().unwrap_or(self.magic_link.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("MAGIC_LINK_EXPOSE_TOKEN") {
            self.magic_link.expose_token = v.parse().unwrap_or(self.magic_link.expose_token);
        }

        // Email overrides
        if let Ok(v) = env::var("EMAIL_PROVIDER") {
            match v.as_str() {
                "log" => self.email.provider = EmailProvider::Log,
                "webhook" => self.email.provider = EmailProvider::Webhook,
                other => tracing::warn!("Unknown EMAIL_PROVIDER '{}', keeping {:?}", other, self.email.provider),
            }
        }
        if let Ok(v) = env::var("EMAIL_WEBHOOK_URL") {
            self.email.webhook_url = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_API_KEY") {
            self.email.api_key = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_FROM_ADDRESS") {
            self.email.from_address = v;
        }

        self
    }

    /// Reject configurations the service must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development && self.security.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("SECURITY_JWT_SECRET must be set outside development".into()));
        }
        if self.magic_link.ttl_secs == 0 || self.magic_link.ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "magic_link.ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.security.session_expiry_hours == 0 || self.security.session_expiry_hours > MAX_SESSION_EXPIRY_HOURS {
            return Err(ConfigError::Invalid(format!(
                "security.session_expiry_hours must be between 1 and {}",
                MAX_SESSION_EXPIRY_HOURS
            )));
        }
        if self.magic_link.rate_limit_window_secs > MAX_RATE_LIMIT_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!(
                "magic_link.rate_limit_window_secs must be at most {}",
                MAX_RATE_LIMIT_WINDOW_SECS
            )));
        }
        if self.email.provider == EmailProvider::Webhook && self.email.webhook_url.is_none() {
            return Err(ConfigError::Invalid("EMAIL_WEBHOOK_URL is required for the webhook provider".into()));
        }
        url::Url::parse(&self.magic_link.base_url)
            .map_err(|e| ConfigError::Invalid(format!("magic_link.base_url: {}", e)))?;
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-only-secret".to_string(),
                jwt_issuer: "survey-auth-api".to_string(),
                session_expiry_hours: 24,
            },
            magic_link: MagicLinkConfig {
                ttl_secs: 24 * 60 * 60,
                base_url: "http://localhost:5173".to_string(),
                enable_rate_limiting: false,
                rate_limit_max_requests: 5,
                rate_limit_window_secs: 15 * 60,
                expose_token: true,
            },
            email: EmailConfig {
                provider: EmailProvider::Log,
                webhook_url: None,
                api_key: None,
                from_address: "no-reply@localhost".to_string(),
                timeout_secs: 10,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_issuer: "survey-auth-api".to_string(),
                session_expiry_hours: 12,
            },
            magic_link: MagicLinkConfig {
                ttl_secs: 24 * 60 * 60,
                base_url: "https://staging.example.com".to_string(),
                enable_rate_limiting: true,
                rate_limit_max_requests: 5,
                rate_limit_window_secs: 15 * 60,
                expose_token: false,
            },
            email: EmailConfig {
                provider: EmailProvider::Log,
                webhook_url: None,
                api_key: None,
                from_address: "no-reply@staging.example.com".to_string(),
                timeout_secs: 10,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_issuer: "survey-auth-api".to_string(),
                session_expiry_hours: 4,
            },
            magic_link: MagicLinkConfig {
                ttl_secs: 24 * 60 * 60,
                base_url: "https://app.example.com".to_string(),
                enable_rate_limiting: true,
                rate_limit_max_requests: 3,
                rate_limit_window_secs: 15 * 60,
                expose_token: false,
            },
            email: EmailConfig {
                provider: EmailProvider::Webhook,
                webhook_url: None,
                api_key: None,
                from_address: "no-reply@app.example.com".to_string(),
                timeout_secs: 5,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
