//! Server configuration from the environment.
//!
//! Every value has a default in `counsel_core::defaults` except the token
//! secret, which must be set (`JWT_SECRET`, or the legacy `SECRET_KEY`).

use std::time::Duration;

use counsel_core::{defaults, Error, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    /// Public site address used in password-reset links.
    pub base_url: String,
    pub allowed_origins: String,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u64,
    pub rate_limit_period: Duration,
    pub max_body_bytes: usize,
    pub redis_enabled: bool,
    pub redis_url: String,
    pub mail: MailConfig,
    pub session_sweep_interval: Duration,
}

/// Outbound mail relay. With no relay URL, mail is logged instead of sent.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub relay_key: Option<String>,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            relay_key: None,
            from: defaults::MAIL_FROM.to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults suitable for tests and local runs, with the given secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            database_url: "postgres://localhost/counsel".to_string(),
            jwt_secret: jwt_secret.into(),
            base_url: defaults::BASE_URL.to_string(),
            allowed_origins: String::new(),
            rate_limit_enabled: true,
            rate_limit_requests: defaults::RATE_LIMIT_REQUESTS,
            rate_limit_period: Duration::from_secs(defaults::RATE_LIMIT_PERIOD_SECS),
            max_body_bytes: defaults::MAX_BODY_BYTES,
            redis_enabled: true,
            redis_url: "redis://localhost:6379".to_string(),
            mail: MailConfig::default(),
            session_sweep_interval: Duration::from_secs(defaults::SESSION_SWEEP_SECS),
        }
    }

    pub fn from_env() -> Result<Self> {
        let jwt_secret = env_opt("JWT_SECRET")
            .or_else(|| env_opt("SECRET_KEY"))
            .ok_or_else(|| Error::Config("JWT_SECRET must be set".to_string()))?;

        let mut config = Self::with_secret(jwt_secret);
        if let Some(host) = env_opt("HOST") {
            config.host = host;
        }
        config.port = env_parse("PORT", config.port);
        config.database_url = env_opt("DATABASE_URL")
            .ok_or_else(|| Error::Config("DATABASE_URL must be set".to_string()))?;
        if let Some(base_url) = env_opt("BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.allowed_origins = env_opt("ALLOWED_ORIGINS").unwrap_or_default();
        config.rate_limit_enabled = env_flag("RATE_LIMIT_ENABLED", true);
        config.rate_limit_requests = env_parse("RATE_LIMIT_REQUESTS", config.rate_limit_requests);
        config.rate_limit_period = Duration::from_secs(env_parse(
            "RATE_LIMIT_PERIOD_SECS",
            defaults::RATE_LIMIT_PERIOD_SECS,
        ));
        config.max_body_bytes = env_parse("MAX_BODY_BYTES", config.max_body_bytes);
        config.redis_enabled = env_flag("REDIS_ENABLED", true);
        if let Some(url) = env_opt("REDIS_URL") {
            config.redis_url = url;
        }
        config.mail = MailConfig {
            relay_url: env_opt("MAIL_RELAY_URL"),
            relay_key: env_opt("MAIL_RELAY_KEY"),
            from: env_opt("MAIL_FROM").unwrap_or_else(|| defaults::MAIL_FROM.to_string()),
        };
        config.session_sweep_interval = Duration::from_secs(
            env_parse("SESSION_SWEEP_SECS", defaults::SESSION_SWEEP_SECS).max(1),
        );
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}
