//! Configuration management for kcsync core

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Keycloak admin API configuration
    pub keycloak: KeycloakConfig,
    /// Logging and metrics configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Clone)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server (e.g., https://keycloak:8443)
    pub url: String,
    pub admin_username: String,
    pub admin_password: String,
    pub admin_client_id: String,
    pub admin_client_secret: String,
    /// PEM-encoded certificate(s) used as the exclusive trust anchor.
    /// When absent the platform trust store is used.
    pub tls_ca_pem: Option<String>,
    /// Deadline applied to every admin API call
    pub request_timeout_secs: u64,
    /// Renew the admin token this many seconds before it expires
    pub token_refresh_skew_secs: i64,
}

impl std::fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("url", &self.url)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("admin_client_id", &self.admin_client_id)
            .field("admin_client_secret", &"<redacted>")
            .field("tls_ca_pem", &self.tls_ca_pem.as_ref().map(|_| "<pem>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_refresh_skew_secs", &self.token_refresh_skew_secs)
            .finish()
    }
}

impl KeycloakConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "text" or "json"
    pub log_format: String,
    pub metrics_enabled: bool,
    /// Listen address of the Prometheus exporter
    pub metrics_addr: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            metrics_enabled: false,
            metrics_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            keycloak: KeycloakConfig::from_env()?,
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
                metrics_addr: env::var("METRICS_ADDR")
                    .unwrap_or_else(|_| "0.0.0.0:9090".to_string()),
            },
        })
    }
}

impl KeycloakConfig {
    pub fn from_env() -> Result<Self> {
        let url = env::var("KEYCLOAK_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        url::Url::parse(&url).with_context(|| format!("Invalid KEYCLOAK_URL: {}", url))?;

        // An inline PEM wins over a file path
        let tls_ca_pem = match env::var("KEYCLOAK_TLS_CA_PEM") {
            Ok(pem) => Some(pem.replace("\\n", "\n")),
            Err(_) => match env::var("KEYCLOAK_TLS_CA_FILE") {
                Ok(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read KEYCLOAK_TLS_CA_FILE {}", path))?,
                ),
                Err(_) => None,
            },
        };

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            admin_username: env::var("KEYCLOAK_ADMIN").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("KEYCLOAK_ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin".to_string()),
            admin_client_id: env::var("KEYCLOAK_ADMIN_CLIENT_ID")
                .unwrap_or_else(|_| "admin-cli".to_string()),
            admin_client_secret: env::var("KEYCLOAK_ADMIN_CLIENT_SECRET")
                .unwrap_or_else(|_| String::new()),
            tls_ca_pem,
            request_timeout_secs: env::var("KEYCLOAK_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid KEYCLOAK_REQUEST_TIMEOUT_SECS")?,
            token_refresh_skew_secs: env::var("KEYCLOAK_TOKEN_REFRESH_SKEW_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}
