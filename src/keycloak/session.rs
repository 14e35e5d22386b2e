//! Authenticated transport to the Keycloak admin API
//!
//! A [`Session`] owns the HTTP client (with its TLS trust policy fixed at
//! construction), the admin credentials and the current bearer token. Every
//! request goes through [`Session::request`], which renews the token when it
//! is about to expire and re-authenticates once when the server answers 401.

use crate::config::KeycloakConfig;
use crate::error::{AppError, Result};
use crate::telemetry::metrics as kc_metrics;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const TOKEN_PATH: &str = "/realms/master/protocol/openid-connect/token";

/// Which roots the transport trusts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Platform/webpki roots
    System,
    /// Only the supplied certificates
    Pinned { certificates: usize },
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Clone)]
struct AdminToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    60
}

/// Keycloak admin session
#[derive(Clone)]
pub struct Session {
    base_url: String,
    http_client: Client,
    trust: TrustPolicy,
    refresh_skew: Duration,
    credentials: Arc<RwLock<Credentials>>,
    token: Arc<RwLock<Option<AdminToken>>>,
}

impl Session {
    /// Build the transport. A configured PEM becomes the only trust anchor.
    pub fn new(config: &KeycloakConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.request_timeout());

        let trust = match &config.tls_ca_pem {
            Some(pem) => {
                let certificates = Certificate::from_pem_bundle(pem.as_bytes()).map_err(|e| {
                    AppError::Config(format!("Invalid Keycloak CA certificate: {}", e))
                })?;
                if certificates.is_empty() {
                    return Err(AppError::Config(
                        "Keycloak CA PEM contains no certificates".to_string(),
                    ));
                }
                let count = certificates.len();
                builder = builder.tls_built_in_root_certs(false);
                for certificate in certificates {
                    builder = builder.add_root_certificate(certificate);
                }
                TrustPolicy::Pinned {
                    certificates: count,
                }
            }
            None => TrustPolicy::System,
        };

        let http_client = builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(url = %config.url, ?trust, "Keycloak session configured");

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http_client,
            trust,
            refresh_skew: Duration::seconds(config.token_refresh_skew_secs),
            credentials: Arc::new(RwLock::new(Credentials {
                username: config.admin_username.clone(),
                password: config.admin_password.clone(),
                client_id: config.admin_client_id.clone(),
                client_secret: config.admin_client_secret.clone(),
            })),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        self.trust
    }

    /// Log in with the given credentials; they become the ones used for re-authentication
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String> {
        {
            let mut credentials = self.credentials.write().await;
            credentials.username = username.to_string();
            credentials.password = password.to_string();
        }
        self.reauthenticate(None).await
    }

    /// Token for the next request, renewed when within the refresh skew of expiry
    async fn current_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(ref t) = *token {
                if t.expires_at > Utc::now() + self.refresh_skew {
                    return Ok(t.access_token.clone());
                }
            }
        }
        self.reauthenticate(None).await
    }

    /// The only writer of the token.
    ///
    /// `rejected` is the token the server just refused; when another pass has
    /// already replaced it the replacement is reused instead of logging in again.
    async fn reauthenticate(&self, rejected: Option<&str>) -> Result<String> {
        let mut token = self.token.write().await;

        if let Some(ref current) = *token {
            let replaced = rejected.is_some_and(|r| r != current.access_token);
            let still_fresh =
                rejected.is_none() && current.expires_at > Utc::now() + self.refresh_skew;
            if replaced || still_fresh {
                return Ok(current.access_token.clone());
            }
        }

        let credentials = self.credentials.read().await.clone();
        let issued = self.login(&credentials).await?;
        let access_token = issued.access_token.clone();
        *token = Some(issued);
        Ok(access_token)
    }

    async fn login(&self, credentials: &Credentials) -> Result<AdminToken> {
        let token_url = format!("{}{}", self.base_url, TOKEN_PATH);

        let mut params = vec![
            ("grant_type", "password"),
            ("client_id", credentials.client_id.as_str()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];

        // Confidential admin clients need their secret as well
        if !credentials.client_secret.is_empty() {
            params.push(("client_secret", credentials.client_secret.as_str()));
        }

        kc_metrics::record_authentication();

        let response = self
            .http_client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("Failed to get admin token: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                AppError::Transient(format!("Failed to get admin token: {} - {}", status, body))
            } else {
                AppError::Auth(format!("Failed to get admin token: {} - {}", status, body))
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to parse token response: {}", e)))?;

        info!(user = %credentials.username, "Authenticated against Keycloak");

        Ok(AdminToken {
            access_token: token_response.access_token,
            expires_at: Utc::now() + Duration::seconds(token_response.expires_in),
        })
    }

    /// Issue an authenticated admin request and classify its outcome.
    ///
    /// A 401 triggers one re-authentication and one retry; a second 401 is `Auth`.
    pub async fn request<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let payload = body.map(serde_json::to_vec).transpose()?;
        let url = format!("{}{}", self.base_url, path);

        let token = self.current_token().await?;
        let mut response = self.send(&method, &url, &token, payload.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(%method, %path, "Admin token rejected, re-authenticating");
            let token = self.reauthenticate(Some(&token)).await?;
            response = self.send(&method, &url, &token, payload.as_deref()).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(AppError::Auth(format!(
                    "{} {} rejected after re-authentication",
                    method, path
                )));
            }
        }

        classify(&method, path, response).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        token: &str,
        payload: Option<&[u8]>,
    ) -> Result<Response> {
        let mut request = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(token);
        if let Some(bytes) = payload {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.to_vec());
        }

        let started = Instant::now();
        let result = request.send().await;
        let status = result
            .as_ref()
            .map(|r| r.status().as_u16().to_string())
            .unwrap_or_else(|_| "error".to_string());
        kc_metrics::record_admin_request(method.as_str(), &status, started.elapsed());

        result.map_err(|e| {
            if e.is_timeout() {
                AppError::Transient(format!("{} {} timed out", method, url))
            } else {
                AppError::Transient(format!("{} {} failed: {}", method, url, e))
            }
        })
    }
}

async fn classify(method: &Method, path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => AppError::NotFound(format!("{} {}", method, path)),
        StatusCode::CONFLICT => AppError::Conflict(format!("{} {}: {}", method, path, body)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::Auth(format!("{} {}: {} - {}", method, path, status, body))
        }
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            AppError::Transient(format!("{} {}: {} - {}", method, path, s, body))
        }
        s => AppError::Api {
            status: s.as_u16(),
            message: format!("{} {} - {}", method, path, body),
        },
    })
}
