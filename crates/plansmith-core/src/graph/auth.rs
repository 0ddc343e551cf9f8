//! Bearer-token acquisition for Graph requests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::classify::{classify_response, classify_transport};
use super::config::GraphConfig;
use crate::error::{ErrorKind, GatewayError, RemoteFault};

/// Tokens are refreshed this long before the server-reported expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Source of bearer tokens for the Graph gateway.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, GatewayError>;
}

/// A fixed token. Useful for tests and for tokens minted elsewhere.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, GatewayError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// OAuth2 client-credentials grant against the Microsoft identity platform.
///
/// The token is cached and shared by every request made through the same
/// provider; concurrent callers wait on one refresh.
pub struct ClientCredentials {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl ClientCredentials {
    pub fn new(http: reqwest::Client, config: &GraphConfig) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: GraphConfig::DEFAULT_SCOPE.to_string(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, GatewayError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Remote(classify_transport(&e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Remote(classify_transport(&e)))?;

        if !status.is_success() {
            let mut fault = classify_response(status, &headers, &body);
            // The identity platform answers bad credentials with 400/401.
            if status.is_client_error() && fault.kind != ErrorKind::RateLimited {
                fault.kind = ErrorKind::Unauthorized;
            }
            return Err(GatewayError::Remote(fault));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Remote(RemoteFault::new(
                ErrorKind::Fatal,
                format!("malformed token response: {e}"),
            ))
        })?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        debug!(expires_in = lifetime.as_secs(), "acquired Graph access token");
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_SKEW),
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
