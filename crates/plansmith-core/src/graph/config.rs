use std::fmt;
use std::time::Duration;

/// Connection settings for Microsoft Graph.
///
/// Credentials are app-only (client credentials grant). The secret is
/// redacted from `Debug` output.
#[derive(Clone)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Graph API root, without a trailing slash.
    pub base_url: String,
    /// Identity platform root used to mint tokens.
    pub authority_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl GraphConfig {
    pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
    pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
    pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Build a config for the public cloud.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            authority_url: Self::DEFAULT_AUTHORITY_URL.to_string(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_authority_url(mut self, authority_url: impl Into<String>) -> Self {
        self.authority_url = authority_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// OAuth2 token endpoint for this tenant.
    pub fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_url, self.tenant_id)
    }
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("authority_url", &self.authority_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_url_includes_tenant() {
        let cfg = GraphConfig::new("contoso", "app", "s3cret");
        assert_eq!(
            cfg.token_url(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
    }

    #[test]
    fn overrides_strip_trailing_slash() {
        let cfg = GraphConfig::new("t", "c", "s")
            .with_base_url("http://127.0.0.1:9999/v1.0/")
            .with_authority_url("http://127.0.0.1:9999/");
        assert_eq!(cfg.base_url, "http://127.0.0.1:9999/v1.0");
        assert_eq!(cfg.token_url(), "http://127.0.0.1:9999/t/oauth2/v2.0/token");
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = GraphConfig::new("t", "c", "hunter2");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
