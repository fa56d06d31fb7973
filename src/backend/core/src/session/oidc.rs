//! OpenID Connect RP-initiated logout.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use crate::config::{OidcConfig, OidcProviderConfig};
use crate::error::{AccessError, ErrorCode, ErrorContext, Result};
use crate::rbac::models::UserId;

/// Identity provider operations the logout service depends on.
#[async_trait]
pub trait OidcClient: Send + Sync {
    /// Back-channel end-session call.
    async fn end_session(
        &self,
        user_id: &UserId,
        provider: &str,
        id_token: Option<&str>,
        post_logout_redirect_uri: Option<&str>,
    ) -> Result<()>;

    /// Front-channel URL the browser should visit to finish logout.
    async fn logout_url(&self, provider: &str, post_logout_redirect_uri: Option<&str>) -> Result<String>;
}

/// `reqwest`-backed client for providers listed in [`OidcConfig`].
pub struct HttpOidcClient {
    http: reqwest::Client,
    providers: HashMap<String, OidcProviderConfig>,
}

impl HttpOidcClient {
    pub fn new(config: &OidcConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context(ErrorCode::ConfigurationError, "Failed to build OIDC HTTP client")?;

        Ok(Self {
            http,
            providers: config.providers.clone(),
        })
    }

    fn provider(&self, name: &str) -> Result<&OidcProviderConfig> {
        self.providers
            .get(name)
            .ok_or_else(|| AccessError::validation(format!("unknown OIDC provider: {}", name)))
    }

    fn endpoint(provider: &OidcProviderConfig) -> Result<Url> {
        Url::parse(&provider.end_session_endpoint)
            .context(ErrorCode::InvalidConfiguration, "Invalid end-session endpoint")
    }
}

#[async_trait]
impl OidcClient for HttpOidcClient {
    #[instrument(skip(self, id_token), fields(user_id = %user_id))]
    async fn end_session(
        &self,
        user_id: &UserId,
        provider: &str,
        id_token: Option<&str>,
        post_logout_redirect_uri: Option<&str>,
    ) -> Result<()> {
        let config = self.provider(provider)?;
        let mut url = Self::endpoint(config)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(id_token) = id_token.filter(|t| !t.is_empty()) {
                query.append_pair("id_token_hint", id_token);
            }
            if let Some(redirect) = post_logout_redirect_uri.filter(|r| !r.is_empty()) {
                query.append_pair("post_logout_redirect_uri", redirect);
            }
            query.append_pair("client_id", &config.client_id);
        }

        let response = self.http.get(url).send().await?;
        let status = response.status();

        if status.is_success() || status.is_redirection() {
            debug!(%status, "End-session accepted");
            return Ok(());
        }

        warn!(%status, "End-session rejected by identity provider");
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(AccessError::unavailable(
                format!("OIDC provider {}", provider),
                format!("end-session returned {}", status),
            ))
        } else {
            Err(AccessError::with_internal(
                ErrorCode::IdentityProviderError,
                "Identity provider rejected the logout",
                format!("end-session returned {}", status),
            )
            .with_context("provider", provider))
        }
    }

    async fn logout_url(&self, provider: &str, post_logout_redirect_uri: Option<&str>) -> Result<String> {
        let config = self.provider(provider)?;
        let mut url = Self::endpoint(config)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(redirect) = post_logout_redirect_uri.filter(|r| !r.is_empty()) {
                query.append_pair("post_logout_redirect_uri", redirect);
            }
            query.append_pair("client_id", &config.client_id);
        }
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(endpoint: &str) -> HttpOidcClient {
        let mut providers = HashMap::new();
        providers.insert(
            "keycloak".to_string(),
            OidcProviderConfig {
                client_id: "portal".to_string(),
                end_session_endpoint: endpoint.to_string(),
            },
        );
        HttpOidcClient::new(&OidcConfig {
            request_timeout: Duration::from_secs(2),
            providers,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_end_session_sends_hint_and_client() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logout"))
            .and(query_param("id_token_hint", "idt"))
            .and(query_param("post_logout_redirect_uri", "https://app/bye"))
            .and(query_param("client_id", "portal"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&format!("{}/logout", server.uri()));
        c.end_session(&UserId::new("u1"), "keycloak", Some("idt"), Some("https://app/bye"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let c = client(&format!("{}/logout", server.uri()));
        let err = c
            .end_session(&UserId::new("u1"), "keycloak", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_transport_error_omits_id_token() {
        let c = client("http://127.0.0.1:1/logout");
        let id_token = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ1MSJ9.SECRETSIG";
        let err = c
            .end_session(&UserId::new("u1"), "keycloak", Some(id_token), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unavailable);
        for rendered in [err.to_string(), format!("{:?}", err), err.internal_message().unwrap_or_default().to_string()] {
            assert!(!rendered.contains("SECRETSIG"), "{}", rendered);
            assert!(!rendered.contains("id_token_hint"), "{}", rendered);
        }
    }

    #[tokio::test]
    async fn test_unknown_provider_is_validation() {
        let c = client("https://idp.example.com/logout");
        let err = c.logout_url("okta", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_logout_url_encodes_redirect() {
        let c = client("https://idp.example.com/logout");
        let url = c.logout_url("keycloak", Some("https://app/bye?x=1")).await.unwrap();
        assert_eq!(
            url,
            "https://idp.example.com/logout?post_logout_redirect_uri=https%3A%2F%2Fapp%2Fbye%3Fx%3D1&client_id=portal"
        );
    }
}
