//! Logout request and response types.

use serde::{Deserialize, Serialize};

use super::blacklist::BlacklistStats;
use crate::error::{AccessError, Result};
use crate::rbac::models::UserId;

/// Logout request as it arrives on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_auth_type")]
    pub auth_type: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    /// Client address recorded in the audit trail
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_auth_type() -> String {
    "jwt".to_string()
}

impl LogoutRequest {
    pub fn jwt(user_id: impl Into<UserId>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            auth_type: default_auth_type(),
            ..Default::default()
        }
    }

    pub fn oidc(user_id: impl Into<UserId>, provider: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            auth_type: "oidc".to_string(),
            provider: Some(provider.into()),
            ..Default::default()
        }
    }

    pub fn id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    pub fn redirect_to(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    /// Resolve the wire `auth_type` into a typed method. Matching is exact.
    pub fn method(&self) -> Result<LogoutMethod> {
        match self.auth_type.as_str() {
            "jwt" => {
                if self.token.is_empty() {
                    return Err(AccessError::validation("token is required for jwt logout"));
                }
                Ok(LogoutMethod::Jwt {
                    token: self.token.clone(),
                })
            }
            "oidc" => {
                let provider = self
                    .provider
                    .clone()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| AccessError::validation("provider is required for oidc logout"))?;
                Ok(LogoutMethod::Oidc {
                    provider,
                    id_token: self.id_token.clone(),
                    post_logout_redirect_uri: self.post_logout_redirect_uri.clone(),
                })
            }
            other => Err(AccessError::unsupported_auth_type(other)),
        }
    }
}

/// How a session is terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutMethod {
    Jwt {
        token: String,
    },
    Oidc {
        provider: String,
        id_token: Option<String>,
        post_logout_redirect_uri: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uri: Option<String>,
}

/// Result of a batch logout where every token succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLogoutSummary {
    pub total: usize,
    pub blacklisted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutStats {
    pub blacklist: BlacklistStats,
    pub token_max_lifetime_secs: u64,
}
