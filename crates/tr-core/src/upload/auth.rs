//! Credential acquisition.
//!
//! Precedence: explicit token, then environment token (both already folded
//! into `UploadConfig::access_token`), then a GitHub Actions OIDC token for a
//! configured audience. With none of these the upload is skipped.

use super::transport::TransportError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

pub const GITHUB_OIDC_URL_ENV: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";
pub const GITHUB_OIDC_TOKEN_ENV: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";

/// Source of short-lived identity tokens.
#[async_trait]
pub trait OidcTokenProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn id_token(&self, audience: &str) -> Result<String, TransportError>;
}

/// Where the bearer token for an upload came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    AccessToken(String),
    Oidc { provider: String, token: String },
}

impl Credential {
    pub fn bearer(&self) -> &str {
        match self {
            Credential::AccessToken(token) | Credential::Oidc { token, .. } => token,
        }
    }
}

/// Result of credential resolution before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPlan<'a> {
    Token(&'a str),
    Oidc { audience: &'a str },
    Skip { reason: &'static str },
}

/// Decide how to authenticate without performing any I/O.
pub fn plan_credential<'a>(
    access_token: Option<&'a str>,
    oidc_audience: Option<&'a str>,
    oidc_available: bool,
) -> CredentialPlan<'a> {
    if let Some(token) = access_token.filter(|t| !t.is_empty()) {
        return CredentialPlan::Token(token);
    }
    match (oidc_audience.filter(|a| !a.is_empty()), oidc_available) {
        (Some(audience), true) => CredentialPlan::Oidc { audience },
        (Some(_), false) => CredentialPlan::Skip {
            reason: "no access token and no OIDC provider in this environment",
        },
        (None, _) => CredentialPlan::Skip {
            reason: "no access token and no OIDC audience configured",
        },
    }
}

#[derive(Deserialize)]
struct GithubTokenResponse {
    value: String,
}

/// GitHub Actions OIDC token endpoint.
///
/// Available only inside a workflow job with `id-token: write` permission.
#[derive(Debug, Clone)]
pub struct GithubActionsOidc {
    request_url: String,
    request_token: String,
    client: reqwest::Client,
}

impl GithubActionsOidc {
    /// Build from the runner's environment, or `None` outside GitHub Actions.
    pub fn from_env(client: reqwest::Client) -> Option<Self> {
        let request_url = std::env::var(GITHUB_OIDC_URL_ENV).ok()?;
        let request_token = std::env::var(GITHUB_OIDC_TOKEN_ENV).ok()?;
        Some(Self {
            request_url,
            request_token,
            client,
        })
    }
}

#[async_trait]
impl OidcTokenProvider for GithubActionsOidc {
    fn name(&self) -> &str {
        "github-actions"
    }

    async fn id_token(&self, audience: &str) -> Result<String, TransportError> {
        debug!(audience, "Requesting GitHub Actions OIDC token");
        let response = self
            .client
            .get(&self.request_url)
            .query(&[("audience", audience)])
            .bearer_auth(&self.request_token)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: self.request_url.clone(),
            });
        }

        let body: GithubTokenResponse =
            response.json().await.map_err(|e| TransportError::Decode {
                url: self.request_url.clone(),
                message: e.to_string(),
            })?;
        Ok(body.value)
    }
}
