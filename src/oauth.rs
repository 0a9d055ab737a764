//! Authorization-code flow against Google's identity provider.

use crate::session::AccessToken;
use crate::{Error, OAuthConfig, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Scopes requested during sign-in: basic identity plus read access to calendars.
pub const SCOPES: &str = "openid email profile https://www.googleapis.com/auth/calendar.readonly";

/// Tokens granted in exchange for an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    /// Only issued with `access_type=offline`; not used by this service.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// OAuth client for the Google identity provider.
#[derive(Debug)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: Url,
    token_url: Url,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a new OAuth client. `redirect_uri` must match the one registered with the
    /// provider.
    pub fn new(config: &OAuthConfig, redirect_uri: impl Into<String>) -> Result<OAuthClient> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(OAuthClient {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: redirect_uri.into(),
            auth_url: Url::parse(&config.auth_url)?,
            token_url: Url::parse(&config.token_url)?,
            http_client,
        })
    }

    /// Builds the URL of the provider's consent page.
    pub fn build_authorization_url(&self) -> Url {
        let mut url = self.auth_url.clone();

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        url
    }

    /// Exchanges an authorization code for tokens. Fails with [`Error::TokenExchange`] if the
    /// request fails, the response can't be parsed or carries no access token.
    pub async fn exchange_code_for_token(&self, code: &str) -> Result<TokenGrant> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http_client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|err| Error::TokenExchange(format!("request failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| Error::TokenExchange(format!("failed to read response: {err}")))?;

        if !status.is_success() {
            return Err(Error::TokenExchange(format!(
                "provider responded with {status}: {body}"
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|err| Error::TokenExchange(format!("invalid token response: {err}")))?;

        let access_token = token_response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::TokenExchange("response contains no access token".into()))?;

        log::info!("exchanged authorization code for access token");

        Ok(TokenGrant {
            access_token: AccessToken::new(access_token),
            refresh_token: token_response.refresh_token,
        })
    }
}
