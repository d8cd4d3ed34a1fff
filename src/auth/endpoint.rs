/// Spotify accounts service token endpoint
use super::{TokenEndpoint, TokenGrant, SPOTIFY_SCOPES};
use crate::config::SpotifyConfig;
use crate::error::{PlayerError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: Option<String>,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

pub struct SpotifyTokenEndpoint {
    client: Client,
    accounts_base_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
}

impl SpotifyTokenEndpoint {
    pub fn new(config: &SpotifyConfig) -> Self {
        Self {
            client: Client::new(),
            accounts_base_url: config.accounts_base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    /// Build the URL the user opens to grant access
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        if self.client_id.is_empty() {
            return Err(PlayerError::AuthDenied(
                "spotify.client_id is not configured".to_string(),
            ));
        }

        let mut url = url::Url::parse(&format!("{}/authorize", self.accounts_base_url))
            .map_err(|e| PlayerError::AuthDenied(format!("Invalid accounts URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &SPOTIFY_SCOPES.join(" "))
            .append_pair("state", state);
        Ok(url.into())
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<std::result::Result<TokenGrant, String>> {
        let secret = self.client_secret.as_deref().ok_or_else(|| {
            PlayerError::AuthDenied("spotify.client_secret is not configured".to_string())
        })?;

        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_base_url))
            .basic_auth(&self.client_id, Some(secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok(parse_token_response(status, &body))
    }
}

/// Interpret a token endpoint response; the error side carries a readable reason
fn parse_token_response(
    status: reqwest::StatusCode,
    body: &str,
) -> std::result::Result<TokenGrant, String> {
    if !status.is_success() {
        return Err(match serde_json::from_str::<TokenErrorResponse>(body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => format!("HTTP {}", status),
        });
    }

    let token: TokenResponse = serde_json::from_str(body)
        .map_err(|e| format!("Malformed token response: {}", e))?;
    Ok(TokenGrant {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_in_secs: token.expires_in,
    })
}

#[async_trait]
impl TokenEndpoint for SpotifyTokenEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await?
        .map_err(|reason| {
            PlayerError::AuthDenied(format!("Failed to exchange code for token: {}", reason))
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ])
        .await
        .map_err(|e| PlayerError::AuthRefreshFailed(e.to_string()))?
        .map_err(PlayerError::AuthRefreshFailed)
    }
}
