use oauth2::reqwest::async_http_client;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::models::identity::Identity;

#[derive(thiserror::Error, Debug)]
pub enum GoogleOAuthError {
    #[error("OAuth URL construction failed: {0}")]
    UrlConstruction(String),

    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Userinfo request failed: {0}")]
    Userinfo(#[from] reqwest::Error),

    #[error("Google rejected the userinfo request: {0}")]
    UserinfoStatus(reqwest::StatusCode),
}

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Only the name and email are needed to resolve a role
pub const SIGN_IN_SCOPES: [&str; 3] = ["openid", "email", "profile"];

fn build_oauth_client(
    client_id: &str,
    client_secret: &Secret<String>,
    redirect_uri: &str,
) -> Result<BasicClient, GoogleOAuthError> {
    let redirect_url = RedirectUrl::new(redirect_uri.to_string())
        .map_err(|e| GoogleOAuthError::InvalidRedirectUri(e.to_string()))?;

    let client = BasicClient::new(
        ClientId::new(client_id.to_string()),
        Some(ClientSecret::new(client_secret.expose_secret().clone())),
        AuthUrl::new(GOOGLE_AUTH_URL.to_string())
            .map_err(|e| GoogleOAuthError::UrlConstruction(e.to_string()))?,
        Some(
            TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
                .map_err(|e| GoogleOAuthError::UrlConstruction(e.to_string()))?,
        ),
    )
    .set_redirect_uri(redirect_url);

    Ok(client)
}

/// Generates the Google sign-in URL
/// Returns (auth_url, csrf_token, pkce_verifier)
pub fn build_auth_url(
    client_id: &str,
    client_secret: &Secret<String>,
    redirect_uri: &str,
) -> Result<(String, String, String), GoogleOAuthError> {
    let client = build_oauth_client(client_id, client_secret, redirect_uri)?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(SIGN_IN_SCOPES.iter().map(|s| Scope::new(s.to_string())))
        .add_extra_param("prompt", "select_account")
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok((
        auth_url.to_string(),
        csrf_token.secret().clone(),
        pkce_verifier.secret().clone(),
    ))
}

/// Exchanges an authorization code for an access token
pub async fn exchange_code(
    code: &str,
    client_id: &str,
    client_secret: &Secret<String>,
    redirect_uri: &str,
    pkce_verifier: Option<&str>,
) -> Result<String, GoogleOAuthError> {
    let client = build_oauth_client(client_id, client_secret, redirect_uri)?;

    let mut token_request = client.exchange_code(AuthorizationCode::new(code.to_string()));

    if let Some(verifier) = pkce_verifier {
        token_request =
            token_request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_string()));
    }

    let token_response = token_request
        .request_async(async_http_client)
        .await
        .map_err(|e| GoogleOAuthError::TokenExchange(e.to_string()))?;

    Ok(token_response.access_token().secret().clone())
}

#[derive(Debug, Deserialize)]
struct UserinfoResponse {
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
}

/// Fetches the signed-in user's name and email.
/// An email Google has not verified is dropped, which leaves the user a student.
pub async fn fetch_identity(
    userinfo_url: &str,
    access_token: &str,
) -> Result<Identity, GoogleOAuthError> {
    let response = reqwest::Client::new()
        .get(userinfo_url)
        .bearer_auth(access_token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(GoogleOAuthError::UserinfoStatus(response.status()));
    }

    let userinfo: UserinfoResponse = response.json().await?;

    let email = userinfo
        .email
        .filter(|_| userinfo.email_verified.unwrap_or(true));

    Ok(Identity::new(userinfo.name, email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_auth_url() {
        let client_secret = Secret::new("test-secret".to_string());
        let redirect_uri = "http://localhost:3000/auth/callback";

        let (auth_url, csrf_token, pkce_verifier) =
            build_auth_url("test-client-id", &client_secret, redirect_uri).unwrap();

        assert!(auth_url.contains("accounts.google.com"));
        assert!(auth_url.contains("client_id=test-client-id"));
        assert!(auth_url.contains("redirect_uri="));
        assert!(auth_url.contains("email"));
        assert!(auth_url.contains("code_challenge="));

        assert!(!csrf_token.is_empty());
        assert!(!pkce_verifier.is_empty());
    }

    #[test]
    fn test_invalid_redirect_uri() {
        let client_secret = Secret::new("test-secret".to_string());
        let result = build_auth_url("test-client-id", &client_secret, "not a valid uri!!!");
        assert!(matches!(result, Err(GoogleOAuthError::InvalidRedirectUri(_))));
    }

    #[tokio::test]
    async fn test_fetch_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/userinfo"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "1234",
                "name": "Mrs. Daleo",
                "email": "mrs.daleo@school.edu",
                "email_verified": true
            })))
            .mount(&server)
            .await;

        let identity = fetch_identity(&format!("{}/v1/userinfo", server.uri()), "token-123")
            .await
            .unwrap();

        assert_eq!(identity.display_name.as_deref(), Some("Mrs. Daleo"));
        assert_eq!(identity.email.as_deref(), Some("mrs.daleo@school.edu"));
    }

    #[tokio::test]
    async fn test_unverified_email_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Someone",
                "email": "principal@school.edu",
                "email_verified": false
            })))
            .mount(&server)
            .await;

        let identity = fetch_identity(&format!("{}/v1/userinfo", server.uri()), "token")
            .await
            .unwrap();

        assert!(identity.email.is_none());
    }

    #[tokio::test]
    async fn test_userinfo_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = fetch_identity(&format!("{}/v1/userinfo", server.uri()), "expired").await;
        assert!(matches!(
            result,
            Err(GoogleOAuthError::UserinfoStatus(status))
                if status == reqwest::StatusCode::UNAUTHORIZED
        ));
    }
}
