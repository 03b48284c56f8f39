use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::session::{
    AppState, SESSION_KEY_CSRF_TOKEN, SESSION_KEY_IDENTITY, SESSION_KEY_PKCE_VERIFIER,
    SESSION_KEY_RETURN_URL,
};
use crate::config::GoogleConfig;
use crate::services::oauth::google;

#[derive(Debug)]
pub enum AuthError {
    NotConfigured,
    OAuthError(String),
    SessionError(String),
    CsrfMismatch,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Google sign-in is not configured".to_string(),
            ),
            AuthError::OAuthError(msg) => {
                (StatusCode::BAD_REQUEST, format!("OAuth error: {}", msg))
            }
            AuthError::SessionError(msg) => {
                tracing::error!(error = %msg, "Session error during sign-in");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session error".to_string(),
                )
            }
            AuthError::CsrfMismatch => (StatusCode::BAD_REQUEST, "CSRF token mismatch".to_string()),
        };

        (status, message).into_response()
    }
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(e: tower_sessions::session::Error) -> Self {
        AuthError::SessionError(e.to_string())
    }
}

fn google_config(state: &AppState) -> Result<&GoogleConfig, AuthError> {
    state.config.google.as_ref().ok_or(AuthError::NotConfigured)
}

fn redirect_uri(state: &AppState) -> String {
    format!("{}/auth/callback", state.config.base_url)
}

#[derive(Deserialize)]
struct LoginParams {
    return_to: Option<String>,
}

/// Starts Google sign-in
async fn login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
    session: Session,
) -> Result<Redirect, AuthError> {
    let google = google_config(&state)?;

    let (auth_url, csrf_token, pkce_verifier) =
        google::build_auth_url(&google.client_id, &google.client_secret, &redirect_uri(&state))
            .map_err(|e| AuthError::OAuthError(e.to_string()))?;

    session.insert(SESSION_KEY_CSRF_TOKEN, csrf_token).await?;
    session.insert(SESSION_KEY_PKCE_VERIFIER, pkce_verifier).await?;

    // Come back to the page the user signed in from
    let return_to = params
        .return_to
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| "/".to_string());
    session.insert(SESSION_KEY_RETURN_URL, return_to).await?;

    tracing::info!("Redirecting to Google sign-in");

    Ok(Redirect::to(&auth_url))
}

#[derive(Deserialize)]
struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Handles the redirect back from Google
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallback>,
    session: Session,
) -> Result<Redirect, AuthError> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Google sign-in was not completed");
        return Err(AuthError::OAuthError(error));
    }

    let (Some(code), Some(returned_state)) = (params.code, params.state) else {
        return Err(AuthError::OAuthError(
            "Missing code or state parameter".to_string(),
        ));
    };

    // Verify CSRF token
    let stored_csrf: Option<String> = session.remove(SESSION_KEY_CSRF_TOKEN).await?;
    if stored_csrf.as_deref() != Some(returned_state.as_str()) {
        return Err(AuthError::CsrfMismatch);
    }

    let pkce_verifier: Option<String> = session.remove(SESSION_KEY_PKCE_VERIFIER).await?;
    let google = google_config(&state)?;

    let access_token = google::exchange_code(
        &code,
        &google.client_id,
        &google.client_secret,
        &redirect_uri(&state),
        pkce_verifier.as_deref(),
    )
    .await
    .map_err(|e| AuthError::OAuthError(e.to_string()))?;

    let identity = google::fetch_identity(google::GOOGLE_USERINFO_URL, &access_token)
        .await
        .map_err(|e| AuthError::OAuthError(e.to_string()))?;

    // New session id on sign-in
    session.cycle_id().await?;
    session.insert(SESSION_KEY_IDENTITY, &identity).await?;

    let role = state.roster.resolve(Some(&identity));
    tracing::info!(user = %identity.label(), role = %role, "User signed in");

    let return_to: Option<String> = session.remove(SESSION_KEY_RETURN_URL).await?;
    Ok(Redirect::to(return_to.as_deref().unwrap_or("/")))
}

/// Signs the user out
async fn logout(session: Session) -> Result<Redirect, AuthError> {
    session.flush().await?;

    Ok(Redirect::to("/"))
}

/// Creates the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/logout", get(logout))
}
