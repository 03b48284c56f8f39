use sqlx::PgPool;
use std::sync::Arc;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;
use crate::db::PassStore;
use crate::services::role_resolver::RoleResolver;

/// Session keys used in the application
pub const SESSION_KEY_IDENTITY: &str = "identity";
pub const SESSION_KEY_CSRF_TOKEN: &str = "csrf_token";
pub const SESSION_KEY_PKCE_VERIFIER: &str = "pkce_verifier";
pub const SESSION_KEY_RETURN_URL: &str = "return_url";

/// Staff sign in once per school day
const SESSION_INACTIVITY_HOURS: i64 = 12;

/// Wraps any session store in the cookie settings the app uses.
/// `secure` follows whether the public base URL is HTTPS.
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    secure: bool,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(
            SESSION_INACTIVITY_HOURS,
        )))
}

/// Session store backed by PostgreSQL, sharing the pass database
pub async fn create_postgres_session_store(pool: PgPool) -> Result<PostgresStore, sqlx::Error> {
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;
    Ok(session_store)
}

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PassStore>,
    pub roster: Arc<RoleResolver>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn PassStore>, config: Config) -> Self {
        Self {
            store,
            roster: Arc::new(RoleResolver::new(config.school.clone())),
            config: Arc::new(config),
        }
    }
}
