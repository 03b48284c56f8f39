// API module - HTTP endpoints

pub mod auth;
pub mod health;
pub mod kiosk;
pub mod live;
pub mod middleware;
pub mod pages;
pub mod passes;

use axum::{routing::get, Router};

use middleware::session::AppState;

/// Every page and API route, before the session layer and state are applied
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::router())
        .merge(pages::router())
        .merge(passes::router())
        .merge(live::router())
        .merge(kiosk::router())
}
