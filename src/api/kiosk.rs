use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::error::PageError;
use crate::services::kiosk_qr;
use crate::services::navigation::KioskPreset;

#[derive(Debug, Deserialize)]
struct KioskQrQuery {
    destination: Option<String>,
    teacher: Option<String>,
}

impl KioskQrQuery {
    fn preset(&self) -> KioskPreset {
        KioskPreset::new(self.destination.as_deref(), self.teacher.as_deref())
    }
}

/// QR poster for a kiosk link, as SVG
async fn kiosk_qr_svg(
    State(state): State<AppState>,
    Query(query): Query<KioskQrQuery>,
    session: Session,
) -> Result<impl IntoResponse, PageError> {
    let user = current_user(&session, &state.roster).await?;
    user.require_staff()?;

    let preset = query.preset();
    let svg = kiosk_qr::kiosk_qr_svg(&state.config.base_url, &preset)?;

    tracing::info!(kiosk = %preset.path(), "Kiosk QR code generated");

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

/// Same poster as PNG, for printing
async fn kiosk_qr_png(
    State(state): State<AppState>,
    Query(query): Query<KioskQrQuery>,
    session: Session,
) -> Result<impl IntoResponse, PageError> {
    let user = current_user(&session, &state.roster).await?;
    user.require_staff()?;

    let preset = query.preset();
    let png = kiosk_qr::kiosk_qr_png(&state.config.base_url, &preset)?;

    tracing::info!(kiosk = %preset.path(), "Kiosk QR code generated");

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/kiosk/qr.svg", get(kiosk_qr_svg))
        .route("/kiosk/qr.png", get(kiosk_qr_png))
}
