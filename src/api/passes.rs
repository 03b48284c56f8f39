use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::middleware::{
    auth::{current_user, CurrentUser},
    session::AppState,
};
use crate::api::pages::{view_passes, PageHeader, PassRow};
use crate::error::{AppError, PageError};
use crate::models::identity::{Identity, Permissions, Role};
use crate::models::pass::{NewPass, Pass, PassFields};
use crate::services::csv_export;
use crate::services::view_filter::View;

#[derive(Template)]
#[template(path = "confirm_delete.html")]
struct ConfirmDeleteTemplate {
    header: PageHeader,
    row: PassRow,
    return_to: String,
}

#[derive(Debug, Deserialize)]
struct CreatePassForm {
    #[serde(default)]
    student_name: String,
    #[serde(default)]
    teacher: String,
    #[serde(default)]
    destination: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    return_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReturnToForm {
    #[serde(default)]
    return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeletePassForm {
    #[serde(default)]
    confirm: Option<String>,
    #[serde(default)]
    return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListPassesQuery {
    #[serde(default)]
    view: View,
}

#[derive(Debug, Deserialize)]
struct DeletePassQuery {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    identity: Option<Identity>,
    role: Role,
    permissions: Permissions,
}

/// Only same-site paths; anything else goes back to the dashboard
fn safe_return_to(return_to: Option<&str>) -> String {
    match return_to.map(str::trim) {
        Some(path) if is_local_path(path) => path.to_string(),
        _ => "/".to_string(),
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

// Lifecycle operations shared by the HTML and JSON handlers

async fn create_pass(
    state: &AppState,
    user: &CurrentUser,
    fields: PassFields,
) -> Result<Pass, AppError> {
    let new_pass = NewPass::create(fields, user.identity.as_ref(), Utc::now())?;
    let pass = state.store.create(new_pass).await?;

    tracing::info!(
        pass_id = %pass.id,
        destination = %pass.destination,
        created_by = %pass.created_by,
        "Pass created"
    );

    Ok(pass)
}

async fn return_pass(state: &AppState, id: &str) -> Result<Pass, AppError> {
    let current = state
        .store
        .snapshot()
        .get(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound("Pass not found".to_string()))?;

    // Already back: nothing to write
    if !current.is_active() {
        tracing::debug!(pass_id = %id, "Pass already returned");
        return Ok(current);
    }

    let stored = state
        .store
        .mark_returned(id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("Pass not found".to_string()))?;

    tracing::info!(pass_id = %id, "Pass returned");

    Ok(stored)
}

async fn delete_pass(
    state: &AppState,
    user: &CurrentUser,
    id: &str,
    confirmed: bool,
) -> Result<(), AppError> {
    user.require_staff()?;

    if !confirmed {
        return Err(AppError::Validation(
            "Deleting a pass must be confirmed".to_string(),
        ));
    }

    if !state.store.delete(id).await? {
        return Err(AppError::NotFound("Pass not found".to_string()));
    }

    tracing::info!(pass_id = %id, role = %user.role, "Pass deleted");

    Ok(())
}

// HTML handlers

async fn create_pass_form(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CreatePassForm>,
) -> Result<Redirect, PageError> {
    let user = current_user(&session, &state.roster).await?;

    create_pass(
        &state,
        &user,
        PassFields {
            student_name: form.student_name,
            teacher: form.teacher,
            destination: form.destination,
            reason: form.reason,
        },
    )
    .await?;

    Ok(Redirect::to(&safe_return_to(form.return_to.as_deref())))
}

async fn return_pass_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ReturnToForm>,
) -> Result<Redirect, PageError> {
    return_pass(&state, &id).await?;
    Ok(Redirect::to(&safe_return_to(form.return_to.as_deref())))
}

/// Asks before deleting
async fn confirm_delete_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReturnToForm>,
    session: Session,
) -> Result<ConfirmDeleteTemplate, PageError> {
    let user = current_user(&session, &state.roster).await?;
    user.require_staff()?;

    let pass = state
        .store
        .snapshot()
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::NotFound("Pass not found".to_string()))?;

    Ok(ConfirmDeleteTemplate {
        header: PageHeader::for_user(&user),
        row: PassRow::new(&pass, Utc::now()),
        return_to: safe_return_to(query.return_to.as_deref()),
    })
}

async fn delete_pass_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
    Form(form): Form<DeletePassForm>,
) -> Result<Redirect, PageError> {
    let user = current_user(&session, &state.roster).await?;
    let confirmed = form.confirm.as_deref() == Some("yes");

    delete_pass(&state, &user, &id, confirmed).await?;

    Ok(Redirect::to(&safe_return_to(form.return_to.as_deref())))
}

/// Downloads every pass, newest first
async fn export_csv(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, PageError> {
    let user = current_user(&session, &state.roster).await?;
    user.require_admin()?;

    let passes = view_passes(&state, &user, View::Dashboard);
    let csv = csv_export::export_passes(&passes)?;
    let now = Utc::now();

    tracing::info!(passes = passes.len(), "Passes exported");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    csv_export::export_filename(&now)
                ),
            ),
        ],
        csv,
    )
        .into_response())
}

// JSON API handlers

async fn list_passes_json(
    State(state): State<AppState>,
    Query(query): Query<ListPassesQuery>,
    session: Session,
) -> Result<Json<Vec<Pass>>, AppError> {
    let user = current_user(&session, &state.roster).await?;
    if query.view == View::Teacher {
        user.require_staff()?;
    }

    Ok(Json(view_passes(&state, &user, query.view)))
}

async fn create_pass_json(
    State(state): State<AppState>,
    session: Session,
    Json(fields): Json<PassFields>,
) -> Result<(StatusCode, Json<Pass>), AppError> {
    let user = current_user(&session, &state.roster).await?;
    let pass = create_pass(&state, &user, fields).await?;

    Ok((StatusCode::CREATED, Json(pass)))
}

async fn return_pass_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Pass>, AppError> {
    Ok(Json(return_pass(&state, &id).await?))
}

async fn delete_pass_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeletePassQuery>,
    session: Session,
) -> Result<StatusCode, AppError> {
    let user = current_user(&session, &state.roster).await?;
    delete_pass(&state, &user, &id, query.confirm).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn me_json(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<MeResponse>, AppError> {
    let user = current_user(&session, &state.roster).await?;

    Ok(Json(MeResponse {
        permissions: user.permissions(),
        role: user.role,
        identity: user.identity,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        // HTML routes
        .route("/passes", post(create_pass_form))
        .route("/passes/export.csv", get(export_csv))
        .route("/passes/:id/return", post(return_pass_form))
        .route(
            "/passes/:id/delete",
            get(confirm_delete_page).post(delete_pass_form),
        )
        // JSON API routes
        .route("/api/me", get(me_json))
        .route("/api/passes", get(list_passes_json).post(create_pass_json))
        .route("/api/passes/:id", axum::routing::delete(delete_pass_json))
        .route("/api/passes/:id/return", post(return_pass_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_return_to() {
        assert_eq!(safe_return_to(Some("/?view=teacher")), "/?view=teacher");
        assert_eq!(
            safe_return_to(Some("/?mode=kiosk&destination=Nurse")),
            "/?mode=kiosk&destination=Nurse"
        );
        assert_eq!(safe_return_to(Some("https://evil.example")), "/");
        assert_eq!(safe_return_to(Some("//evil.example")), "/");
        assert_eq!(safe_return_to(Some("/\\evil.example")), "/");
        assert_eq!(safe_return_to(None), "/");
    }
}
