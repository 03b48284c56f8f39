use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use tower_sessions::Session;

use crate::api::middleware::{
    auth::{current_user, CurrentUser},
    session::AppState,
};
use crate::error::PageError;
use crate::models::identity::{Permissions, Role};
use crate::models::pass::{Destination, Pass};
use crate::services::navigation::{KioskPreset, Navigation, NavigationQuery};
use crate::services::view_filter::{filter_for_view, View};

/// Account area and links shared by every page
pub struct PageHeader {
    pub user_label: Option<String>,
    pub role: Role,
    pub permissions: Permissions,
}

impl PageHeader {
    pub fn for_user(user: &CurrentUser) -> Self {
        Self {
            user_label: user.label(),
            role: user.role,
            permissions: user.permissions(),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// One pass, formatted for display
pub struct PassRow {
    pub id: String,
    pub student_name: String,
    pub teacher: String,
    pub destination: String,
    pub reason: String,
    pub created_at: String,
    pub returned_at: String,
    pub status: &'static str,
    pub is_active: bool,
    pub minutes_out: i64,
}

impl PassRow {
    pub fn new(pass: &Pass, now: DateTime<Utc>) -> Self {
        let until = pass.returned_at.unwrap_or(now);

        Self {
            id: pass.id.clone(),
            student_name: pass.student_name.clone(),
            teacher: pass.teacher.clone(),
            destination: pass.destination.to_string(),
            reason: pass.reason.clone().unwrap_or_default(),
            created_at: pass.created_at.format("%b %-d %H:%M").to_string(),
            returned_at: pass
                .returned_at
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default(),
            status: pass.status.as_str(),
            is_active: pass.is_active(),
            minutes_out: (until - pass.created_at).num_minutes().max(0),
        }
    }
}

fn rows(passes: &[Pass]) -> Vec<PassRow> {
    let now = Utc::now();
    passes.iter().map(|pass| PassRow::new(pass, now)).collect()
}

fn destination_names() -> Vec<String> {
    Destination::CATEGORIES
        .iter()
        .map(|d| d.as_str().to_string())
        .collect()
}

// Templates
#[derive(Template)]
#[template(path = "passes.html")]
pub struct PassesTemplate {
    pub header: PageHeader,
    pub title: String,
    pub rows: Vec<PassRow>,
    pub return_to: String,
    pub default_teacher: String,
    pub destinations: Vec<String>,
    /// Roster names offered as suggestions in the teacher fields
    pub teachers: Vec<String>,
}

#[derive(Template)]
#[template(path = "monitor.html")]
pub struct MonitorTemplate {
    pub header: PageHeader,
    pub rows: Vec<PassRow>,
    /// Snapshot the rows came from; the live feed tags events with it
    pub version: u64,
}

#[derive(Template)]
#[template(path = "kiosk.html")]
pub struct KioskTemplate {
    pub header: PageHeader,
    pub fixed_destination: Option<String>,
    pub fixed_teacher: Option<String>,
    pub destinations: Vec<String>,
    pub return_to: String,
}

/// Renders whichever page the query string selects
async fn home(
    State(state): State<AppState>,
    Query(query): Query<NavigationQuery>,
    session: Session,
) -> Result<Response, PageError> {
    let user = current_user(&session, &state.roster).await?;
    let navigation = Navigation::from_query(&query);

    tracing::debug!(?navigation, role = %user.role, "Rendering page");

    let response = match navigation {
        Navigation::Kiosk(preset) => kiosk_page(&user, preset).into_response(),
        Navigation::Monitor => {
            let snapshot = state.store.snapshot();
            let passes = filter_for_view(
                snapshot.passes(),
                View::Monitor,
                user.identity.as_ref(),
                user.role,
                &state.roster,
            );
            MonitorTemplate {
                header: PageHeader::for_user(&user),
                rows: rows(&passes),
                version: snapshot.version,
            }
            .into_response()
        }
        Navigation::Teacher => {
            user.require_staff()?;
            let passes = view_passes(&state, &user, View::Teacher);
            let default_teacher = user
                .identity
                .as_ref()
                .and_then(|identity| state.roster.teacher_name(identity))
                .unwrap_or_default()
                .to_string();

            PassesTemplate {
                header: PageHeader::for_user(&user),
                title: "My class".to_string(),
                rows: rows(&passes),
                return_to: "/?view=teacher".to_string(),
                default_teacher,
                destinations: destination_names(),
                teachers: state.roster.teacher_names(),
            }
            .into_response()
        }
        Navigation::Dashboard => {
            let passes = view_passes(&state, &user, View::Dashboard);
            PassesTemplate {
                header: PageHeader::for_user(&user),
                title: "All passes".to_string(),
                rows: rows(&passes),
                return_to: "/".to_string(),
                default_teacher: String::new(),
                destinations: destination_names(),
                teachers: state.roster.teacher_names(),
            }
            .into_response()
        }
    };

    Ok(response)
}

fn kiosk_page(user: &CurrentUser, preset: KioskPreset) -> KioskTemplate {
    KioskTemplate {
        header: PageHeader::for_user(user),
        return_to: preset.path(),
        fixed_destination: preset.destination.map(String::from),
        fixed_teacher: preset.teacher,
        destinations: destination_names(),
    }
}

/// Current snapshot filtered for the caller
pub fn view_passes(state: &AppState, user: &CurrentUser, view: View) -> Vec<Pass> {
    let snapshot = state.store.snapshot();
    filter_for_view(
        snapshot.passes(),
        view,
        user.identity.as_ref(),
        user.role,
        &state.roster,
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}
