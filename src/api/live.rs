use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::time::Duration;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tower_sessions::Session;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::db::PassSnapshot;
use crate::error::AppError;
use crate::services::view_filter::{filter_for_view, View};

/// Name of the SSE event carrying a full pass list
pub const PASSES_EVENT: &str = "passes";

const KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct LiveQuery {
    #[serde(default)]
    view: View,
}

/// Streams the caller's filtered pass list: once on connect, then after
/// every change to the store.
async fn events(
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
    session: Session,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let user = current_user(&session, &state.roster).await?;
    if query.view == View::Teacher {
        user.require_staff()?;
    }

    tracing::debug!(view = %query.view, role = %user.role, "Live feed subscribed");

    let view = query.view;
    let roster = state.roster.clone();
    let stream = WatchStream::new(state.store.subscribe()).map(move |snapshot: PassSnapshot| {
        let passes = filter_for_view(
            snapshot.passes(),
            view,
            user.identity.as_ref(),
            user.role,
            &roster,
        );

        Event::default()
            .event(PASSES_EVENT)
            .id(snapshot.version.to_string())
            .json_data(passes)
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keep-alive"),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(events))
}
