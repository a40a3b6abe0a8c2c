/// Realtime change feed over Server-Sent Events
///
/// `GET /v1/realtime?tables=documents,chat_messages`
///
/// Each change arrives as an `invalidate` event carrying the table, the
/// operation and the row id. Clients re-fetch; nothing is patched in place.
/// Admin-only tables are left out of a member's subscription.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{auth::middleware::AuthContext, redis::ChangeTable};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use serde::Deserialize;
use std::{convert::Infallible, time::Duration};
use tokio_stream::{Stream, StreamExt};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Comma-separated table names; empty subscribes to every table
    #[serde(default)]
    pub tables: String,
}

/// Opens an SSE stream of change events for the requested tables
///
/// # Errors
///
/// - `400 Bad Request`: Unknown table name
/// - `403 Forbidden`: A member asked for an admin-only table
/// - `503 Service Unavailable`: Realtime is not configured
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SubscribeQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let tables = ChangeTable::parse_list(&query.tables).map_err(ApiError::BadRequest)?;
    let tables = permitted_tables(tables, &query.tables, auth.is_admin())?;

    let events = state.changes.subscribe(&tables).await?.ok_or_else(|| {
        ApiError::ServiceUnavailable("Realtime updates are not configured".to_string())
    })?;

    tracing::debug!(user_id = %auth.user_id(), tables = tables.len(), "Realtime subscriber connected");

    let stream = events.filter_map(|change| {
        match Event::default().event("invalidate").json_data(&change) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode change event");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// Drops admin-only tables for members
///
/// An explicit request for one is refused; the implicit "every table"
/// subscription silently narrows.
fn permitted_tables(
    tables: Vec<ChangeTable>,
    requested: &str,
    is_admin: bool,
) -> ApiResult<Vec<ChangeTable>> {
    if is_admin {
        return Ok(tables);
    }

    if requested.split(',').any(|name| !name.trim().is_empty()) {
        if let Some(table) = tables.iter().find(|t| t.is_admin_only()) {
            return Err(ApiError::Forbidden(format!(
                "Only admins can subscribe to {table}"
            )));
        }
    }

    Ok(tables.into_iter().filter(|t| !t.is_admin_only()).collect())
}
