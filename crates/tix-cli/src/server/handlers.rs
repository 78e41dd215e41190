//! Route handlers. Engine calls are synchronous and may wait on store locks,
//! so each one runs on the blocking pool.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::Uri,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tix_core::model::{Action, NewTicket, Ticket, TicketEvent};
use tix_core::replay::CycleReport;
use tix_core::service::parse_ticket_id;
use tix_core::{Dashboard, EngineError, StatusHistogram};

use super::AppState;
use super::error::AppError;

/// Request body for `PUT /tickets/:id/<action>`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActionBody {
    pub note: Option<String>,
    /// Only meaningful for `assign`: replaces the owner, status unchanged.
    pub assignee: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<TicketEvent>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Decode a JSON body. An empty body decodes to `T::default()` when
/// `allow_empty` is set; anything unparseable is a 400.
fn parse_body<T: DeserializeOwned + Default>(
    body: &Bytes,
    allow_empty: bool,
) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return if allow_empty {
            Ok(T::default())
        } else {
            Err(AppError::bad_request("request body is required"))
        };
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("malformed body: {e}")))
}

fn limit(
    state: &AppState,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<usize, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(e.body_text()))?;
    Ok(query.limit.unwrap_or(state.default_limit))
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal().with_source(e.into()))?
        .map_err(AppError::from)
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("no route for {}", uri.path()))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn create_ticket(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Ticket>, AppError> {
    let input: NewTicket = parse_body(&body, false)?;
    blocking(move || state.service.create(input)).await.map(Json)
}

pub async fn list_tickets(State(state): State<AppState>) -> Result<Json<Vec<Ticket>>, AppError> {
    blocking(move || state.service.list()).await.map(Json)
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, AppError> {
    let id = parse_ticket_id(&id)?;
    blocking(move || state.service.get(&id)).await.map(Json)
}

/// One handler behind every action route; `action` is bound when the route is
/// registered.
pub async fn apply_action(
    state: AppState,
    action: Action,
    id: String,
    body: Bytes,
) -> Result<Json<Ticket>, AppError> {
    let id = parse_ticket_id(&id)?;
    let ActionBody { note, assignee } = parse_body(&body, true)?;

    blocking(move || match (action, assignee) {
        (Action::Assign, Some(assignee)) => {
            state.service.assign(&id, &assignee, note.as_deref())
        }
        (action, _) => state.service.apply_action(&id, action, note.as_deref()),
    })
    .await
    .map(Json)
}

pub async fn ticket_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>, AppError> {
    let id = parse_ticket_id(&id)?;
    let events = blocking(move || state.service.events(&id)).await?;
    Ok(Json(EventsResponse { events }))
}

pub async fn ticket_cycles(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CycleReport>, AppError> {
    let id = parse_ticket_id(&id)?;
    blocking(move || state.service.cycles(&id)).await.map(Json)
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatusHistogram>, AppError> {
    blocking(move || state.projector.status_histogram())
        .await
        .map(Json)
}

pub async fn unassigned(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let limit = limit(&state, query)?;
    blocking(move || state.projector.unassigned(limit))
        .await
        .map(Json)
}

pub async fn overdue(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let limit = limit(&state, query)?;
    blocking(move || state.projector.overdue(limit)).await.map(Json)
}

pub async fn dashboard(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Dashboard>, AppError> {
    let limit = limit(&state, query)?;
    blocking(move || state.projector.dashboard(limit))
        .await
        .map(Json)
}
