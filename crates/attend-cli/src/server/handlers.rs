//! REST endpoint handlers.
//!
//! Engine and database calls block, so every handler hops onto the
//! blocking pool through [`AppState::blocking`].
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health` | Liveness probe |
//! | `POST` | `/api/scan` | Record a badge scan |
//! | `GET`, `POST` | `/api/events` | List or create events |
//! | `GET`, `PUT`, `DELETE` | `/api/events/{id}` | Read, update or delete an event |
//! | `POST` | `/api/events/{id}/finalize` | Close an event |
//! | `GET` | `/api/events/{id}/stats` | Status counts |
//! | `GET` | `/api/attendance/event/{id}` | Event roster |
//! | `GET` | `/api/attendance/event/{id}/export` | Roster as a CSV download |
//! | `PUT` | `/api/attendance/{id}/override` | Force a session's status |
//! | `GET`, `POST` | `/api/participants` | List or register participants |
//! | `POST` | `/api/participants/bulk` | Bulk registration |
//! | `DELETE` | `/api/participants/{id}` | Remove a participant |

use std::sync::Arc;

use attend_core::{
    Action, AttendanceError, AttendanceStatus, EventId, EventUpdate, NewEvent, Participant,
    ParticipantId, ParticipantInput, ScanRequest, SessionId,
};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::error::ApiError;
use super::state::AppState;
use crate::commands::export::{export_filename, render_csv};

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ParticipantQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub participants: Vec<ParticipantInput>,
}

/// HTTP status for each scan outcome.
pub const fn scan_status(action: Action) -> StatusCode {
    match action {
        Action::CheckIn => StatusCode::CREATED,
        Action::CheckOut | Action::EarlyCheckoutWarning => StatusCode::OK,
        Action::DuplicateBlocked => StatusCode::CONFLICT,
    }
}

fn event_id(raw: i64) -> ApiResult<EventId> {
    EventId::new(raw).map_err(|err| AttendanceError::InvalidInput(err.to_string()).into())
}

#[expect(clippy::unused_async, reason = "axum handlers must be async")]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": state.engine.now(),
    }))
}

pub async fn scan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let outcome = state
        .blocking(move |state| {
            let (event_id, raw) = request.validate()?;
            Ok(state.engine.record_observation(event_id, raw)?)
        })
        .await?;
    debug!(action = %outcome.action(), "scan handled");
    Ok((scan_status(outcome.action()), Json(outcome.to_response())))
}

pub async fn list_events(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let events = state.with_db(|db| Ok(db.list_events()?)).await?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    let default_percent = state.default_percent;
    let created_at = state.engine.now();
    let event = state
        .with_db(move |db| Ok(db.create_event(&input, default_percent, created_at)?))
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let id = event_id(id)?;
    let event = state
        .with_db(move |db| {
            db.event(id)?
                .ok_or_else(|| AttendanceError::EventNotFound(id).into())
        })
        .await?;
    Ok(Json(event))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<EventUpdate>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = event_id(id)?;
    let Json(update) = payload?;
    let event = state
        .with_db(move |db| {
            db.update_event(id, &update)?
                .ok_or_else(|| AttendanceError::EventNotFound(id).into())
        })
        .await?;
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let id = event_id(id)?;
    state
        .with_db(move |db| {
            if db.delete_event(id)? {
                Ok(())
            } else {
                Err(AttendanceError::EventNotFound(id).into())
            }
        })
        .await?;
    Ok(Json(json!({ "message": format!("Event {id} deleted") })))
}

pub async fn finalize_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let id = event_id(id)?;
    let summary = state
        .blocking(move |state| Ok(state.engine.finalize_event(id)?))
        .await?;
    Ok(Json(json!({
        "event_id": summary.event_id,
        "finalized_count": summary.finalized_count,
        "message": format!(
            "Event finalized; {} pending session(s) marked ABSENT",
            summary.finalized_count
        ),
    })))
}

pub async fn event_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let id = event_id(id)?;
    let stats = state
        .blocking(move |state| Ok(state.engine.event_stats(id)?))
        .await?;
    Ok(Json(stats))
}

pub async fn event_roster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let id = event_id(id)?;
    let (event, attendance) = state
        .with_db(move |db| {
            let event = db.event(id)?.ok_or(AttendanceError::EventNotFound(id))?;
            Ok((event, db.roster(id)?))
        })
        .await?;
    Ok(Json(json!({ "event": event, "attendance": attendance })))
}

pub async fn export_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let id = event_id(id)?;
    let (event, rows) = state
        .with_db(move |db| {
            let event = db.event(id)?.ok_or(AttendanceError::EventNotFound(id))?;
            Ok((event, db.export_rows(id)?))
        })
        .await?;
    let disposition = format!("attachment; filename=\"{}\"", export_filename(&event));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        render_csv(&rows),
    ))
}

pub async fn override_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let id = SessionId::new(id)?;
    let status: AttendanceStatus = request.status.parse()?;
    let session = state
        .with_db(move |db| {
            db.override_status(id, status)?
                .ok_or_else(|| ApiError::NotFound(format!("attendance record not found: {id}")))
        })
        .await?;
    Ok(Json(json!({
        "message": format!("Status overridden to {status}"),
        "attendance": session,
    })))
}

pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ParticipantQuery>,
) -> ApiResult<impl IntoResponse> {
    let participants = state
        .with_db(move |db| Ok(db.list_participants(query.search.as_deref())?))
        .await?;
    Ok(Json(participants))
}

pub async fn add_participant(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ParticipantInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    let participant = Participant::try_from(input)?;
    let created_at = state.engine.now();
    let participant = state
        .with_db(move |db| {
            db.add_participant(&participant, created_at)?;
            Ok(participant)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn bulk_add_participants(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let created_at = state.engine.now();
    let summary = state
        .with_db(move |db| Ok(db.import_participants(request.participants, created_at)?))
        .await?;
    Ok(Json(summary))
}

pub async fn delete_participant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = ParticipantId::new(&id)?;
    let message = format!("Participant {id} deleted");
    state
        .with_db(move |db| {
            if db.delete_participant(&id)? {
                Ok(())
            } else {
                Err(ApiError::NotFound(format!("participant not found: {id}")))
            }
        })
        .await?;
    Ok(Json(json!({ "message": message })))
}
