use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::EventStoreError;
use crate::core::event::{Event, NewEvent};
use crate::core::stream::{AggregateId, AggregateType, Version};
use crate::shell::state::AppState;

#[derive(Deserialize)]
pub struct NewEventBody {
    pub event_type: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct SaveEventsBody {
    pub expected_version: u64,
    pub events: Vec<NewEventBody>,
}

#[derive(Serialize)]
pub struct SaveEventsResponse {
    pub version: Version,
    pub events: Vec<Event>,
}

#[derive(Deserialize)]
pub struct LoadParams {
    pub from: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/streams/{aggregate_type}/{aggregate_id}",
            get(load).post(save),
        )
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn reply(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn error_response(error: EventStoreError) -> Response {
    let status = match &error {
        EventStoreError::NoEventsToAppend => StatusCode::BAD_REQUEST,
        EventStoreError::MismatchedAggregate { .. } => StatusCode::BAD_REQUEST,
        EventStoreError::VersionConflict { .. } => StatusCode::CONFLICT,
        EventStoreError::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
        EventStoreError::Storage { .. } => {
            tracing::error!(%error, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    reply(status, error)
}

pub async fn save(
    State(state): State<AppState>,
    Path((aggregate_type, aggregate_id)): Path<(String, String)>,
    body: Result<Json<SaveEventsBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return reply(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()),
    };
    let aggregate_id: AggregateId = match aggregate_id.parse() {
        Ok(id) => id,
        Err(e) => return reply(StatusCode::UNPROCESSABLE_ENTITY, e),
    };
    let aggregate_type = AggregateType::new(aggregate_type);

    let events = body
        .events
        .into_iter()
        .map(|event| {
            let mut new_event =
                NewEvent::new(aggregate_type.clone(), aggregate_id, event.event_type);
            if let Some(payload) = event.payload {
                new_event = new_event.with_payload(payload);
            }
            event
                .metadata
                .into_iter()
                .fold(new_event, |new_event, (key, value)| {
                    new_event.with_metadata(key, value)
                })
        })
        .collect();
    let expected = Version::new(body.expected_version);

    match state
        .event_store
        .save(&state.request_context(), events, expected)
        .await
    {
        Ok(events) => {
            let version = events.last().map_or(expected, Event::version);
            (
                StatusCode::CREATED,
                Json(SaveEventsResponse { version, events }),
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

pub async fn load(
    State(state): State<AppState>,
    Path((aggregate_type, aggregate_id)): Path<(String, String)>,
    Query(params): Query<LoadParams>,
) -> Response {
    let aggregate_id: AggregateId = match aggregate_id.parse() {
        Ok(id) => id,
        Err(e) => return reply(StatusCode::UNPROCESSABLE_ENTITY, e),
    };
    let aggregate_type = AggregateType::new(aggregate_type);
    let from = Version::new(params.from.unwrap_or(1));

    match state
        .event_store
        .load_from(&state.request_context(), &aggregate_type, aggregate_id, from)
        .await
    {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(error) => error_response(error),
    }
}
