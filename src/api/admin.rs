// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only pages.
//!
//! Every handler takes the [`AdminPage`] extractor, so the admin guard runs
//! before any record is read. Provides:
//! - Dashboard statistics
//! - Event management
//! - Registration lists per event

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    auth::{AdminPage, RecordClient},
    error::ApiError,
    models::{
        CreateEventRequest, DashboardResponse, DashboardStats, Event, EventListResponse,
        IdentityView, RegistrationListResponse,
    },
    records::{RecordQuery, SortOrder, EVENTS_TABLE, REGISTRATIONS_TABLE},
    state::AppState,
};

/// Number of upcoming events shown on the dashboard.
const UPCOMING_LIMIT: usize = 5;

// ============================================================================
// Handlers
// ============================================================================

/// Admin dashboard.
///
/// Returns the operator identity, aggregate counts and the next events.
#[utoipa::path(
    get,
    path = "/admin",
    tag = "Admin",
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 303, description = "Redirect to login or home page"),
        (status = 502, description = "Record backend unavailable")
    )
)]
pub async fn dashboard(
    AdminPage(admin): AdminPage,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let records = state.provider.as_ref();
    let event_count = records.count(&RecordQuery::new(EVENTS_TABLE)).await?;
    let registration_count = records
        .count(&RecordQuery::new(REGISTRATIONS_TABLE))
        .await?;

    let now = Utc::now();
    let upcoming: Vec<Event> = load_events(&state)
        .await?
        .into_iter()
        .filter(|event| event.starts_at >= now)
        .collect();

    Ok(Json(DashboardResponse {
        operator: IdentityView::from(&admin),
        stats: DashboardStats {
            event_count,
            registration_count,
            upcoming_event_count: upcoming.len(),
        },
        upcoming: upcoming.into_iter().take(UPCOMING_LIMIT).collect(),
    }))
}

/// List all events by start time.
#[utoipa::path(
    get,
    path = "/admin/events",
    tag = "Admin",
    responses(
        (status = 200, description = "All events", body = EventListResponse),
        (status = 303, description = "Redirect to login or home page")
    )
)]
pub async fn list_events(
    AdminPage(_admin): AdminPage,
    State(state): State<AppState>,
) -> Result<Json<EventListResponse>, ApiError> {
    let events = load_events(&state).await?;
    Ok(Json(EventListResponse { events }))
}

/// Create an event.
#[utoipa::path(
    post,
    path = "/admin/events",
    tag = "Admin",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid event"),
        (status = 303, description = "Redirect to login or home page")
    )
)]
pub async fn create_event(
    AdminPage(admin): AdminPage,
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Event title is required"));
    }
    if request.capacity == Some(0) {
        return Err(ApiError::bad_request("Event capacity must be positive"));
    }

    let mut row = json!({
        "title": title,
        "starts_at": request.starts_at,
    });
    if let Some(fields) = row.as_object_mut() {
        if let Some(description) = request.description {
            fields.insert("description".into(), Value::from(description));
        }
        if let Some(location) = request.location {
            fields.insert("location".into(), Value::from(location));
        }
        if let Some(capacity) = request.capacity {
            fields.insert("capacity".into(), Value::from(capacity));
        }
    }

    let stored = state.provider.insert(EVENTS_TABLE, row).await?;
    let event: Event = decode_row(EVENTS_TABLE, stored)?;
    info!(event_id = event.id, user_id = %admin.id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// Delete an event and its registrations.
#[utoipa::path(
    delete,
    path = "/admin/events/{event_id}",
    tag = "Admin",
    params(
        ("event_id" = i64, Path, description = "Event identifier")
    ),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found"),
        (status = 303, description = "Redirect to login or home page")
    )
)]
pub async fn delete_event(
    AdminPage(admin): AdminPage,
    Path(event_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .provider
        .delete(&RecordQuery::new(EVENTS_TABLE).eq("id", event_id))
        .await?;
    if removed == 0 {
        return Err(ApiError::not_found(format!("Event {event_id} not found")));
    }

    let registrations = state
        .provider
        .delete(&RecordQuery::new(REGISTRATIONS_TABLE).eq("event_id", event_id))
        .await?;
    info!(event_id, registrations, user_id = %admin.id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List registrations for one event.
#[utoipa::path(
    get,
    path = "/admin/events/{event_id}/registrations",
    tag = "Admin",
    params(
        ("event_id" = i64, Path, description = "Event identifier")
    ),
    responses(
        (status = 200, description = "Registrations", body = RegistrationListResponse),
        (status = 404, description = "Event not found"),
        (status = 303, description = "Redirect to login or home page")
    )
)]
pub async fn list_registrations(
    AdminPage(_admin): AdminPage,
    Path(event_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<RegistrationListResponse>, ApiError> {
    let exists = state
        .provider
        .count(&RecordQuery::new(EVENTS_TABLE).eq("id", event_id))
        .await?;
    if exists == 0 {
        return Err(ApiError::not_found(format!("Event {event_id} not found")));
    }

    let rows = state
        .provider
        .select(
            &RecordQuery::new(REGISTRATIONS_TABLE)
                .eq("event_id", event_id)
                .order("id", SortOrder::Ascending),
        )
        .await?;

    Ok(Json(RegistrationListResponse {
        event_id,
        registrations: decode_rows(REGISTRATIONS_TABLE, rows)?,
    }))
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn load_events(state: &AppState) -> Result<Vec<Event>, ApiError> {
    let rows = state
        .provider
        .select(&RecordQuery::new(EVENTS_TABLE).order("starts_at", SortOrder::Ascending))
        .await?;
    decode_rows(EVENTS_TABLE, rows)
}

fn decode_row<T: DeserializeOwned>(table: &str, row: Value) -> Result<T, ApiError> {
    serde_json::from_value(row).map_err(|e| {
        warn!(table, error = %e, "Malformed record");
        ApiError::bad_gateway(format!("Malformed {table} record"))
    })
}

fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>, ApiError> {
    rows.into_iter().map(|row| decode_row(table, row)).collect()
}

// ============================================================================
// Tests
// ============================================================================
