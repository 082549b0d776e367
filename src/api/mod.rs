// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CreateEventRequest, DashboardResponse, DashboardStats, Event, EventListResponse,
        IdentityView, LoginRequest, Registration, RegistrationListResponse, SessionView,
    },
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod health;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/session", get(auth::get_session))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/admin", get(admin::dashboard))
        .route(
            "/admin/events",
            get(admin::list_events).post(admin::create_event),
        )
        .route("/admin/events/{event_id}", delete(admin::delete_event))
        .route(
            "/admin/events/{event_id}/registrations",
            get(admin::list_registrations),
        )
        .with_state(state);

    routes
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::get_session,
        auth::login,
        auth::logout,
        admin::dashboard,
        admin::list_events,
        admin::create_event,
        admin::delete_event,
        admin::list_registrations
    ),
    components(
        schemas(
            health::HealthResponse,
            SessionView,
            IdentityView,
            LoginRequest,
            Event,
            CreateEventRequest,
            EventListResponse,
            Registration,
            RegistrationListResponse,
            DashboardStats,
            DashboardResponse
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Operator session"),
        (name = "Admin", description = "Admin-only pages")
    )
)]
struct ApiDoc;
