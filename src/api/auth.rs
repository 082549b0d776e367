// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session endpoints.
//!
//! Sign-in and sign-out go straight to the provider; the session cache is
//! updated by the synchronizer when the provider's auth event arrives.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::{
    error::ApiError,
    models::{IdentityView, LoginRequest, SessionView},
    state::AppState,
};

/// Current session cache snapshot.
#[utoipa::path(
    get,
    path = "/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cache snapshot", body = SessionView)
    )
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(SessionView::from(&state.session.snapshot()))
}

/// Sign in with email and password.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = IdentityView),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials"),
        (status = 502, description = "Identity provider unavailable")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<IdentityView>, ApiError> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let session = state
        .provider
        .sign_in_with_password(email, &request.password)
        .await?;
    info!(user_id = %session.user.id, "Operator signed in");
    Ok(Json(IdentityView::from(&session.user)))
}

/// Sign out of the provider.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Signed out"),
        (status = 502, description = "Identity provider unavailable")
    )
)]
pub async fn logout(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.provider.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Identity, MemoryAuthClient};

    fn state() -> AppState {
        let client = MemoryAuthClient::new();
        client.add_account(
            "ada@example.com",
            "hunter2",
            Identity::new("u-ada", Some("ada@example.com")),
        );
        AppState::new(client)
    }

    fn credentials(email: &str, password: &str) -> Json<LoginRequest> {
        Json(LoginRequest {
            email: email.into(),
            password: password.into(),
        })
    }

    #[tokio::test]
    async fn login_returns_identity() {
        let Json(identity) = login(State(state()), credentials("ada@example.com", "hunter2"))
            .await
            .unwrap();
        assert_eq!(identity.id, "u-ada");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let err = login(State(state()), credentials("ada@example.com", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = login(State(state()), credentials(" ", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn session_view_starts_loading() {
        let Json(view) = get_session(State(state())).await;
        assert!(view.is_loading);
        assert!(view.identity.is_none());
    }

    #[tokio::test]
    async fn logout_succeeds_when_signed_out() {
        assert_eq!(logout(State(state())).await.unwrap(), StatusCode::NO_CONTENT);
    }
}
