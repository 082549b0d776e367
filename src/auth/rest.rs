// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for a hosted identity provider.
//!
//! Speaks the GoTrue-style auth API (`/auth/v1/*`) and the PostgREST-style
//! record API (`/rest/v1/{table}`) exposed by the Founders Club backend.
//!
//! ## Events
//!
//! The provider has no server push, so the client publishes auth state
//! changes itself whenever it signs in, refreshes, or signs out.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::client::{AuthClient, RecordClient};
use super::error::AuthClientError;
use super::events::{AuthEvent, AuthEventKind, AuthSubscription, DEFAULT_EVENT_CAPACITY};
use super::identity::{Identity, Session};
use super::roles::RoleRecord;
use crate::records::{RecordQuery, ADMINS_TABLE};

/// Timeout applied to every provider request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Token endpoint response (password and refresh grants).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + chrono::Duration::seconds(secs))
            });

        Session {
            user: self.user,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Identity provider reached over HTTPS.
pub struct RestAuthClient {
    base_url: Url,
    anon_key: String,
    http: Client,
    session: RwLock<Option<Session>>,
    /// Serializes refresh-token exchanges; a refresh token is single use.
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<AuthEvent>,
}

impl RestAuthClient {
    /// Create a client for the provider at `base_url`.
    ///
    /// # Arguments
    /// - `base_url`: Project URL (e.g. `https://xyz.example.co`)
    /// - `anon_key`: Public API key sent as the `apikey` header
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, AuthClientError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AuthClientError::Unavailable(format!("invalid provider URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);

        Ok(Self {
            base_url,
            anon_key: anon_key.into(),
            http,
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            events,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthClientError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthClientError::Unavailable(format!("invalid endpoint {path}: {e}")))
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        debug!(event = %kind, "Publishing auth event");
        let _ = self.events.send(AuthEvent::new(kind, session));
    }

    async fn bearer(&self) -> String {
        match &*self.session.read().await {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        }
    }

    /// Password sign-in. Emits `SIGNED_IN` on success.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthClientError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status().as_u16() == 400 {
            return Err(AuthClientError::InvalidCredentials);
        }

        let token: TokenResponse = check(response).await?.json().await?;
        let session = token.into_session(Utc::now());
        *self.session.write().await = Some(session.clone());

        info!(user_id = %session.user.id, "Signed in");
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Exchange the refresh token for a new session.
    ///
    /// Emits `TOKEN_REFRESHED` on success. If the provider rejects the
    /// refresh token the local session is dropped and `SIGNED_OUT` is emitted.
    pub async fn refresh_session(&self) -> Result<Option<Session>, AuthClientError> {
        let _refresh = self.refresh_lock.lock().await;
        self.exchange_refresh_token().await
    }

    /// Refresh only if the cached session is still expired once the refresh
    /// lock is held. Callers that queued behind a refresh reuse its session.
    async fn refresh_if_expired(&self) -> Result<Option<Session>, AuthClientError> {
        let _refresh = self.refresh_lock.lock().await;
        match &*self.session.read().await {
            None => return Ok(None),
            Some(session) if !session.is_expired() => return Ok(Some(session.clone())),
            Some(_) => {}
        }

        debug!("Session expired, refreshing");
        self.exchange_refresh_token().await
    }

    async fn exchange_refresh_token(&self) -> Result<Option<Session>, AuthClientError> {
        let refresh_token = match &*self.session.read().await {
            Some(Session {
                refresh_token: Some(token),
                ..
            }) => token.clone(),
            _ => return Ok(None),
        };

        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        match check(response).await {
            Ok(response) => {
                let token: TokenResponse = response.json().await?;
                let session = token.into_session(Utc::now());
                *self.session.write().await = Some(session.clone());
                self.emit(AuthEventKind::TokenRefreshed, Some(session.clone()));
                Ok(Some(session))
            }
            Err(e) if e.is_auth_rejection() || matches!(e, AuthClientError::Status { status: 400, .. }) => {
                warn!(error = %e, "Refresh token rejected, signing out");
                *self.session.write().await = None;
                self.emit(AuthEventKind::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke the session and emit `SIGNED_OUT`.
    ///
    /// The local session is cleared even when the revoke call fails.
    pub async fn sign_out(&self) -> Result<(), AuthClientError> {
        let session = self.session.write().await.take();
        let result = match session {
            Some(session) => {
                let url = self.endpoint("auth/v1/logout")?;
                let sent = self
                    .http
                    .post(url)
                    .header("apikey", &self.anon_key)
                    .bearer_auth(&session.access_token)
                    .send()
                    .await;
                match sent {
                    Ok(response) => check(response).await.map(|_| ()),
                    Err(e) => Err(e.into()),
                }
            }
            None => Ok(()),
        };

        if let Err(e) = &result {
            warn!(error = %e, "Provider sign-out failed; local session cleared");
        }
        self.emit(AuthEventKind::SignedOut, None);
        result
    }

    fn records_url(&self, table: &str) -> Result<Url, AuthClientError> {
        self.endpoint(&format!("rest/v1/{table}"))
    }
}

/// Turn a non-success response into [`AuthClientError::Status`].
async fn check(response: Response) -> Result<Response, AuthClientError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(AuthClientError::Status { status, message })
}

/// Total from a PostgREST `Content-Range` header (`0-9/42` or `*/0`).
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.parse().ok()
}

impl AuthClient for RestAuthClient {
    async fn current_user(&self) -> Result<Option<Identity>, AuthClientError> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };

        let response = self
            .http
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if response.status().as_u16() == 401 {
            warn!("Provider no longer recognises the session token, signing out");
            let mut cached = self.session.write().await;
            // A sign-in or refresh may have replaced the rejected token meanwhile.
            if cached
                .as_ref()
                .is_some_and(|current| current.access_token == session.access_token)
            {
                *cached = None;
                drop(cached);
                self.emit(AuthEventKind::SignedOut, None);
            }
            return Ok(None);
        }

        Ok(Some(check(response).await?.json().await?))
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthClientError> {
        match &*self.session.read().await {
            None => return Ok(None),
            Some(session) if !session.is_expired() => return Ok(Some(session.clone())),
            Some(_) => {}
        }

        self.refresh_if_expired().await
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn query_role(&self, user_id: &str) -> Result<Option<RoleRecord>, AuthClientError> {
        let query = RecordQuery::new(ADMINS_TABLE)
            .select(&["role"])
            .eq("user_id", user_id)
            .limit(1);

        let rows = self.select(&query).await?;
        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| AuthClientError::InvalidResponse(format!("role row: {e}"))),
            None => Ok(None),
        }
    }
}

impl RecordClient for RestAuthClient {
    async fn select(&self, query: &RecordQuery) -> Result<Vec<Value>, AuthClientError> {
        let response = self
            .http
            .get(self.records_url(query.table())?)
            .query(&query.to_params())
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, AuthClientError> {
        let response = self
            .http
            .post(self.records_url(table)?)
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer().await)
            .json(&row)
            .send()
            .await?;

        let rows: Vec<Value> = check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AuthClientError::InvalidResponse("insert returned no rows".into()))
    }

    async fn delete(&self, query: &RecordQuery) -> Result<usize, AuthClientError> {
        let response = self
            .http
            .delete(self.records_url(query.table())?)
            .query(&query.filters_only().to_params())
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        let rows: Vec<Value> = check(response).await?.json().await?;
        Ok(rows.len())
    }

    async fn count(&self, query: &RecordQuery) -> Result<usize, AuthClientError> {
        let response = self
            .http
            .get(self.records_url(query.table())?)
            .query(&query.filters_only().to_params())
            .header("apikey", &self.anon_key)
            .header("Prefer", "count=exact")
            .header(header::RANGE, "0-0")
            .header("Range-Unit", "items")
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        let response = check(response).await?;
        let total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        match total {
            Some(total) => Ok(total),
            None => Err(AuthClientError::InvalidResponse(
                "count response missing Content-Range".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::events::SubscriptionRecv;
    use axum::{
        extract::{Query, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Local stand-in for the provider's auth endpoints.
    #[derive(Clone)]
    struct FakeProvider {
        /// Lifetime of sessions issued by the password grant, in seconds.
        sign_in_ttl: i64,
        refreshes: Arc<AtomicUsize>,
        reject_user: Arc<AtomicBool>,
    }

    impl FakeProvider {
        fn new(sign_in_ttl: i64) -> Self {
            Self {
                sign_in_ttl,
                refreshes: Arc::new(AtomicUsize::new(0)),
                reject_user: Arc::new(AtomicBool::new(false)),
            }
        }

        async fn serve(&self) -> String {
            let app = Router::new()
                .route("/auth/v1/token", post(fake_token))
                .route("/auth/v1/user", get(fake_user))
                .with_state(self.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            format!("http://{addr}")
        }
    }

    fn ada_json() -> Value {
        json!({"id": "u-ada", "email": "ada@example.com"})
    }

    async fn fake_token(
        State(fake): State<FakeProvider>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        if params.get("grant_type").map(String::as_str) == Some("refresh_token") {
            let issued = fake.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            // Keep the exchange open long enough for other callers to queue.
            tokio::time::sleep(Duration::from_millis(50)).await;
            return Json(json!({
                "access_token": format!("fresh-{issued}"),
                "refresh_token": format!("refresh-{issued}"),
                "expires_in": 3600,
                "user": ada_json(),
            }));
        }
        Json(json!({
            "access_token": "initial",
            "refresh_token": "refresh-0",
            "expires_in": fake.sign_in_ttl,
            "user": ada_json(),
        }))
    }

    async fn fake_user(State(fake): State<FakeProvider>) -> Result<Json<Value>, StatusCode> {
        if fake.reject_user.load(Ordering::SeqCst) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(ada_json()))
    }

    async fn next_kind(subscription: &mut AuthSubscription) -> Option<AuthEventKind> {
        match tokio::time::timeout(Duration::from_millis(200), subscription.recv()).await {
            Ok(SubscriptionRecv::Event(event)) => Some(event.kind),
            _ => None,
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let fake = FakeProvider::new(-10);
        let client = RestAuthClient::new(&fake.serve().await, "anon").unwrap();
        client
            .sign_in_with_password("ada@example.com", "pw")
            .await
            .unwrap();
        let mut subscription = client.subscribe();

        let (user, session) = tokio::join!(client.current_user(), client.current_session());

        assert_eq!(user.unwrap().map(|u| u.id), Some("u-ada".to_string()));
        assert_eq!(session.unwrap().unwrap().access_token, "fresh-1");
        assert_eq!(fake.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(next_kind(&mut subscription).await, Some(AuthEventKind::TokenRefreshed));
        assert_eq!(next_kind(&mut subscription).await, None);
    }

    #[tokio::test]
    async fn rejected_token_drops_cached_session() {
        let fake = FakeProvider::new(3600);
        let client = RestAuthClient::new(&fake.serve().await, "anon").unwrap();
        client
            .sign_in_with_password("ada@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(
            client.current_user().await.unwrap().map(|u| u.id),
            Some("u-ada".to_string())
        );

        let mut subscription = client.subscribe();
        fake.reject_user.store(true, Ordering::SeqCst);

        assert_eq!(client.current_user().await.unwrap(), None);
        assert_eq!(client.current_session().await.unwrap(), None);
        assert_eq!(next_kind(&mut subscription).await, Some(AuthEventKind::SignedOut));
        assert_eq!(fake.refreshes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = RestAuthClient::new("https://xyz.example.co/project", "anon").unwrap();
        assert_eq!(client.base_url().as_str(), "https://xyz.example.co/project/");
        assert_eq!(
            client.endpoint("auth/v1/user").unwrap().as_str(),
            "https://xyz.example.co/project/auth/v1/user"
        );
        assert_eq!(
            client.records_url("events").unwrap().as_str(),
            "https://xyz.example.co/project/rest/v1/events"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            RestAuthClient::new("not a url", "anon"),
            Err(AuthClientError::Unavailable(_))
        ));
    }

    #[test]
    fn token_response_prefers_absolute_expiry() {
        let json = r#"{
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1900000000,
            "user": {"id": "u-1", "email": "ada@example.com"}
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        let session = token.into_session(Utc::now());

        assert_eq!(session.user.id, "u-1");
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_900_000_000);
    }

    #[test]
    fn token_response_falls_back_to_relative_expiry() {
        let json = r#"{"access_token": "a", "expires_in": 60, "user": {"id": "u-1"}}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        let now = Utc::now();
        let session = token.into_session(now);
        assert_eq!(session.expires_at, Some(now + chrono::Duration::seconds(60)));
    }

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
    }

    #[tokio::test]
    async fn signed_out_client_needs_no_network() {
        let client = RestAuthClient::new("https://xyz.example.co", "anon").unwrap();
        assert_eq!(client.current_session().await.unwrap(), None);
        assert_eq!(client.current_user().await.unwrap(), None);
        assert_eq!(client.refresh_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_out_without_session_emits_event() {
        let client = RestAuthClient::new("https://xyz.example.co", "anon").unwrap();
        let mut subscription = client.subscribe();
        client.sign_out().await.unwrap();

        match subscription.recv().await {
            crate::auth::events::SubscriptionRecv::Event(event) => {
                assert_eq!(event.kind, AuthEventKind::SignedOut)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
