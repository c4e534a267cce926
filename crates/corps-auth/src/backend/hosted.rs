//! Backend client for the hosted auth and REST services.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use url::Url;

use super::{AuthEvent, AuthEvents, EVENT_CHANNEL_CAPACITY, IdentityBackend};
use crate::error::{AuthError, Result};
use crate::redact::{mask_email, redact};
use crate::store::{SESSION_KEY, SharedStore, load_json, save_json};
use crate::user::{CadetProfile, Principal, UserRow};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sessions are refreshed this long before they actually expire.
const REFRESH_BUFFER_SECS: i64 = 60;

/// Tokens of a signed-in backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub principal: Principal,
}

impl StoredSession {
    /// Check if the access token is expired (with buffer time).
    pub fn is_expired(&self) -> bool {
        Utc::now() + chrono::Duration::seconds(REFRESH_BUFFER_SECS) >= self.expires_at
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> StoredSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| {
                Utc::now() + chrono::Duration::seconds(self.expires_in.unwrap_or(3600))
            });

        StoredSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            principal: Principal::new(self.user.id, self.user.email.unwrap_or_default()),
        }
    }
}

/// Error body shapes returned by the auth and REST services.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn text(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_default()
    }

    fn code(&self) -> String {
        match &self.code {
            Some(Value::String(code)) => code.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Which service produced a failed response.
#[derive(Debug, Clone, Copy)]
enum Service {
    Auth,
    Rest,
}

/// Local view of the backend session.
#[derive(Debug, Default)]
struct SessionSlot {
    /// Whether the durable copy has been read yet.
    loaded: bool,
    current: Option<StoredSession>,
}

/// Client for the hosted identity service and its row store.
///
/// The session tokens are persisted in the durable store under
/// `auth_session` so a restart resumes the same backend session.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use corps_auth::{HostedBackend, MemoryStore};
///
/// # fn example() -> corps_auth::Result<()> {
/// let backend = HostedBackend::builder()
///     .base_url("https://project.example.co")
///     .anon_key("public-anon-key")
///     .store(Arc::new(MemoryStore::new()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HostedBackend {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    timeout: Duration,
    store: SharedStore,
    session: Mutex<SessionSlot>,
    events: broadcast::Sender<AuthEvent>,
}

impl HostedBackend {
    /// Create a new backend builder.
    pub fn builder() -> HostedBackendBuilder {
        HostedBackendBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current session tokens, refreshed if they are about to expire.
    pub async fn session(&self) -> Result<Option<StoredSession>> {
        self.fresh_session().await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session handling
    // ─────────────────────────────────────────────────────────────────────────

    async fn fresh_session(&self) -> Result<Option<StoredSession>> {
        let mut slot = self.session.lock().await;
        self.ensure_loaded(&mut slot).await;

        let Some(session) = slot.current.clone() else {
            return Ok(None);
        };

        if !session.is_expired() {
            return Ok(Some(session));
        }

        info!("Session expired, refreshing...");
        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.persist(&refreshed).await;
                slot.current = Some(refreshed.clone());
                let _ = self
                    .events
                    .send(AuthEvent::token_refreshed(refreshed.principal.clone()));
                Ok(Some(refreshed))
            }
            Err(e) if e.is_unreachable() => Err(e),
            Err(e) => {
                warn!(error = %e, code = e.code(), "Session refresh rejected, signing out locally");
                slot.current = None;
                self.forget().await;
                let _ = self.events.send(AuthEvent::signed_out());
                Ok(None)
            }
        }
    }

    async fn ensure_loaded(&self, slot: &mut SessionSlot) {
        if slot.loaded {
            return;
        }
        slot.current = match load_json::<StoredSession>(self.store.as_ref(), SESSION_KEY).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored session");
                None
            }
        };
        slot.loaded = true;
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredSession> {
        let mut url = self.url("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let token: TokenResponse = self.handle_response(response, Service::Auth).await?;
        Ok(token.into_session())
    }

    /// Forget the local session after the backend refused it.
    async fn drop_session(&self) {
        {
            let mut slot = self.session.lock().await;
            slot.loaded = true;
            slot.current = None;
        }
        self.forget().await;
        let _ = self.events.send(AuthEvent::signed_out());
    }

    async fn persist(&self, session: &StoredSession) {
        if let Err(e) = save_json(self.store.as_ref(), SESSION_KEY, session).await {
            warn!(error = %e, "Failed to persist backend session");
        }
    }

    async fn forget(&self) {
        if let Err(e) = self.store.remove(SESSION_KEY).await {
            warn!(error = %e, "Failed to remove persisted backend session");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(AuthError::from)
    }

    /// Bearer for row-store requests: the session token, or the anon key.
    async fn bearer(&self) -> Result<String> {
        Ok(self
            .fresh_session()
            .await?
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone()))
    }

    async fn select_first<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        filter_column: &str,
        filter_value: &str,
        columns: &str,
    ) -> Result<Option<T>> {
        let mut url = self.url(&format!("rest/v1/{}", table))?;
        url.query_pairs_mut()
            .append_pair(filter_column, &format!("eq.{}", filter_value))
            .append_pair("select", columns)
            .append_pair("limit", "1");

        let bearer = self.bearer().await?;
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .bearer_auth(bearer)
            .send()
            .await?;

        let rows: Vec<T> = self.handle_response(response, Service::Rest).await?;
        Ok(rows.into_iter().next())
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        service: Service,
    ) -> Result<T> {
        if response.status().is_success() {
            return response.json().await.map_err(AuthError::from);
        }
        Err(Self::error_from(response, service).await)
    }

    async fn error_from(response: reqwest::Response, service: Service) -> AuthError {
        let status = response.status();
        if status.as_u16() == 429 {
            return AuthError::RateLimited;
        }
        if status.is_server_error() {
            return AuthError::BackendUnreachable(format!("HTTP {}", status.as_u16()));
        }

        let raw: Value = response.json().await.unwrap_or(Value::Null);
        debug!(status = status.as_u16(), body = %redact(&raw), "Backend error response");
        let body: ErrorBody = serde_json::from_value(raw).unwrap_or_default();
        let text = body.text();
        let text = if text.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            text
        };

        match service {
            Service::Auth => AuthError::from_auth_message(&text),
            Service::Rest => AuthError::from_row_store(&body.code(), &text),
        }
    }
}

#[async_trait]
impl IdentityBackend for HostedBackend {
    async fn current_principal(&self) -> Result<Option<Principal>> {
        let Some(session) = self.fresh_session().await? else {
            return Ok(None);
        };

        // Local tokens may have been revoked server-side
        let url = self.url("auth/v1/user")?;
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            info!(status, "Backend session no longer valid");
            self.drop_session().await;
            return Ok(None);
        }

        let user: TokenUser = self.handle_response(response, Service::Auth).await?;
        Ok(Some(Principal::new(
            user.id,
            user.email.unwrap_or(session.principal.email),
        )))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal> {
        let mut url = self.url("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        debug!(email = %mask_email(email), "Signing in");
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let token: TokenResponse = self.handle_response(response, Service::Auth).await?;
        let session = token.into_session();
        let principal = session.principal.clone();

        self.persist(&session).await;
        {
            let mut slot = self.session.lock().await;
            slot.loaded = true;
            slot.current = Some(session);
        }

        let _ = self.events.send(AuthEvent::signed_in(principal.clone()));
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<()> {
        let previous = {
            let mut slot = self.session.lock().await;
            self.ensure_loaded(&mut slot).await;
            slot.current.take()
        };
        self.forget().await;
        let _ = self.events.send(AuthEvent::signed_out());

        let Some(session) = previous else {
            return Ok(());
        };

        let url = self.url("auth/v1/logout")?;
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response, Service::Auth).await)
        }
    }

    fn subscribe_auth_events(&self) -> AuthEvents {
        self.events.subscribe()
    }

    async fn find_user_record_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.select_first("users", "email", email, "id,email,name,role")
            .await
    }

    async fn find_cadet_profile_by_principal_id(
        &self,
        principal_id: &str,
    ) -> Result<Option<CadetProfile>> {
        self.select_first("cadets", "auth_user_id", principal_id, "id,platoon,squad")
            .await
    }
}

/// Builder for creating a [`HostedBackend`].
#[derive(Debug, Default)]
pub struct HostedBackendBuilder {
    base_url: Option<String>,
    anon_key: Option<String>,
    timeout: Option<Duration>,
    store: Option<SharedStore>,
}

impl HostedBackendBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the public (anon) API key.
    pub fn anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set where session tokens are persisted.
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the backend.
    pub fn build(self) -> Result<HostedBackend> {
        let base_url = self
            .base_url
            .ok_or_else(|| AuthError::Config("base_url is required".to_string()))?;
        let anon_key = self
            .anon_key
            .ok_or_else(|| AuthError::Config("anon_key is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| AuthError::Config("store is required".to_string()))?;

        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&anon_key)
            .map_err(|_| AuthError::Config("Invalid anon key".to_string()))?;
        headers.insert("apikey", key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("corps-auth/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(HostedBackend {
            http,
            base_url,
            anon_key,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            store,
            session: Mutex::new(SessionSlot::default()),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DurableStore, MemoryStore};
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ANON: &str = "anon-key";

    fn token_body(access: &str, expires_in: i64) -> serde_json::Value {
        serde_json::json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": expires_in,
            "refresh_token": "refresh-1",
            "user": { "id": "auth-1", "email": "admin@nkkk.ru" }
        })
    }

    fn backend(server: &MockServer, store: Arc<MemoryStore>) -> HostedBackend {
        HostedBackend::builder()
            .base_url(server.uri())
            .anon_key(ANON)
            .store(store)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_fields() {
        let err = HostedBackendBuilder::new().anon_key("k").build().unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));

        let err = HostedBackendBuilder::new()
            .base_url("http://localhost")
            .anon_key("k")
            .build()
            .unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn test_builder_normalizes_base_url() {
        let backend = HostedBackend::builder()
            .base_url("http://localhost:54321/project")
            .anon_key("k")
            .store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        assert_eq!(backend.base_url().as_str(), "http://localhost:54321/project/");
    }

    #[test]
    fn test_stored_session_expiry_buffer() {
        let mut session = StoredSession {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(30),
            principal: Principal::new("1", "a@x"),
        };
        assert!(session.is_expired());

        session.expires_at = Utc::now() + chrono::Duration::seconds(3600);
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_sign_in_persists_session_and_emits_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", ANON))
            .and(body_json(serde_json::json!({
                "email": "admin@nkkk.ru",
                "password": "admin123"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let backend = backend(&server, store.clone());
        let mut events = backend.subscribe_auth_events();

        let principal = backend
            .sign_in_with_password("admin@nkkk.ru", "admin123")
            .await
            .unwrap();
        assert_eq!(principal, Principal::new("auth-1", "admin@nkkk.ru"));
        assert!(store.contains(SESSION_KEY).await);

        let event = events.recv().await.unwrap();
        assert_eq!(event, AuthEvent::signed_in(principal.clone()));

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "auth-1",
                "email": "admin@nkkk.ru"
            })))
            .mount(&server)
            .await;
        assert_eq!(backend.current_principal().await.unwrap(), Some(principal));
    }

    #[tokio::test]
    async fn test_sign_in_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let backend = backend(&server, Arc::new(MemoryStore::new()));
        let err = backend
            .sign_in_with_password("admin@nkkk.ru", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_in_rate_limited_and_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = backend(&server, Arc::new(MemoryStore::new()));
        let first = backend.sign_in_with_password("a@x", "p").await.unwrap_err();
        assert!(matches!(first, AuthError::RateLimited));

        let second = backend.sign_in_with_password("a@x", "p").await.unwrap_err();
        assert!(second.is_unreachable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let backend = HostedBackend::builder()
            .base_url("http://127.0.0.1:1")
            .anon_key(ANON)
            .store(Arc::new(MemoryStore::new()))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let err = backend.sign_in_with_password("a@x", "p").await.unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_restores_persisted_session() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let session = StoredSession {
            access_token: "stored".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(3600),
            principal: Principal::new("auth-9", "c@x"),
        };
        save_json(store.as_ref(), SESSION_KEY, &session).await.unwrap();
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer stored"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "auth-9",
                "email": "c@x"
            })))
            .mount(&server)
            .await;

        let backend = backend(&server, store);
        assert_eq!(
            backend.current_principal().await.unwrap(),
            Some(Principal::new("auth-9", "c@x"))
        );
    }

    #[tokio::test]
    async fn test_revoked_session_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "msg": "invalid JWT"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let session = StoredSession {
            access_token: "revoked".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(3600),
            principal: Principal::new("auth-9", "c@x"),
        };
        save_json(store.as_ref(), SESSION_KEY, &session).await.unwrap();

        let backend = backend(&server, store.clone());
        let mut events = backend.subscribe_auth_events();

        assert_eq!(backend.current_principal().await.unwrap(), None);
        assert!(!store.contains(SESSION_KEY).await);
        assert!(events.recv().await.unwrap().ends_session());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(serde_json::json!({ "refresh_token": "old-refresh" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let stale = StoredSession {
            access_token: "old".into(),
            refresh_token: "old-refresh".into(),
            expires_at: Utc::now() - chrono::Duration::seconds(10),
            principal: Principal::new("auth-1", "admin@nkkk.ru"),
        };
        save_json(store.as_ref(), SESSION_KEY, &stale).await.unwrap();

        let backend = backend(&server, store.clone());
        let session = backend.session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "access-2");

        let persisted: StoredSession = load_json(store.as_ref(), SESSION_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.access_token, "access-2");
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "refresh_token_not_found",
                "msg": "Invalid Refresh Token: Refresh Token Not Found"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let stale = StoredSession {
            access_token: "old".into(),
            refresh_token: "gone".into(),
            expires_at: Utc::now() - chrono::Duration::seconds(10),
            principal: Principal::new("auth-1", "admin@nkkk.ru"),
        };
        save_json(store.as_ref(), SESSION_KEY, &stale).await.unwrap();

        let backend = backend(&server, store.clone());
        let mut events = backend.subscribe_auth_events();

        assert_eq!(backend.current_principal().await.unwrap(), None);
        assert!(!store.contains(SESSION_KEY).await);
        assert!(events.recv().await.unwrap().ends_session());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_remote_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", 3600)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let backend = backend(&server, store.clone());
        backend.sign_in_with_password("admin@nkkk.ru", "pw").await.unwrap();

        let result = backend.sign_out().await;
        assert!(result.is_err());
        assert!(!store.contains(SESSION_KEY).await);
        assert_eq!(backend.current_principal().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_local() {
        let server = MockServer::start().await;
        let backend = backend(&server, Arc::new(MemoryStore::new()));
        backend.sign_out().await.unwrap();
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_find_user_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.admin@nkkk.ru"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "row-1", "email": "admin@nkkk.ru", "name": "Administrator", "role": "admin" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.ghost@nkkk.ru"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let backend = backend(&server, Arc::new(MemoryStore::new()));
        let row = backend
            .find_user_record_by_email("admin@nkkk.ru")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.name, "Administrator");
        assert_eq!(row.role, "admin");

        assert_eq!(
            backend.find_user_record_by_email("ghost@nkkk.ru").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_find_cadet_profile_and_row_store_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/cadets"))
            .and(query_param("auth_user_id", "eq.auth-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "cadet-1", "platoon": "10-1", "squad": 2 }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/cadets"))
            .and(query_param("auth_user_id", "eq.auth-2"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "code": "42501",
                "message": "permission denied for table cadets"
            })))
            .mount(&server)
            .await;

        let backend = backend(&server, Arc::new(MemoryStore::new()));
        let profile = backend
            .find_cadet_profile_by_principal_id("auth-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.platoon, "10-1");
        assert_eq!(profile.squad, 2);

        let err = backend
            .find_cadet_profile_by_principal_id("auth-2")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn test_unreadable_stored_session_is_dropped() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        store.save(SESSION_KEY, "garbage").await.unwrap();

        let backend = backend(&server, store);
        assert_eq!(backend.current_principal().await.unwrap(), None);
    }
}
