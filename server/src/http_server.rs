use crate::error::MailboxError;
use crate::identity::{self, Caller, IdentityResolver};
use crate::mailbox::{InboxResult, MailboxCache};
use crate::session::{SessionStore, SessionStoreError, SessionStoreRef};
use axum::{
    extract::{rejection::QueryRejection, ConnectInfo, Query, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tempmail_core::InboxMessage;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const NO_MESSAGES: &str = "No new emails yet.";

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    store: SessionStoreRef,
    cache: Arc<MailboxCache>,
    resolver: Arc<dyn IdentityResolver>,
}

impl AppState {
    pub fn new(
        store: SessionStoreRef,
        cache: MailboxCache,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            store,
            cache: Arc::new(cache),
            resolver,
        }
    }

    fn caller(
        &self,
        query: &IdentityQuery,
        headers: &HeaderMap,
        peer: Option<ConnectInfo<SocketAddr>>,
    ) -> Caller {
        self.resolver
            .resolve(query.user_id.as_deref(), headers, peer.map(|ConnectInfo(addr)| addr))
    }
}

/// Identity selection shared by every mailbox route
#[derive(Debug, Default, Deserialize)]
pub struct IdentityQuery {
    user_id: Option<String>,
}

impl IdentityQuery {
    /// Unwrap the extractor, turning a malformed query string into a JSON 400
    fn from_extracted(query: Result<Query<Self>, QueryRejection>) -> Result<Self, ApiError> {
        query
            .map(|Query(query)| query)
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
    }
}

/// Response model for address lookups
#[derive(Debug, Serialize)]
pub struct EmailResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    real_ip: Option<String>,
    email: String,
    /// Epoch milliseconds, as the provider reports it
    expires_at: i64,
    cached: bool,
}

/// Response model for inbox reads
#[derive(Debug, Serialize)]
pub struct InboxResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    real_ip: Option<String>,
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    inbox: Option<Vec<InboxMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Mailbox(MailboxError),
}

impl From<MailboxError> for ApiError {
    fn from(e: MailboxError) -> Self {
        Self::Mailbox(e)
    }
}

impl From<SessionStoreError> for ApiError {
    fn from(e: SessionStoreError) -> Self {
        Self::Mailbox(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => {
                info!(error = %msg, "Rejected request");
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: msg })).into_response()
            }
            Self::Mailbox(e) => {
                let status = match &e {
                    MailboxError::SessionInit(_) => StatusCode::SERVICE_UNAVAILABLE,
                    MailboxError::EmailRetrievalFailed(_) | MailboxError::InboxRetrievalFailed(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    MailboxError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                error!(error = %e, status = status.as_u16(), "Request failed");
                let body = Json(ErrorResponse {
                    error: e.to_string(),
                });
                (status, body).into_response()
            }
        }
    }
}

/// Build the router with all routes and middleware
pub fn router(state: AppState) -> Router {
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/get_email", get(get_email))
        .route("/get_inbox", get(get_inbox))
        .route("/reset_email", get(reset_email))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(middleware::from_fn(log_request)),
        )
        .with_state(state)
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn run_server<F>(state: AppState, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting HTTP server on {}", addr);

    let app = router(state);

    // Start the server
    axum::Server::try_bind(&addr)
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))
}

/// Log the caller address and path of every request
async fn log_request<B>(request: Request<B>, next: Next<B>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = identity::real_ip(request.headers(), peer).unwrap_or_else(|| "unknown".to_string());
    info!(ip = %ip, path = %request.uri().path(), "Incoming request");
    next.run(request).await
}

/// Service metadata and endpoint list
async fn index(headers: HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> Json<Value> {
    let real_ip = identity::real_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    Json(json!({
        "real_ip": real_ip,
        "message": "Welcome to the Temp Mail API",
        "description": "This API allows you to generate temporary emails and fetch emails received in the inbox.",
        "endpoints": {
            "/get_email?user_id=YOUR_ID": "Get a temporary email address",
            "/get_inbox?user_id=YOUR_ID": "Retrieve all emails in the inbox",
            "/reset_email?user_id=YOUR_ID": "Reset and generate a new email"
        },
        "note": "This is an unofficial API wrapper for TempMail. Use responsibly."
    }))
}

/// Health check handler
async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let sessions = state.store.len().await?;
    Ok(Json(json!({ "status": "ok", "sessions": sessions })))
}

/// Handler for address lookups
async fn get_email(
    State(state): State<AppState>,
    query: Result<Query<IdentityQuery>, QueryRejection>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<EmailResponse>, ApiError> {
    let query = IdentityQuery::from_extracted(query)?;
    let caller = state.caller(&query, &headers, peer);
    let session = state.store.get_or_create(&caller.identity).await?;
    let result = state.cache.get_address(&session, false).await?;

    Ok(Json(EmailResponse {
        real_ip: caller.real_ip,
        email: result.email,
        expires_at: result.expires_at.timestamp_millis(),
        cached: result.cached,
    }))
}

/// Handler for inbox reads
async fn get_inbox(
    State(state): State<AppState>,
    query: Result<Query<IdentityQuery>, QueryRejection>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<InboxResponse>, ApiError> {
    let query = IdentityQuery::from_extracted(query)?;
    let caller = state.caller(&query, &headers, peer);
    let session = state.store.get_or_create(&caller.identity).await?;

    let response = match state.cache.get_inbox_messages(&session).await? {
        InboxResult::Empty { email } => InboxResponse {
            real_ip: caller.real_ip,
            email,
            inbox: None,
            message: Some(NO_MESSAGES.to_string()),
        },
        InboxResult::Messages { email, messages } => InboxResponse {
            real_ip: caller.real_ip,
            email,
            inbox: Some(messages),
            message: None,
        },
    };

    Ok(Json(response))
}

/// Handler that discards the caller's session and forces a new address
async fn reset_email(
    State(state): State<AppState>,
    query: Result<Query<IdentityQuery>, QueryRejection>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<EmailResponse>, ApiError> {
    let query = IdentityQuery::from_extracted(query)?;
    let caller = state.caller(&query, &headers, peer);
    let session = state.store.reset(&caller.identity).await?;
    let result = state.cache.get_address(&session, true).await?;
    info!(identity = %caller.identity, "Reset mailbox session");

    Ok(Json(EmailResponse {
        real_ip: caller.real_ip,
        email: result.email,
        expires_at: result.expires_at.timestamp_millis(),
        cached: result.cached,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ForwardedIdentityResolver;
    use crate::session::InMemorySessionStore;
    use crate::testing::{raw_message, ScriptedFactory};
    use axum::body::Body;
    use tempmail_core::ProviderError;
    use tower::ServiceExt;

    fn app(factory: &Arc<ScriptedFactory>) -> (Router, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new(factory.clone()));
        let state = AppState::new(
            store.clone() as SessionStoreRef,
            MailboxCache::default(),
            Arc::new(ForwardedIdentityResolver),
        );
        (router(state), store)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let factory = ScriptedFactory::new();
        let (app, _) = app(&factory);

        let (status, body) = get_json(&app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["real_ip"], "198.51.100.4");
        assert!(body["endpoints"]["/get_inbox?user_id=YOUR_ID"].is_string());
    }

    #[tokio::test]
    async fn test_get_email_then_cached() {
        let factory = ScriptedFactory::new();
        let (app, _) = app(&factory);

        let (status, first) = get_json(&app, "/get_email?user_id=alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["email"], "box1@tempmail.so");
        assert_eq!(first["cached"], false);
        assert!(first["expires_at"].is_i64());

        let (_, second) = get_json(&app, "/get_email?user_id=alice").await;
        assert_eq!(second["email"], "box1@tempmail.so");
        assert_eq!(second["cached"], true);
        assert_eq!(factory.created().len(), 1);
    }

    #[tokio::test]
    async fn test_identity_falls_back_to_forwarded_ip() {
        let factory = ScriptedFactory::new();
        let (app, store) = app(&factory);

        get_json(&app, "/get_email").await;

        assert_eq!(store.identities(), vec!["198.51.100.4".to_string()]);
    }

    #[tokio::test]
    async fn test_get_inbox_empty() {
        let factory = ScriptedFactory::new();
        let (app, _) = app(&factory);

        let (status, body) = get_json(&app, "/get_inbox?user_id=alice").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "box1@tempmail.so");
        assert_eq!(body["message"], NO_MESSAGES);
        assert!(body.get("inbox").is_none());
    }

    #[tokio::test]
    async fn test_get_inbox_with_messages() {
        let factory = ScriptedFactory::new();
        let (app, _) = app(&factory);
        get_json(&app, "/get_email?user_id=alice").await;
        factory.last().push_inbox(Ok(vec![raw_message(
            "noreply@example.com",
            "Your code is 482913",
            "body",
        )]));

        let (status, body) = get_json(&app, "/get_inbox?user_id=alice").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inbox"][0]["otp"], "482913");
        assert_eq!(body["inbox"][0]["from"], "noreply@example.com");
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_get_inbox_failure_is_error_json() {
        let factory = ScriptedFactory::new();
        let (app, _) = app(&factory);
        get_json(&app, "/get_email?user_id=alice").await;
        factory
            .last()
            .push_inbox(Err(ProviderError::UpstreamUnavailable("503".to_string())));

        let (status, body) = get_json(&app, "/get_inbox?user_id=alice").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to check inbox"));
    }

    #[tokio::test]
    async fn test_get_email_failure_is_bad_gateway() {
        let factory = ScriptedFactory::new();
        factory.fail_mailbox(ProviderError::UpstreamMalformedResponse("no email".to_string()));
        let (app, store) = app(&factory);

        let (status, body) = get_json(&app, "/get_email?user_id=alice").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to retrieve email address"));
        // warm-up succeeded, so the session stays registered without a lease
        assert_eq!(factory.last().mailbox_calls(), 2);
        assert_eq!(store.session("alice").unwrap().mailbox(), None);
    }

    #[tokio::test]
    async fn test_reset_email_failure_is_bad_gateway() {
        let factory = ScriptedFactory::new();
        let (app, _) = app(&factory);
        get_json(&app, "/get_email?user_id=alice").await;
        factory.fail_mailbox(ProviderError::UpstreamUnavailable("502".to_string()));

        let (status, body) = get_json(&app, "/reset_email?user_id=alice").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to retrieve email address"));
        assert_eq!(factory.created().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_query_is_json_bad_request() {
        let factory = ScriptedFactory::new();
        let (app, store) = app(&factory);

        for uri in [
            "/get_email?user_id=a&user_id=b",
            "/get_inbox?user_id=a&user_id=b",
            "/reset_email?user_id=a&user_id=b",
        ] {
            let (status, body) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert!(body["error"].is_string(), "{}", uri);
        }
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(factory.created().is_empty());
    }

    #[tokio::test]
    async fn test_reset_email_creates_new_session() {
        let factory = ScriptedFactory::new();
        let (app, store) = app(&factory);

        get_json(&app, "/get_email?user_id=alice").await;
        let before = store.session("alice").unwrap();
        let (status, body) = get_json(&app, "/reset_email?user_id=alice").await;
        let after = store.session("alice").unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached"], false);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(factory.created().len(), 2);
        assert_eq!(factory.last().mailbox_calls(), 1);
    }

    #[tokio::test]
    async fn test_warm_up_failure_is_service_unavailable() {
        let factory = ScriptedFactory::new();
        factory.fail_warm_up(ProviderError::UpstreamUnavailable("blocked".to_string()));
        let (app, store) = app(&factory);

        let (status, body) = get_json(&app, "/get_email?user_id=alice").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("initialize session"));
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_health_reports_session_count() {
        let factory = ScriptedFactory::new();
        let (app, _) = app(&factory);
        get_json(&app, "/get_email?user_id=alice").await;

        let (status, body) = get_json(&app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"], 1);
    }
}
