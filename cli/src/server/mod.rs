mod household;
mod ideas;
mod users;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::identity::{IdentityClient, IdentitySettings};
use crate::scrape::RecipeScraper;
use haus_core::error::Error as CoreError;
use haus_core::reaper::Reaper;
use haus_core::service::IdeaService;
use haus_core::store::Store;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

const POSTED: &str = "Data posted successfully.";
const DELETED: &str = "Data deleted successfully.";

#[derive(Clone)]
pub struct AppState {
    store: Store,
    ideas: IdeaService,
    identity: Option<Arc<IdentityClient>>,
    scraper: Arc<RecipeScraper>,
}

impl AppState {
    pub fn new(
        store: Store,
        reaper: Reaper,
        identity: Option<IdentityClient>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            ideas: IdeaService::new(store.clone(), reaper),
            store,
            identity: identity.map(Arc::new),
            scraper: Arc::new(RecipeScraper::new()?),
        })
    }
}

// --- Response types ---

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

#[derive(Serialize)]
struct CreatedResponse {
    message: &'static str,
    id: i64,
}

fn created(id: i64) -> Json<CreatedResponse> {
    Json(CreatedResponse {
        message: POSTED,
        id,
    })
}

// --- Extractors ---

// Rejections from these surface as `400 {error}` like every other client error.

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
struct ApiPath<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
struct ApiQuery<T>(T);

// --- Error handling ---

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    PayloadTooLarge(String),
    /// An outbound HTTP call failed. The message is what the client sees.
    Upstream(&'static str, anyhow::Error),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            Self::Upstream(msg, err) => {
                error!("upstream error: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string())
            }
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl ApiError {
    /// Extractor rejections answer 400, except an oversized body keeps its 413.
    fn rejected(status: StatusCode, text: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(text)
        } else {
            Self::BadRequest(text)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => Self::NotFound(msg),
            CoreError::ConstraintViolation(msg) | CoreError::Validation(msg) => {
                Self::BadRequest(msg)
            }
            other @ (CoreError::Storage(_) | CoreError::Background(_)) => {
                Self::Internal(anyhow::Error::new(other))
            }
        }
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    response
}

// --- Router ---

async fn hello() -> &'static str {
    "Hello World!"
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recipe-ideas",
            get(ideas::list_ideas).post(ideas::create_idea),
        )
        .route(
            "/recipe-ideas/{id}",
            get(ideas::get_idea)
                .put(ideas::update_idea)
                .delete(ideas::delete_idea),
        )
        .route("/recipe-tags", get(ideas::list_tags))
        .route("/main-ingredients", get(ideas::list_ingredients))
        .route(
            "/food-plan",
            get(household::get_food_plans).post(household::post_food_plan),
        )
        .route("/note", get(household::get_note).post(household::post_note))
        .route(
            "/task",
            get(household::get_tasks)
                .post(household::post_task)
                .put(household::put_task)
                .delete(household::delete_task),
        )
        .route("/task/{id}", get(household::get_task))
        .route(
            "/recipe",
            get(household::get_recipes)
                .post(household::post_recipe)
                .delete(household::delete_recipe),
        )
        .route(
            "/recipe-category",
            get(household::get_categories)
                .post(household::post_category)
                .delete(household::delete_category),
        )
        .route(
            "/reminder",
            get(household::get_reminders)
                .post(household::post_reminder)
                .put(household::put_reminder)
                .delete(household::delete_reminder),
        )
        .route("/reminder/{id}", get(household::get_reminder))
        .route("/user", get(users::get_users))
        .route("/user/{id}", get(users::get_user).put(users::update_user))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .nest("/api/v1", api_routes())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(store: Store, port: u16, bind: &str) -> anyhow::Result<()> {
    let identity = match IdentitySettings::from_env() {
        Some(settings) => Some(IdentityClient::new(settings)?),
        None => {
            warn!("AUTH0_* settings missing, /user routes will answer 500");
            None
        }
    };

    let reaper = Reaper::spawn(store.clone());
    let app = build_router(AppState::new(store, reaper.clone(), identity)?);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("Failed to bind to {bind}:{port}"))?;
    info!("Haus server listening on http://{bind}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    reaper.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received terminate signal, shutting down"),
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    pub fn test_app() -> (Router, Store, Reaper) {
        let store = Store::open_in_memory().unwrap();
        let reaper = Reaper::spawn(store.clone());
        let state = AppState::new(store.clone(), reaper.clone(), None).unwrap();
        (build_router(state), store, reaper)
    }

    /// Send a request and decode the JSON response body (`Null` when empty).
    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
