use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, patch, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::config::SecurityConfig;
use crate::database::StoreError;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

/// Full application router. Tests drive it in-process.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected
        .merge(protected_routes(&state))
        .with_state(state.clone());

    let router = match cors_layer(&state.security) {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register/request", post(auth::register_request))
        .route("/api/auth/register/verify", post(auth::register_verify))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use protected::{auth, events, family, folders, notes, users};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        // Families
        .route("/api/family", get(family::list).post(family::create))
        .route("/api/family/:id/join", post(family::join))
        .route("/api/family/:id/leave", post(family::leave))
        .route("/api/family/:id/members", get(family::members))
        .route("/api/family/:id/notes", get(family::notes))
        .route("/api/family/:id/events", get(family::events))
        // Notes
        .route("/api/notes", get(notes::list).post(notes::create))
        .route(
            "/api/notes/:id",
            get(notes::get).patch(notes::update).delete(notes::delete),
        )
        .route("/api/notes/:id/restore", post(notes::restore))
        .route("/api/notes/:id/collaborators", get(notes::collaborators::list))
        .route(
            "/api/notes/:id/collaborators/:user_id",
            put(notes::collaborators::grant).delete(notes::collaborators::revoke),
        )
        .route(
            "/api/notes/:id/comments",
            get(notes::comments::list).post(notes::comments::create),
        )
        .route(
            "/api/notes/:id/attachments",
            get(notes::attachments::list)
                .post(notes::attachments::upload)
                .layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route(
            "/api/notes/:id/attachments/:attachment_id",
            get(notes::attachments::download),
        )
        // Events
        .route("/api/events", get(events::list).post(events::create))
        .route("/api/events/:id", patch(events::update).delete(events::delete))
        // Folders
        .route("/api/folders", get(folders::list).post(folders::create))
        .route("/api/folders/:id", axum::routing::delete(folders::delete))
        // Users
        .route("/api/users/search", get(users::search))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

/// `None` when CORS is disabled. A `*` entry allows any origin.
fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Family Notes API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Notes and calendar backend with family-scoped sharing",
            "endpoints": {
                "public_auth": "/api/auth/login, /api/auth/register/{request,verify} (public)",
                "auth": "/api/auth/whoami (protected)",
                "family": "/api/family[/:id/{join,leave,members,notes,events}] (protected)",
                "notes": "/api/notes[/:id[/{restore,collaborators,comments,attachments[/:attachment_id]}]] (protected)",
                "events": "/api/events[/:id] (protected)",
                "folders": "/api/folders[/:id] (protected)",
                "users": "/api/users/search?q= (protected)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    health_report(state.store.ping().await, chrono::Utc::now())
}

fn health_report(ping: Result<(), StoreError>, now: DateTime<Utc>) -> (StatusCode, Json<Value>) {
    match ping {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}
