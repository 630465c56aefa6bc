//! votrack-server library - campaign canvassing tracker HTTP service
//!
//! JSON API over the persona workflow: registration by líderes and
//! coordinadores, verification, novedades, vote confirmation with photo
//! evidence, dashboards, CSV export and a live SSE feed of estado changes.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use votrack_common::events::EventBus;

pub mod api;
pub mod db;
pub mod error;
pub mod evidence;
pub mod export;
pub mod pagination;

use evidence::EvidenceStore;

/// Upper bound for the `evidence_max_bytes` setting (20 MiB)
pub const MAX_EVIDENCE_BYTES: i64 = 20 * 1024 * 1024;

/// Request body limit: a base64 photo at the upper bound plus JSON framing
pub const MAX_BODY_BYTES: usize = (MAX_EVIDENCE_BYTES as usize / 3 + 1) * 4 + 64 * 1024;

/// Buffered events per SSE subscriber
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Estado change notifications for SSE subscribers
    pub event_bus: EventBus,
    /// Where confirmation photos are kept
    pub evidence: Arc<dyn EvidenceStore>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, event_bus: EventBus, evidence: Arc<dyn EvidenceStore>) -> Self {
        Self {
            db,
            event_bus,
            evidence,
        }
    }
}

/// Build application router
///
/// `/health` and login are public; everything else under `/api` requires a
/// session.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post, put};

    // Protected routes (require a session)
    let protected = Router::new()
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/auth/me", get(api::auth::me))
        .route(
            "/api/personas",
            get(api::personas::list_personas).post(api::personas::create_persona),
        )
        .route(
            "/api/personas/:id",
            get(api::personas::get_persona)
                .put(api::personas::update_persona)
                .delete(api::personas::delete_persona),
        )
        .route("/api/personas/:id/lider", put(api::personas::reassign_lider))
        .route("/api/personas/:id/historial", get(api::personas::get_historial))
        .route("/api/personas/:id/verificar", post(api::workflow::verificar))
        .route(
            "/api/personas/:id/revertir-verificacion",
            post(api::workflow::revertir_verificacion),
        )
        .route(
            "/api/personas/:id/novedades",
            get(api::novedades::list_persona_novedades).post(api::novedades::open_novedad),
        )
        .route("/api/novedades", get(api::novedades::list_novedades))
        .route("/api/novedades/:id/resolve", post(api::novedades::resolve_novedad))
        .route(
            "/api/personas/:id/confirmar",
            post(api::confirmaciones::confirmar),
        )
        .route(
            "/api/personas/:id/revertir-confirmacion",
            post(api::confirmaciones::revertir_confirmacion),
        )
        .route(
            "/api/personas/:id/confirmaciones",
            get(api::confirmaciones::list_confirmaciones),
        )
        .route("/api/confirmaciones/:id/foto", get(api::confirmaciones::get_foto))
        .route("/api/dashboard", get(api::dashboard::summary))
        .route("/api/dashboard/lideres", get(api::dashboard::por_lider))
        .route("/api/dashboard/coordinadores", get(api::dashboard::por_coordinador))
        .route("/api/export/personas.csv", get(api::export::export_personas))
        .route(
            "/api/users",
            get(api::users::list_users).post(api::users::create_user),
        )
        .route(
            "/api/users/:id",
            get(api::users::get_user).patch(api::users::update_user),
        )
        .route("/api/lideres", get(api::users::list_lideres))
        .route("/api/settings", get(api::settings::list_settings))
        .route("/api/settings/:key", put(api::settings::update_setting))
        .route("/api/events", get(api::events::event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_session,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/login", post(api::auth::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
