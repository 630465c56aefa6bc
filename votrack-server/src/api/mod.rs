//! HTTP API handlers for votrack-server

pub mod auth;
pub mod confirmaciones;
pub mod dashboard;
pub mod events;
pub mod export;
pub mod extract;
pub mod health;
pub mod novedades;
pub mod personas;
pub mod settings;
pub mod users;
pub mod workflow;

pub use auth::require_session;
pub use health::health_routes;
