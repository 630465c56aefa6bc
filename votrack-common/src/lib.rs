//! # votrack common library
//!
//! Shared code for the votrack canvassing service:
//! - Role tiers, persona estados and workflow transition guards
//! - Visibility scope and mutation policy
//! - Credential hashing and session tokens
//! - Database schema, migrations and settings
//! - Configuration loading
//! - Event bus and SSE helpers

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod estado;
pub mod events;
pub mod policy;
pub mod role;
pub mod sse;
pub mod time;
pub mod uuid_utils;
pub mod validation;

pub use error::{Error, Result};
pub use estado::{Action, Estado, TransitionError};
pub use policy::{Principal, Scope};
pub use role::Role;
