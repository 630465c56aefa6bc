//! Database schema, migrations, settings and shared record types

pub mod init;
pub mod migrations;
pub mod models;
pub mod settings;

pub use init::*;
pub use migrations::*;
pub use models::*;
pub use settings::*;
