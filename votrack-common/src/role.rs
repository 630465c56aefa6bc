//! Role tiers
//!
//! A role decides two things: which personas a user can see (see
//! [`crate::policy::Scope`]) and which mutations the user may attempt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Role tier of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Coordinador,
    Lider,
    Validador,
    Confirmador,
    Consultor,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Coordinador,
        Role::Lider,
        Role::Validador,
        Role::Confirmador,
        Role::Consultor,
    ];

    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Coordinador => "COORDINADOR",
            Role::Lider => "LIDER",
            Role::Validador => "VALIDADOR",
            Role::Confirmador => "CONFIRMADOR",
            Role::Consultor => "CONSULTOR",
        }
    }

    /// Roles that see every persona regardless of assignment
    pub fn sees_all(&self) -> bool {
        matches!(
            self,
            Role::Admin | Role::Consultor | Role::Validador | Role::Confirmador
        )
    }

    pub fn can_register_personas(&self) -> bool {
        matches!(self, Role::Admin | Role::Coordinador | Role::Lider)
    }

    pub fn can_verify(&self) -> bool {
        matches!(self, Role::Admin | Role::Validador)
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, Role::Admin | Role::Confirmador)
    }

    pub fn can_open_novedad(&self) -> bool {
        matches!(
            self,
            Role::Admin | Role::Validador | Role::Confirmador | Role::Coordinador
        )
    }

    pub fn can_resolve_novedad(&self) -> bool {
        matches!(
            self,
            Role::Admin | Role::Validador | Role::Coordinador | Role::Lider
        )
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown role: {}", s)))
    }
}
