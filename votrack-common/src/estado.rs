//! Persona workflow stages and transition guards
//!
//! Progress runs DATOS_PENDIENTES → VERIFICADO → CONFIRMADO. CON_NOVEDAD is a
//! side branch entered whenever a novedad is opened and left (back to
//! DATOS_PENDIENTES) once the last open novedad is resolved. Verification and
//! confirmation can each be reverted one step.
//!
//! Everything here is pure; the database layer loads the current estado and
//! open novedad count, asks [`next_estado`], and persists the answer together
//! with the historial row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::Error;

/// Workflow stage of a persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Estado {
    DatosPendientes,
    Verificado,
    ConNovedad,
    Confirmado,
}

impl Estado {
    /// All estados in display order
    pub const ALL: [Estado; 4] = [
        Estado::DatosPendientes,
        Estado::Verificado,
        Estado::ConNovedad,
        Estado::Confirmado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Estado::DatosPendientes => "DATOS_PENDIENTES",
            Estado::Verificado => "VERIFICADO",
            Estado::ConNovedad => "CON_NOVEDAD",
            Estado::Confirmado => "CONFIRMADO",
        }
    }

    /// Persona data may be edited only before verification or while a
    /// novedad is pending
    pub fn allows_data_edit(&self) -> bool {
        matches!(self, Estado::DatosPendientes | Estado::ConNovedad)
    }
}

impl fmt::Display for Estado {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Estado {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Estado::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown estado: {}", s)))
    }
}

/// Workflow action requested against a persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Verificar,
    RevertirVerificacion,
    AbrirNovedad,
    ResolverNovedad,
    Confirmar,
    RevertirConfirmacion,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Verificar => "VERIFICAR",
            Action::RevertirVerificacion => "REVERTIR_VERIFICACION",
            Action::AbrirNovedad => "ABRIR_NOVEDAD",
            Action::ResolverNovedad => "RESOLVER_NOVEDAD",
            Action::Confirmar => "CONFIRMAR",
            Action::RevertirConfirmacion => "REVERTIR_CONFIRMACION",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Action::Verificar,
            Action::RevertirVerificacion,
            Action::AbrirNovedad,
            Action::ResolverNovedad,
            Action::Confirmar,
            Action::RevertirConfirmacion,
        ]
        .into_iter()
        .find(|a| a.as_str() == s)
        .ok_or_else(|| Error::Internal(format!("Unknown stored action: {}", s)))
    }
}

/// Rejected transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{action} is not allowed while persona is {from}")]
    NotAllowed { action: Action, from: Estado },

    #[error("{action} is blocked by {open} open novedad(es)")]
    BlockedByNovedades { action: Action, open: i64 },
}

/// Compute the estado reached by applying `action` to a persona in `from`.
///
/// `open_novedades` is the number of unresolved novedades attached to the
/// persona before the action runs (for [`Action::ResolverNovedad`] this
/// includes the one being resolved).
pub fn next_estado(
    from: Estado,
    action: Action,
    open_novedades: i64,
) -> Result<Estado, TransitionError> {
    use Estado::*;

    let not_allowed = || TransitionError::NotAllowed { action, from };

    match action {
        Action::Verificar => {
            if from != DatosPendientes {
                return Err(not_allowed());
            }
            if open_novedades > 0 {
                return Err(TransitionError::BlockedByNovedades {
                    action,
                    open: open_novedades,
                });
            }
            Ok(Verificado)
        }
        Action::RevertirVerificacion => match from {
            Verificado => Ok(DatosPendientes),
            _ => Err(not_allowed()),
        },
        Action::AbrirNovedad => match from {
            DatosPendientes | Verificado | ConNovedad => Ok(ConNovedad),
            Confirmado => Err(not_allowed()),
        },
        Action::ResolverNovedad => {
            if from != ConNovedad || open_novedades < 1 {
                return Err(not_allowed());
            }
            if open_novedades == 1 {
                Ok(DatosPendientes)
            } else {
                Ok(ConNovedad)
            }
        }
        Action::Confirmar => {
            if from != Verificado {
                return Err(not_allowed());
            }
            if open_novedades > 0 {
                return Err(TransitionError::BlockedByNovedades {
                    action,
                    open: open_novedades,
                });
            }
            Ok(Confirmado)
        }
        Action::RevertirConfirmacion => match from {
            Confirmado => Ok(Verificado),
            _ => Err(not_allowed()),
        },
    }
}
