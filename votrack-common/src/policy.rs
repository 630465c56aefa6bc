//! Visibility scope and mutation rights
//!
//! Visibility: admin, consultor, validador and confirmador see every persona;
//! a coordinador sees the personas of the líderes assigned to them; a líder
//! sees only their own personas.
//!
//! Callers look a persona up through its scope first (out of scope reads as
//! not found) and then ask the `ensure_*` functions whether the mutation is
//! permitted (refusal reads as forbidden).

use serde::Serialize;
use uuid::Uuid;

use crate::estado::{Action, Estado};
use crate::role::Role;
use crate::{Error, Result};

/// Authenticated caller
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// Only set for líderes
    pub coordinador_id: Option<Uuid>,
}

impl Principal {
    pub fn scope(&self) -> Scope {
        Scope::for_principal(self)
    }
}

/// Set of personas a principal may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Personas whose líder reports to this coordinador
    Coordinador(Uuid),
    /// Personas owned by this líder
    Lider(Uuid),
}

impl Scope {
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Coordinador => Scope::Coordinador(principal.id),
            Role::Lider => Scope::Lider(principal.id),
            _ => Scope::All,
        }
    }

    /// Whether a persona owned by `lider_id` (whose coordinador is
    /// `lider_coordinador`) is visible
    pub fn contains(&self, lider_id: Uuid, lider_coordinador: Option<Uuid>) -> bool {
        match self {
            Scope::All => true,
            Scope::Coordinador(id) => lider_coordinador == Some(*id),
            Scope::Lider(id) => lider_id == *id,
        }
    }
}

fn forbidden(principal: &Principal, what: &str) -> Error {
    Error::Forbidden(format!("{} may not {}", principal.role, what))
}

/// Check the role-level right to run a workflow action
pub fn ensure_can_apply(principal: &Principal, action: Action) -> Result<()> {
    let allowed = match action {
        Action::Verificar | Action::RevertirVerificacion => principal.role.can_verify(),
        Action::Confirmar | Action::RevertirConfirmacion => principal.role.can_confirm(),
        Action::AbrirNovedad => principal.role.can_open_novedad(),
        Action::ResolverNovedad => principal.role.can_resolve_novedad(),
    };
    if allowed {
        Ok(())
    } else {
        Err(forbidden(principal, &action.as_str().to_lowercase()))
    }
}

/// Register a persona for `lider_id`
///
/// Líderes may only register for themselves; coordinadores only for their
/// own líderes (`lider_coordinador` is the coordinador of the target líder).
pub fn ensure_can_register(
    principal: &Principal,
    lider_id: Uuid,
    lider_coordinador: Option<Uuid>,
) -> Result<()> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Coordinador if lider_coordinador == Some(principal.id) => Ok(()),
        Role::Lider if lider_id == principal.id => Ok(()),
        Role::Coordinador | Role::Lider => Err(Error::Forbidden(
            "persona must be registered under a líder in your scope".to_string(),
        )),
        _ => Err(forbidden(principal, "register personas")),
    }
}

/// Edit the data fields of a visible persona
pub fn ensure_can_edit(principal: &Principal, estado: Estado) -> Result<()> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Coordinador | Role::Lider => {
            if estado.allows_data_edit() {
                Ok(())
            } else {
                Err(Error::Conflict(format!(
                    "persona data is locked while {}",
                    estado
                )))
            }
        }
        _ => Err(forbidden(principal, "edit personas")),
    }
}

/// Delete a visible persona
pub fn ensure_can_delete(principal: &Principal, estado: Estado, lider_id: Uuid) -> Result<()> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Lider if lider_id == principal.id => {
            if estado == Estado::DatosPendientes {
                Ok(())
            } else {
                Err(Error::Conflict(format!(
                    "persona can only be deleted while {}",
                    Estado::DatosPendientes
                )))
            }
        }
        _ => Err(forbidden(principal, "delete personas")),
    }
}

/// Move a visible persona to `new_lider`
pub fn ensure_can_reassign(
    principal: &Principal,
    new_lider_coordinador: Option<Uuid>,
) -> Result<()> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Coordinador if new_lider_coordinador == Some(principal.id) => Ok(()),
        Role::Coordinador => Err(Error::Forbidden(
            "target líder is not assigned to you".to_string(),
        )),
        _ => Err(forbidden(principal, "reassign personas")),
    }
}

pub fn ensure_can_manage_users(principal: &Principal) -> Result<()> {
    if principal.role.can_manage_users() {
        Ok(())
    } else {
        Err(forbidden(principal, "manage users"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "u".to_string(),
            display_name: "U".to_string(),
            role,
            coordinador_id: None,
        }
    }

    #[test]
    fn test_scope_for_roles() {
        for role in [Role::Admin, Role::Consultor, Role::Validador, Role::Confirmador] {
            assert_eq!(principal(role).scope(), Scope::All);
        }
        let c = principal(Role::Coordinador);
        assert_eq!(c.scope(), Scope::Coordinador(c.id));
        let l = principal(Role::Lider);
        assert_eq!(l.scope(), Scope::Lider(l.id));
    }

    #[test]
    fn test_coordinador_sees_only_own_lideres_personas() {
        let c = principal(Role::Coordinador);
        let scope = c.scope();
        let lider = Uuid::new_v4();
        assert!(scope.contains(lider, Some(c.id)));
        assert!(!scope.contains(lider, Some(Uuid::new_v4())));
        assert!(!scope.contains(lider, None));
    }

    #[test]
    fn test_lider_sees_only_own_personas() {
        let l = principal(Role::Lider);
        let scope = l.scope();
        assert!(scope.contains(l.id, None));
        assert!(!scope.contains(Uuid::new_v4(), None));
    }

    #[test]
    fn test_register_rules() {
        let admin = principal(Role::Admin);
        assert!(ensure_can_register(&admin, Uuid::new_v4(), None).is_ok());

        let lider = principal(Role::Lider);
        assert!(ensure_can_register(&lider, lider.id, None).is_ok());
        assert!(matches!(
            ensure_can_register(&lider, Uuid::new_v4(), None),
            Err(Error::Forbidden(_))
        ));

        let coord = principal(Role::Coordinador);
        assert!(ensure_can_register(&coord, Uuid::new_v4(), Some(coord.id)).is_ok());
        assert!(ensure_can_register(&coord, Uuid::new_v4(), Some(Uuid::new_v4())).is_err());

        let consultor = principal(Role::Consultor);
        assert!(ensure_can_register(&consultor, Uuid::new_v4(), None).is_err());
    }

    #[test]
    fn test_edit_is_locked_after_verification_for_field_roles() {
        let lider = principal(Role::Lider);
        assert!(ensure_can_edit(&lider, Estado::DatosPendientes).is_ok());
        assert!(ensure_can_edit(&lider, Estado::ConNovedad).is_ok());
        assert!(matches!(
            ensure_can_edit(&lider, Estado::Verificado),
            Err(Error::Conflict(_))
        ));
        let admin = principal(Role::Admin);
        assert!(ensure_can_edit(&admin, Estado::Confirmado).is_ok());
        assert!(matches!(
            ensure_can_edit(&principal(Role::Validador), Estado::DatosPendientes),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_delete_rules() {
        let lider = principal(Role::Lider);
        assert!(ensure_can_delete(&lider, Estado::DatosPendientes, lider.id).is_ok());
        assert!(ensure_can_delete(&lider, Estado::Verificado, lider.id).is_err());
        let coordinador = principal(Role::Coordinador);
        assert!(ensure_can_delete(&coordinador, Estado::DatosPendientes, lider.id).is_err());
        assert!(ensure_can_delete(&principal(Role::Admin), Estado::Confirmado, lider.id).is_ok());
    }

    #[test]
    fn test_workflow_action_rights() {
        let validador = principal(Role::Validador);
        assert!(ensure_can_apply(&validador, Action::Verificar).is_ok());
        assert!(ensure_can_apply(&validador, Action::Confirmar).is_err());

        let confirmador = principal(Role::Confirmador);
        assert!(ensure_can_apply(&confirmador, Action::RevertirConfirmacion).is_ok());
        assert!(ensure_can_apply(&confirmador, Action::RevertirVerificacion).is_err());

        let consultor = principal(Role::Consultor);
        assert!(ensure_can_apply(&consultor, Action::AbrirNovedad).is_err());
    }

    #[test]
    fn test_reassign_rules() {
        let coord = principal(Role::Coordinador);
        assert!(ensure_can_reassign(&coord, Some(coord.id)).is_ok());
        assert!(ensure_can_reassign(&coord, Some(Uuid::new_v4())).is_err());
        assert!(ensure_can_reassign(&principal(Role::Lider), None).is_err());
        assert!(ensure_can_reassign(&principal(Role::Admin), None).is_ok());
    }
}
