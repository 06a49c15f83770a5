//! Actor capabilities resolved by the identity service.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::ActorId;

/// Roles the identity service may report. Only the administrative roles
/// matter to the engine; everything else is carried through as `Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Member,
}

impl Role {
    pub fn is_administrative(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

/// Permission scopes on the add-on scheduling area.
///
/// `Manage` implies both `Status` and `Notes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Schedule,
    Manage,
    Status,
    Notes,
}

/// A lifecycle action that needs authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Transition,
    AddNote,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Transition => "transition",
            Action::AddNote => "add_note",
        };
        f.write_str(s)
    }
}

/// What an actor is allowed to do, as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub actor: ActorId,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub scopes: BTreeSet<Scope>,
}

impl Capabilities {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            roles: BTreeSet::new(),
            scopes: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.insert(scope);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role.is_administrative())
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}
