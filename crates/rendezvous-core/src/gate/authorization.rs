//! AuthorizationGate - 操作ごとの権限判定
//!
//! 副作用のない純粋関数。ロールや権限の保存方法は知らない。

use crate::domain::{Action, Capabilities, Scope};

/// Scopes that grant `action` on their own.
fn granting_scopes(action: Action) -> &'static [Scope] {
    match action {
        Action::Create => &[Scope::Schedule],
        Action::Transition => &[Scope::Manage, Scope::Status],
        Action::AddNote => &[Scope::Manage, Scope::Notes],
    }
}

/// May the actor described by `capabilities` perform `action`?
///
/// Administrators may do everything. Otherwise the actor needs the scope
/// specific to the action; `manage` covers both `status` and `notes`.
pub fn authorize(capabilities: &Capabilities, action: Action) -> bool {
    capabilities.is_admin()
        || granting_scopes(action)
            .iter()
            .any(|scope| capabilities.has_scope(*scope))
}
