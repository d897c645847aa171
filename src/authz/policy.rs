use async_trait::async_trait;

use super::scope::{Action, ResourceScope};
use crate::types::{Principal, ResourceModule, Role};

/// Grants or refuses an action on an already-resolved scope
#[async_trait]
pub trait PermissionService: Send + Sync {
    async fn is_granted(&self, principal: &Principal, scope: &ResourceScope, action: Action) -> bool;
}

/// Ownership anchored at the school level.
///
/// A school administrator may read and update their own school and do
/// anything to classrooms and students inside it. Creating or deleting
/// schools is left to superadmins.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchoolScopePolicy;

#[async_trait]
impl PermissionService for SchoolScopePolicy {
    async fn is_granted(&self, principal: &Principal, scope: &ResourceScope, action: Action) -> bool {
        match principal.role() {
            Role::Superadmin => true,
            Role::SchoolAdmin => {
                if principal.school_id() != Some(&scope.school) {
                    return false;
                }
                match scope.module {
                    ResourceModule::School => matches!(action, Action::Read | Action::Update),
                    ResourceModule::Classroom | ResourceModule::Student => true,
                }
            }
        }
    }
}
