//! Permission-record operations. Mutations are admin-gated; reads are open
//! to every authenticated role.

use andon_core::{
  Result,
  caller::Caller,
  delta::Delta,
  permission::{NewPermission, Permission},
  store::{HierarchyStore, IssueStore},
};

use crate::{Resolver, Stash};

impl<S: HierarchyStore + IssueStore> Resolver<S> {
  /// Create or replace a user's grant. Admin only. `expected_version`
  /// semantics are the store's: `None` asserts no record exists yet,
  /// `Some` must match the stored version.
  pub async fn put_permission(
    &self,
    caller: &Caller,
    input: NewPermission,
  ) -> Result<Permission> {
    let stash = Stash::new(caller, "put permission");
    self.authorize_admin(&stash)?;
    let permission = self.store.put_permission(input).await?;
    self.publish(Delta::PermissionPut(permission.clone()));
    Ok(permission)
  }

  /// Fetch one user's grant. `None` means the user is unrestricted.
  pub async fn get_permission(
    &self,
    _caller: &Caller,
    user_id: &str,
  ) -> Result<Option<Permission>> {
    self.store.get_permission(user_id).await
  }

  /// Drop a user's grant, returning them to unrestricted. Admin only.
  pub async fn delete_permission(
    &self,
    caller: &Caller,
    user_id: &str,
  ) -> Result<()> {
    let stash = Stash::new(caller, "delete permission");
    self.authorize_admin(&stash)?;
    self.store.delete_permission(user_id).await?;
    self.publish(Delta::PermissionDeleted { user_id: user_id.to_string() });
    Ok(())
  }

  /// Every stored grant, ordered by user id.
  pub async fn list_permissions(
    &self,
    _caller: &Caller,
  ) -> Result<Vec<Permission>> {
    self.store.list_permissions().await
  }
}
