//! Operation layer between the API surface and a storage backend.
//!
//! Every operation runs as a short pipeline of named stages over a
//! [`Stash`] of request context: **authorize** (role matrix), **pre-fetch**
//! (caller scope, previous record), **mutate** (store call), then
//! **side-effects** (delta publish, notification fan-out). Side-effect
//! failures are logged and swallowed; they never roll back the mutation.
//!
//! The role matrix is small: hierarchy and permission mutations require
//! [`Role::Admin`](andon_core::caller::Role); issue operations and all
//! reads are open to every authenticated role, with listings post-filtered
//! by the caller's stored permission record.

pub mod broker;
pub mod notify;

mod hierarchy;
mod issues;
mod permissions;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use andon_core::{
  Error, Result,
  caller::Caller,
  delta::Delta,
  node::NodeKind,
  permission::ListScope,
  store::{HierarchyStore, IssueStore},
};
use chrono::{DateTime, Utc};
use tracing::warn;

pub use crate::{broker::Broker, notify::Notifier};

// ─── Stash ───────────────────────────────────────────────────────────────────

/// Request context threaded through one operation's stages: who is calling,
/// the single instant the operation runs at, and the label used in denials
/// and logs.
pub(crate) struct Stash<'c> {
  pub caller: &'c Caller,
  pub now:    DateTime<Utc>,
  pub op:     &'static str,
}

impl<'c> Stash<'c> {
  pub fn new(caller: &'c Caller, op: &'static str) -> Self {
    Self { caller, now: Utc::now(), op }
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// The operation resolver. Generic over the storage backend so tests can
/// run against an in-memory database.
pub struct Resolver<S> {
  store:    S,
  notifier: Arc<Notifier>,
  broker:   Broker,
}

impl<S: HierarchyStore + IssueStore> Resolver<S> {
  pub fn new(store: S, notifier: Arc<Notifier>, broker: Broker) -> Self {
    Self { store, notifier, broker }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn notifier(&self) -> &Notifier { &self.notifier }

  pub fn broker(&self) -> &Broker { &self.broker }

  /// Rebuild the notifier registry from stored Event nodes so contact
  /// subscriptions survive restarts. Returns the number of events scanned.
  pub async fn hydrate_notifier(&self) -> Result<usize> {
    let events = self.store.list_nodes(NodeKind::Event).await?;
    self.notifier.hydrate(&events).await;
    Ok(events.len())
  }

  // ── Shared stages ──────────────────────────────────────────────────────

  /// Authorization stage for admin-gated mutations. Denial happens before
  /// any store access.
  fn authorize_admin(&self, stash: &Stash<'_>) -> Result<()> {
    if stash.caller.is_admin() {
      return Ok(());
    }
    warn!(
      user = %stash.caller.user_id,
      role = %stash.caller.role,
      op = stash.op,
      "operation denied"
    );
    Err(Error::Unauthorized(stash.op.to_string()))
  }

  /// Scope stage for permission-gated listings. Admins and callers with no
  /// stored record are unrestricted; a record narrows, even an empty one.
  async fn caller_scope(&self, stash: &Stash<'_>) -> Result<ListScope> {
    if stash.caller.is_admin() {
      return Ok(ListScope::Unrestricted);
    }
    Ok(
      match self.store.get_permission(&stash.caller.user_id).await? {
        Some(permission) => permission.scope(),
        None => ListScope::Unrestricted,
      },
    )
  }

  /// Delta side-effect stage; publishing never fails the operation.
  fn publish(&self, delta: Delta) { self.broker.publish(delta); }
}
