//! Hierarchy operations: node create/read/update/delete plus the
//! permission-scoped listings.

use andon_core::{
  Error, Result,
  caller::Caller,
  delta::Delta,
  node::{NewNode, Node, NodeDetail, NodeKind, NodePatch},
  permission::ListScope,
  store::{HierarchyStore, IssueStore},
};
use uuid::Uuid;

use crate::{Resolver, Stash};

impl<S: HierarchyStore + IssueStore> Resolver<S> {
  /// Create a node. Admin only.
  ///
  /// Stages: authorize → validate the parent → sibling-name pre-check →
  /// put (the store's conditional write backstops the pre-check against
  /// races) → publish, and for Events bind the notification contacts.
  pub async fn create_node(
    &self,
    caller: &Caller,
    input: NewNode,
  ) -> Result<Node> {
    let stash = Stash::new(caller, "create node");
    self.authorize_admin(&stash)?;
    self.check_parent(&input).await?;
    self.check_sibling_name(&input).await?;

    let node = self.store.put_node(input.into_node(stash.now)).await?;

    if let NodeDetail::Event(detail) = &node.detail {
      self.notifier.subscribe(node.id, detail).await;
    }
    self.publish(Delta::NodeCreated(node.clone()));
    Ok(node)
  }

  /// Parent stage: the parent must exist and be a kind the child may hang
  /// under; parentless kinds must not name one.
  async fn check_parent(&self, input: &NewNode) -> Result<()> {
    let kind = input.detail.kind();
    let Some(parent_id) = input.parent_id else {
      if kind.requires_parent() {
        return Err(Error::InvalidParent {
          child:  kind,
          detail: "a parent is required".into(),
        });
      }
      return Ok(());
    };

    if !kind.requires_parent() {
      return Err(Error::InvalidParent {
        child:  kind,
        detail: format!("{kind} nodes are parentless"),
      });
    }
    let parent = self.store.get_node(parent_id).await?.ok_or_else(|| {
      Error::InvalidParent {
        child:  kind,
        detail: format!("parent {parent_id} does not exist"),
      }
    })?;
    if !kind.allowed_parents().contains(&parent.kind()) {
      return Err(Error::InvalidParent {
        child:  kind,
        detail: format!("a {kind} cannot hang under a {}", parent.kind()),
      });
    }
    Ok(())
  }

  /// Sibling stage: fail fast when a same-kind sibling already uses the
  /// name. Case-sensitive, exactly like the store's unique index.
  async fn check_sibling_name(&self, input: &NewNode) -> Result<()> {
    let kind = input.detail.kind();
    let hits = self.store.find_by_kind_and_name(kind, &input.name).await?;
    if hits.iter().any(|n| n.parent_id == input.parent_id) {
      return Err(Error::DuplicateName { kind, name: input.name.clone() });
    }
    Ok(())
  }

  /// Fetch one node by id. Open to every authenticated role.
  pub async fn get_node(&self, _caller: &Caller, id: Uuid) -> Result<Node> {
    self.store.get_node(id).await?.ok_or(Error::NodeNotFound(id))
  }

  /// Update an Event's mutable fields under optimistic concurrency. Admin
  /// only.
  ///
  /// Stages: authorize → pre-fetch the previous record (it must be an
  /// Event; its contacts are what the rewire diff compares against) →
  /// store update → rewire the notification contacts if they changed →
  /// publish.
  pub async fn update_event(
    &self,
    caller: &Caller,
    id: Uuid,
    patch: NodePatch,
    expected_version: i64,
  ) -> Result<Node> {
    let stash = Stash::new(caller, "update event");
    self.authorize_admin(&stash)?;

    let previous =
      self.store.get_node(id).await?.ok_or(Error::NodeNotFound(id))?;
    let Some(previous_detail) = previous.detail.as_event().cloned() else {
      return Err(Error::InvalidInput(format!("node {id} is not an event")));
    };

    let updated = self.store.update_node(id, patch, expected_version).await?;

    if let NodeDetail::Event(current) = &updated.detail {
      self.notifier.resubscribe(id, &previous_detail, current).await;
    }
    self.publish(Delta::NodeUpdated(updated.clone()));
    Ok(updated)
  }

  /// Delete a node. Admin only; unconditional (no version check) and
  /// without cascade — children stay readable by id but drop out of
  /// traversal. Events additionally drop their notification contacts.
  pub async fn delete_node(&self, caller: &Caller, id: Uuid) -> Result<()> {
    let stash = Stash::new(caller, "delete node");
    self.authorize_admin(&stash)?;

    let node = self.store.get_node(id).await?.ok_or(Error::NodeNotFound(id))?;
    self.store.delete_node(id).await?;

    if node.kind() == NodeKind::Event {
      self.notifier.unsubscribe(id).await;
    }
    self.publish(Delta::NodeDeleted { id });
    Ok(())
  }

  /// List every node of `kind`, scoped to what the caller may see.
  ///
  /// Stages: resolve scope → full store query → post-filter. The filter
  /// runs after the query; the store never sees the scope.
  pub async fn list_nodes(
    &self,
    caller: &Caller,
    kind: NodeKind,
  ) -> Result<Vec<Node>> {
    let stash = Stash::new(caller, "list nodes");
    let scope = self.caller_scope(&stash).await?;
    let nodes = self.store.list_nodes(kind).await?;
    Ok(scope_filter(nodes, kind, &scope))
  }

  /// List the direct children of `parent_id` having `kind`, scoped like
  /// [`Resolver::list_nodes`].
  pub async fn children(
    &self,
    caller: &Caller,
    kind: NodeKind,
    parent_id: Uuid,
  ) -> Result<Vec<Node>> {
    let stash = Stash::new(caller, "list children");
    let scope = self.caller_scope(&stash).await?;
    let nodes = self.store.children(kind, parent_id).await?;
    Ok(scope_filter(nodes, kind, &scope))
  }

  /// Exact-name lookup within a kind; several nodes may share a name under
  /// different parents. Open read — integrations use it to resolve device
  /// and event names arriving on the wire.
  pub async fn find_nodes(
    &self,
    _caller: &Caller,
    kind: NodeKind,
    name: &str,
  ) -> Result<Vec<Node>> {
    self.store.find_by_kind_and_name(kind, name).await
  }
}

/// Drop the nodes the scope does not allow. Events and root causes are not
/// permission-scoped and pass through untouched.
fn scope_filter(
  mut nodes: Vec<Node>,
  kind: NodeKind,
  scope: &ListScope,
) -> Vec<Node> {
  match kind {
    NodeKind::Site => nodes.retain(|n| scope.allows_site(n.id)),
    NodeKind::Area => nodes.retain(|n| scope.allows_area(n.id)),
    NodeKind::Process => nodes.retain(|n| scope.allows_process(n.id)),
    NodeKind::Station => nodes.retain(|n| scope.allows_station(n.id)),
    NodeKind::Device => nodes.retain(|n| scope.allows_device(n.id)),
    NodeKind::Event | NodeKind::RootCause => {}
  }
  nodes
}
