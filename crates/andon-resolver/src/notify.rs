//! Notification fan-out: Event nodes bound to contact endpoints.
//!
//! The registry maps each Event to the email/SMS endpoints from its
//! [`EventDetail`]: bind on event create, rewire on event update when the
//! contacts changed, drop on event delete. At startup the registry is
//! hydrated from stored events so subscriptions survive restarts.
//!
//! Delivery goes through a [`NotificationSink`]. Wiring and delivery are
//! best-effort, never transactional with the entity write: every failure
//! is logged at `warn` and swallowed.

use std::{collections::HashMap, sync::Arc};

use andon_core::{
  issue::Issue,
  node::{EventDetail, Node, NodeDetail},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ─── Messages ────────────────────────────────────────────────────────────────

/// How a contact endpoint is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChannel {
  Email,
  Sms,
}

/// One message bound for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub channel:  ContactChannel,
  pub endpoint: String,
  pub subject:  String,
  pub body:     String,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

/// Delivery backend. The production sink logs; tests capture.
pub trait NotificationSink: Send + Sync {
  fn deliver(&self, outgoing: &Notification) -> Result<(), DeliveryError>;
}

/// Sink that writes deliveries to the log. Stands in for a mail or SMS
/// gateway in deployments that have none configured.
pub struct LogSink;

impl NotificationSink for LogSink {
  fn deliver(&self, outgoing: &Notification) -> Result<(), DeliveryError> {
    info!(
      channel = ?outgoing.channel,
      endpoint = %outgoing.endpoint,
      subject = %outgoing.subject,
      "notification"
    );
    Ok(())
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// The endpoints subscribed to one event topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Contacts {
  email: Option<String>,
  sms:   Option<String>,
}

impl Contacts {
  fn of(detail: &EventDetail) -> Self {
    Self { email: detail.email.clone(), sms: detail.sms.clone() }
  }

  fn is_empty(&self) -> bool { self.email.is_none() && self.sms.is_none() }
}

/// In-process topic registry keyed by Event node id.
pub struct Notifier {
  sink:   Arc<dyn NotificationSink>,
  topics: RwLock<HashMap<Uuid, Contacts>>,
}

impl Notifier {
  pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
    Self { sink, topics: RwLock::new(HashMap::new()) }
  }

  /// A notifier that delivers to the log only.
  pub fn log_only() -> Self { Self::new(Arc::new(LogSink)) }

  /// Bind an event's contacts. An event without contacts holds no topic.
  pub async fn subscribe(&self, event_id: Uuid, detail: &EventDetail) {
    let contacts = Contacts::of(detail);
    let mut topics = self.topics.write().await;
    if contacts.is_empty() {
      topics.remove(&event_id);
    } else {
      debug!(event = %event_id, "contacts subscribed");
      topics.insert(event_id, contacts);
    }
  }

  /// Rewire after an event update. When the contacts are unchanged this is
  /// a no-op; otherwise the old endpoints are dropped and the new ones
  /// bound.
  pub async fn resubscribe(
    &self,
    event_id: Uuid,
    previous: &EventDetail,
    current: &EventDetail,
  ) {
    if Contacts::of(previous) == Contacts::of(current) {
      return;
    }
    info!(event = %event_id, "contact endpoints changed, rewiring");
    self.subscribe(event_id, current).await;
  }

  /// Drop an event's topic. Safe to call for events that never had one.
  pub async fn unsubscribe(&self, event_id: Uuid) {
    if self.topics.write().await.remove(&event_id).is_some() {
      debug!(event = %event_id, "contacts unsubscribed");
    }
  }

  /// Rebuild the registry from stored Event nodes. Non-event nodes in the
  /// slice are skipped.
  pub async fn hydrate(&self, events: &[Node]) {
    let mut topics = self.topics.write().await;
    topics.clear();
    for node in events {
      if let NodeDetail::Event(detail) = &node.detail {
        let contacts = Contacts::of(detail);
        if !contacts.is_empty() {
          topics.insert(node.id, contacts);
        }
      }
    }
    info!(topics = topics.len(), "notifier hydrated");
  }

  /// Fan out an "issue opened" message to the contacts subscribed to the
  /// issue's event. Failures are logged and swallowed.
  pub async fn issue_opened(&self, issue: &Issue) {
    let Some(contacts) =
      self.topics.read().await.get(&issue.event_id).cloned()
    else {
      return;
    };

    let subject = format!(
      "[andon] {} at {}",
      issue.event_description, issue.device_name
    );
    let body = format!(
      "{} raised at {}/{}/{}/{} with priority {}.",
      issue.event_description,
      issue.site_name,
      issue.area_name,
      issue.station_name,
      issue.device_name,
      issue.priority,
    );

    let endpoints = [
      (ContactChannel::Email, contacts.email),
      (ContactChannel::Sms, contacts.sms),
    ];
    for (channel, endpoint) in endpoints {
      let Some(endpoint) = endpoint else { continue };
      let outgoing = Notification {
        channel,
        endpoint,
        subject: subject.clone(),
        body: body.clone(),
      };
      if let Err(err) = self.sink.deliver(&outgoing) {
        warn!(%err, channel = ?channel, "notification delivery failed");
      }
    }
  }
}
