//! External integration intake for the andon service.
//!
//! Two pipelines feed the same dispatch path the kiosk uses:
//!
//! - **telemetry**: arbitrary device JSON, normalized by a configured
//!   [`MessageConvention`] into a [`DeviceSignal`].
//! - **anomaly**: detector report bodies, deduped by content hash and
//!   gated on the detector's own threshold.
//!
//! The transport (IoT topics, bucket notifications) stays outside; this
//! crate exposes only the intake calls the API mounts.

pub mod anomaly;
pub mod dispatch;
pub mod error;
pub mod telemetry;


use std::sync::Arc;

use andon_core::{
  caller::Caller,
  store::{HierarchyStore, IssueStore},
};
use andon_resolver::Resolver;
use tracing::debug;

pub use crate::{
  anomaly::{AnomalyReport, SeenReports},
  dispatch::{Dispatcher, IngestOutcome},
  error::{Error, Result},
  telemetry::{DeviceSignal, MessageConvention, SignalAction},
};

/// The assembled intake: one convention, one dedupe set, one dispatcher.
pub struct Ingestor<S> {
  convention: MessageConvention,
  dispatcher: Dispatcher<S>,
  seen:       SeenReports,
}

impl<S: HierarchyStore + IssueStore> Ingestor<S> {
  pub fn new(
    resolver: Arc<Resolver<S>>,
    convention: MessageConvention,
    caller: Caller,
  ) -> Self {
    Self {
      convention,
      dispatcher: Dispatcher::new(resolver, caller),
      seen: SeenReports::new(),
    }
  }

  /// Telemetry entry point: one raw message through the convention and
  /// into the dispatcher.
  pub async fn telemetry(
    &self,
    message: &serde_json::Value,
  ) -> Result<IngestOutcome> {
    let signal = self.convention.normalize(message)?;
    self.dispatcher.dispatch(signal).await
  }

  /// Anomaly entry point: one raw report body, deduped and gated before
  /// dispatch.
  pub async fn anomaly(&self, body: &str) -> Result<IngestOutcome> {
    if !self.seen.insert(body).await {
      debug!("duplicate anomaly report body");
      return Ok(IngestOutcome::Duplicate);
    }

    let report: AnomalyReport = serde_json::from_str(body)?;
    if !report.is_alerting() {
      debug!(
        score = report.score,
        threshold = report.threshold,
        "report below threshold"
      );
      return Ok(IngestOutcome::BelowThreshold);
    }

    self.dispatcher.dispatch(report.to_signal()?).await
  }
}
