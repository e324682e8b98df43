//! Anomaly-report intake: gate on the detector's own threshold and drop
//! repeated copies of the same report body.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::{
  error::Result,
  telemetry::{DeviceSignal, SignalAction},
};

/// One anomaly-detection report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
  /// Name of the detector that produced the report.
  pub detector:    String,
  pub device_name: String,
  pub event_name:  String,
  pub score:       f64,
  /// The detector's own alerting threshold; only `score >= threshold`
  /// opens an issue.
  pub threshold:   f64,
  #[serde(default)]
  pub observed_at: Option<DateTime<Utc>>,
}

impl AnomalyReport {
  pub fn is_alerting(&self) -> bool { self.score >= self.threshold }

  /// The open signal this report drives, carrying the report itself as
  /// the details payload.
  pub fn to_signal(&self) -> Result<DeviceSignal> {
    Ok(DeviceSignal {
      device_name: self.device_name.clone(),
      event_name:  self.event_name.clone(),
      action:      SignalAction::Open,
      details:     serde_json::to_value(self).map_err(crate::Error::Json)?,
    })
  }
}

/// Content-hash memory of report bodies already handled. A body is
/// remembered on first sight, whatever became of it afterwards — detectors
/// that re-deliver a file get exactly one processing attempt per distinct
/// body.
#[derive(Default)]
pub struct SeenReports {
  digests: Mutex<HashSet<String>>,
}

impl SeenReports {
  pub fn new() -> Self { Self::default() }

  /// Record `body`. Returns `false` when an identical body was already
  /// recorded.
  pub async fn insert(&self, body: &str) -> bool {
    let digest = hex::encode(Sha256::digest(body.as_bytes()));
    self.digests.lock().await.insert(digest)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn alerting_compares_score_to_threshold() {
    let mut report: AnomalyReport = serde_json::from_value(serde_json::json!({
      "detector": "vibration-v2",
      "device_name": "press-a",
      "event_name": "bearing wear",
      "score": 0.91,
      "threshold": 0.8,
    }))
    .unwrap();
    assert!(report.is_alerting());

    report.score = 0.79;
    assert!(!report.is_alerting());

    // The boundary itself alerts.
    report.score = report.threshold;
    assert!(report.is_alerting());
  }

  #[test]
  fn report_converts_to_an_open_signal() {
    let report = AnomalyReport {
      detector:    "vibration-v2".into(),
      device_name: "press-a".into(),
      event_name:  "bearing wear".into(),
      score:       0.91,
      threshold:   0.8,
      observed_at: None,
    };
    let signal = report.to_signal().unwrap();
    assert_eq!(signal.action, SignalAction::Open);
    assert_eq!(signal.device_name, "press-a");
    assert_eq!(signal.details["detector"], "vibration-v2");
  }

  #[tokio::test]
  async fn identical_bodies_are_seen_once() {
    let seen = SeenReports::new();
    assert!(seen.insert(r#"{"score": 1}"#).await);
    assert!(!seen.insert(r#"{"score": 1}"#).await);
    // Any textual difference is a different body.
    assert!(seen.insert(r#"{"score": 2}"#).await);
  }
}
