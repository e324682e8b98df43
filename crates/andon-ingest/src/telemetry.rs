//! Telemetry normalization: arbitrary device JSON → [`DeviceSignal`].
//!
//! Devices do not speak the issue vocabulary; a [`MessageConvention`]
//! configured per deployment says where in the message the
//! `"<device><delimiter><event>"` key lives and, optionally, which
//! attribute distinguishes an opening signal from a closing one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Whether a signal opens or closes an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
  Open,
  Close,
}

/// A device message normalized against a convention.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSignal {
  pub device_name: String,
  pub event_name:  String,
  pub action:      SignalAction,
  /// The full original message, carried onto the issue as its
  /// additional details.
  pub details:     Value,
}

/// How a deployment's device telemetry encodes which issue to raise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConvention {
  /// Dotted path to the attribute holding `"<device><delimiter><event>"`.
  pub attribute: String,

  /// Separator between the device and event names.
  #[serde(default = "default_delimiter")]
  pub delimiter: String,

  /// Optional dotted path to an attribute carrying an open/close marker.
  /// When absent every message opens.
  #[serde(default)]
  pub status_attribute: Option<String>,

  #[serde(default = "default_open_value")]
  pub open_value: String,

  #[serde(default = "default_close_value")]
  pub close_value: String,
}

fn default_delimiter() -> String { "/".into() }
fn default_open_value() -> String { "open".into() }
fn default_close_value() -> String { "close".into() }

impl MessageConvention {
  /// A convention with the default delimiter and status values.
  pub fn new(attribute: impl Into<String>) -> Self {
    Self {
      attribute:        attribute.into(),
      delimiter:        default_delimiter(),
      status_attribute: None,
      open_value:       default_open_value(),
      close_value:      default_close_value(),
    }
  }

  pub fn with_status(
    mut self,
    attribute: impl Into<String>,
    open_value: impl Into<String>,
    close_value: impl Into<String>,
  ) -> Self {
    self.status_attribute = Some(attribute.into());
    self.open_value = open_value.into();
    self.close_value = close_value.into();
    self
  }

  /// Normalize one raw message. Fails with a descriptive error when the
  /// keyed attribute is missing, does not split on the delimiter, or the
  /// status attribute holds an unrecognized value.
  pub fn normalize(&self, message: &Value) -> Result<DeviceSignal> {
    let raw = lookup(message, &self.attribute)
      .and_then(Value::as_str)
      .ok_or_else(|| Error::MissingAttribute(self.attribute.clone()))?;

    let Some((device_name, event_name)) =
      raw.split_once(self.delimiter.as_str())
    else {
      return Err(Error::MalformedKey {
        value:     raw.to_string(),
        delimiter: self.delimiter.clone(),
      });
    };
    if device_name.is_empty() || event_name.is_empty() {
      return Err(Error::MalformedKey {
        value:     raw.to_string(),
        delimiter: self.delimiter.clone(),
      });
    }

    let action = match &self.status_attribute {
      None => SignalAction::Open,
      Some(path) => {
        let status = lookup(message, path)
          .and_then(Value::as_str)
          .ok_or_else(|| Error::MissingAttribute(path.clone()))?;
        if status == self.open_value {
          SignalAction::Open
        } else if status == self.close_value {
          SignalAction::Close
        } else {
          return Err(Error::UnknownStatus(status.to_string()));
        }
      }
    };

    Ok(DeviceSignal {
      device_name: device_name.to_string(),
      event_name: event_name.to_string(),
      action,
      details: message.clone(),
    })
  }
}

/// Walk a dotted path into the message. `"a.b"` reads `message["a"]["b"]`.
fn lookup<'v>(message: &'v Value, path: &str) -> Option<&'v Value> {
  let mut cursor = message;
  for segment in path.split('.') {
    cursor = cursor.get(segment)?;
  }
  Some(cursor)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn default_convention_opens() {
    let convention = MessageConvention::new("alarmKey");
    let signal = convention
      .normalize(&json!({ "alarmKey": "press-a/belt jam", "rpm": 0 }))
      .unwrap();

    assert_eq!(signal.device_name, "press-a");
    assert_eq!(signal.event_name, "belt jam");
    assert_eq!(signal.action, SignalAction::Open);
    assert_eq!(signal.details["rpm"], 0);
  }

  #[test]
  fn nested_attribute_paths_resolve() {
    let convention = MessageConvention::new("meta.alarm.key");
    let signal = convention
      .normalize(&json!({ "meta": { "alarm": { "key": "press-a/jam" } } }))
      .unwrap();
    assert_eq!(signal.device_name, "press-a");
  }

  #[test]
  fn custom_delimiter_splits_on_first_occurrence() {
    let mut convention = MessageConvention::new("key");
    convention.delimiter = "#".into();
    let signal =
      convention.normalize(&json!({ "key": "press-a#belt#jam" })).unwrap();
    assert_eq!(signal.device_name, "press-a");
    assert_eq!(signal.event_name, "belt#jam");
  }

  #[test]
  fn missing_attribute_is_descriptive() {
    let convention = MessageConvention::new("alarmKey");
    let err = convention.normalize(&json!({ "other": 1 })).unwrap_err();
    assert!(matches!(err, Error::MissingAttribute(ref a) if a == "alarmKey"));
    // A non-string value at the path is just as missing.
    let err = convention.normalize(&json!({ "alarmKey": 42 })).unwrap_err();
    assert!(matches!(err, Error::MissingAttribute(_)));
  }

  #[test]
  fn keys_must_split_into_two_names() {
    let convention = MessageConvention::new("key");
    for bad in ["no-delimiter", "/leading", "trailing/"] {
      let err = convention.normalize(&json!({ "key": bad })).unwrap_err();
      assert!(matches!(err, Error::MalformedKey { .. }), "key {bad:?}");
    }
  }

  #[test]
  fn status_attribute_selects_the_action() {
    let convention =
      MessageConvention::new("key").with_status("state", "ALARM", "OK");

    let open = convention
      .normalize(&json!({ "key": "press-a/jam", "state": "ALARM" }))
      .unwrap();
    assert_eq!(open.action, SignalAction::Open);

    let close = convention
      .normalize(&json!({ "key": "press-a/jam", "state": "OK" }))
      .unwrap();
    assert_eq!(close.action, SignalAction::Close);

    let err = convention
      .normalize(&json!({ "key": "press-a/jam", "state": "WAT" }))
      .unwrap_err();
    assert!(matches!(err, Error::UnknownStatus(ref s) if s == "WAT"));

    let err = convention
      .normalize(&json!({ "key": "press-a/jam" }))
      .unwrap_err();
    assert!(matches!(err, Error::MissingAttribute(ref a) if a == "state"));
  }
}
