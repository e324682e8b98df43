//! Caller identity — who is invoking an operation, and with which role.
//!
//! Roles come from the server's account table; permission records (see
//! [`crate::permission`]) further scope what a non-admin caller may list.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Operator role attached to an authenticated account.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
  /// Full control: hierarchy and permission mutations, unrestricted reads.
  Admin,
  /// Reporting and issue handling; reads subject to permission scoping.
  Manager,
  /// Observer-board duty: acknowledge/close/reject issues.
  Engineer,
  /// Kiosk duty: raise and withdraw issues.
  Associate,
}

/// An authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
  /// Stable user identifier; also the key of the caller's permission record.
  pub user_id: String,
  pub role:    Role,
}

impl Caller {
  pub fn new(user_id: impl Into<String>, role: Role) -> Self {
    Self { user_id: user_id.into(), role }
  }

  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
