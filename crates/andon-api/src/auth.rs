//! HTTP Basic authentication against the configured account table.
//!
//! Accounts are `(username, PHC password hash, role)` rows in the server
//! config; there is no user store behind them. A verified request yields
//! the [`Caller`] that the resolver layer then holds to its role rules —
//! this module only answers *who*, never *may they*.

use std::collections::HashMap;

use andon_core::{
  caller::{Caller, Role},
  store::{HierarchyStore, IssueStore},
};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// One login as it appears under `[[accounts]]` in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
  pub username:      String,
  /// PHC string as produced by `andon-server --hash-password`.
  pub password_hash: String,
  pub role:          Role,
}

/// The account table, keyed by username.
pub struct Accounts {
  by_username: HashMap<String, Account>,
}

impl Accounts {
  pub fn new(accounts: Vec<Account>) -> Self {
    let by_username = accounts
      .into_iter()
      .map(|account| (account.username.clone(), account))
      .collect();
    Self { by_username }
  }

  /// Check a username/password pair. `None` covers unknown users,
  /// unparseable hashes and wrong passwords alike — the caller cannot
  /// distinguish which, and neither can the response.
  fn verify(&self, username: &str, password: &str) -> Option<Caller> {
    let account = self.by_username.get(username)?;
    let hash = PasswordHash::new(&account.password_hash).ok()?;
    Argon2::default()
      .verify_password(password.as_bytes(), &hash)
      .ok()?;
    Some(Caller::new(&account.username, account.role))
  }
}

/// Decode and verify an `Authorization: Basic …` header.
pub fn verify_basic(
  headers: &HeaderMap,
  accounts: &Accounts,
) -> Result<Caller, ApiError> {
  let header_value = headers
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .ok_or(ApiError::Unauthenticated)?;
  let encoded = header_value
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthenticated)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthenticated)?;
  let credentials =
    String::from_utf8(decoded).map_err(|_| ApiError::Unauthenticated)?;
  let (username, password) = credentials
    .split_once(':')
    .ok_or(ApiError::Unauthenticated)?;
  accounts
    .verify(username, password)
    .ok_or(ApiError::Unauthenticated)
}

/// Extractor that gates a handler on valid Basic credentials and hands
/// it the resolved caller.
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_basic(&parts.headers, &state.accounts).map(Authenticated)
  }
}
