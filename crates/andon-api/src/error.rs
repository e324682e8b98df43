//! The HTTP error envelope.
//!
//! Every failure leaves the server as
//! `{"error": {"code": "...", "message": "..."}}` with a status derived
//! from the code, so clients can match on `code` without parsing
//! messages. Domain errors keep the code they were raised with;
//! [`ApiError::Unauthenticated`] is the one purely transport-level
//! failure and answers `401` with a Basic challenge.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  /// Basic credentials were missing, malformed, or wrong.
  #[error("missing or invalid credentials")]
  Unauthenticated,

  /// The first path segment named no known node collection.
  #[error("unknown collection {0:?}")]
  UnknownCollection(String),

  #[error(transparent)]
  Core(#[from] andon_core::Error),

  #[error(transparent)]
  Ingest(#[from] andon_ingest::Error),
}

impl ApiError {
  fn code(&self) -> &'static str {
    match self {
      Self::Unauthenticated => "Unauthenticated",
      Self::UnknownCollection(_) => "NotFound",
      Self::Core(err) => err.code(),
      Self::Ingest(err) => err.code(),
    }
  }

  fn status(&self) -> StatusCode {
    match self.code() {
      "Unauthenticated" => StatusCode::UNAUTHORIZED,
      // A role that exists but may not do this is 403, not 401.
      "Unauthorized" => StatusCode::FORBIDDEN,
      "DataDuplicatedError" | "ConflictError" => StatusCode::CONFLICT,
      "NotFound" => StatusCode::NOT_FOUND,
      "InvalidTransition" | "InvalidParent" | "InvalidInput"
      | "UnknownDevice" | "UnknownEvent" => StatusCode::UNPROCESSABLE_ENTITY,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = Json(json!({
      "error": { "code": self.code(), "message": self.to_string() },
    }));
    let mut response = (status, body).into_response();
    if status == StatusCode::UNAUTHORIZED {
      response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"andon\""),
      );
    }
    response
  }
}
