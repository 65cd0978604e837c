//! JSON encoding of run statuses.
//!
//! Times are written in UTC as `YYYY-MM-DD HH:MM:SS`. An absent time is
//! written as [`TIME_EMPTY`] so it can never be confused with a real instant.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::StatusError;
use crate::status::RunStatus;

/// Format of every persisted timestamp.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Token persisted in place of an absent timestamp.
pub const TIME_EMPTY: &str = "-";

/// Render an optional time for persistence or display.
pub fn format_time(time: Option<&DateTime<Utc>>) -> String {
  match time {
    Some(t) => t.format(TIME_FORMAT).to_string(),
    None => TIME_EMPTY.to_string(),
  }
}

/// Parse a persisted time. [`TIME_EMPTY`] yields `None`.
pub fn parse_time(value: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
  if value == TIME_EMPTY {
    return Ok(None);
  }
  NaiveDateTime::parse_from_str(value, TIME_FORMAT).map(|t| Some(t.and_utc()))
}

/// Encode a run status as UTF-8 JSON bytes.
pub fn serialize(status: &RunStatus) -> Result<Vec<u8>, StatusError> {
  serde_json::to_vec(status).map_err(StatusError::Encode)
}

/// Decode a run status from JSON bytes.
pub fn deserialize(bytes: &[u8]) -> Result<RunStatus, StatusError> {
  serde_json::from_slice(bytes).map_err(StatusError::MalformedRecord)
}

impl RunStatus {
  /// Encode as a single-line JSON record.
  pub fn to_json(&self) -> Result<String, StatusError> {
    serde_json::to_string(self).map_err(StatusError::Encode)
  }

  /// Decode from a JSON record.
  pub fn from_json(json: &str) -> Result<Self, StatusError> {
    serde_json::from_str(json).map_err(StatusError::MalformedRecord)
  }
}

/// serde adapter for `Option<DateTime<Utc>>` fields. The field is required
/// on input; absence is expressed by [`TIME_EMPTY`], not by omission.
pub(crate) mod optional_time {
  use chrono::{DateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&super::format_time(value.as_ref()))
  }

  pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
  where
    D: Deserializer<'de>,
  {
    let raw = String::deserialize(deserializer)?;
    super::parse_time(&raw)
      .map_err(|e| serde::de::Error::custom(format!("invalid time '{raw}': {e}")))
  }
}
