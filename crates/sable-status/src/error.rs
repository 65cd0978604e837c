use thiserror::Error;

/// Errors produced by the status codec.
#[derive(Debug, Error)]
pub enum StatusError {
  /// The record is not well-formed JSON, is missing a required field, or
  /// carries a value that cannot be decoded. Treat as "no prior status".
  #[error("malformed status record: {0}")]
  MalformedRecord(#[source] serde_json::Error),

  /// The status could not be encoded.
  #[error("failed to encode status: {0}")]
  Encode(#[source] serde_json::Error),
}

/// Errors produced by the status file store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("status file io error: {0}")]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Status(#[from] StatusError),
}

impl StoreError {
  /// Whether the stored record exists but could not be decoded.
  ///
  /// Callers treat such a run as never having run.
  pub fn is_malformed(&self) -> bool {
    matches!(self, StoreError::Status(StatusError::MalformedRecord(_)))
  }
}
