//! Error types for imagecast
//!
//! Renderers at the bottom of a pipeline produce typed errors; every
//! composition point above them either converts errors into "no value",
//! observes and drops them, or substitutes a fallback renderer. By the time
//! a result reaches display code the pipeline is errorless.
//!
//! All errors use the `thiserror` crate for minimal boilerplate and proper
//! error trait implementations. Errors that can cross the multicast layer
//! are `Clone` so an in-flight failure can be replayed to every waiter.

use thiserror::Error;

/// Result type alias for imagecast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for imagecast
///
/// Covers everything that can go wrong below the errorless pipeline
/// boundary. Each variant wraps a more specific error type.
#[derive(Error, Debug)]
pub enum Error {
  /// Remote fetch or decode error
  #[error("Remote error: {0}")]
  Remote(#[from] RemoteError),

  /// I/O error (file reading, cache storage, etc.)
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Generic error for miscellaneous issues
  #[error("{0}")]
  Other(String),
}

/// Errors produced while fetching and decoding remote images
///
/// Each failure mode is a distinct case so decorators can decide whether to
/// ignore, observe, or fall back per case.
///
/// # Examples
///
/// ```
/// use imagecast::error::RemoteError;
///
/// let error = RemoteError::BadStatus {
///     url: "https://example.com/image.png".to_string(),
///     status: 503,
/// };
/// assert!(format!("{}", error).contains("503"));
/// ```
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
  /// Network or transport failure before any response arrived
  #[error("Transport error fetching '{url}': {reason}")]
  Transport { url: String, reason: String },

  /// The server reported 404 for this URL
  #[error("Image not found at '{url}'")]
  NotFound { url: String },

  /// Any other response status outside [200, 300)
  #[error("Unexpected status {status} fetching '{url}'")]
  BadStatus { url: String, status: u16 },

  /// The response body is not an image payload
  #[error("Response from '{url}' is not an image (content-type: {content_type})")]
  UnexpectedResponse { url: String, content_type: String },

  /// The bytes could not be decoded as a bitmap
  #[error("Failed to decode image from '{url}': {reason}")]
  Decode { url: String, reason: String },

  /// A `data:` URL could not be parsed
  #[error("Invalid data URL: {reason}")]
  InvalidDataUrl { reason: String },
}

/// Marker error for renderers that terminated without producing a value.
///
/// This is the errorless boundary of a pipeline: a renderer whose error
/// type is `NoValue` cannot fail, it can only decline to emit. Consumers
/// treat it as "no result", never as a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no value produced")]
pub struct NoValue;
