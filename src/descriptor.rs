//! Render descriptors and results
//!
//! A descriptor is the immutable value identifying *what* to render and at
//! what size. Descriptor equality and hashing are the basis for request
//! coalescing and caching: equal descriptors must produce bit-identical
//! render results.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The decoded pixel payload produced by the image renderers.
///
/// Shared so that coalesced requesters receive the same allocation.
pub type Bitmap = Arc<image::RgbaImage>;

/// Convenience alias for the result type of the image pipeline.
pub type ImageResult = RenderResult<Bitmap>;

/// Logical size of a render target, in points.
///
/// Sizes taking part in rendering are finite and strictly positive; a
/// degenerate size is a caller bug, enforced by assertion at the rendering
/// boundaries rather than by this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSize {
  pub width: f32,
  pub height: f32,
}

// Usable sizes are never NaN, so the reflexivity Eq requires holds.
impl Eq for RenderSize {}

impl Hash for RenderSize {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.width.to_bits().hash(state);
    self.height.to_bits().hash(state);
  }
}

impl RenderSize {
  pub fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }

  /// Whether both dimensions are finite and strictly positive.
  pub fn is_usable(&self) -> bool {
    self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
  }

  /// Multiplies both dimensions, e.g. by a device scale factor.
  pub fn scaled(self, factor: f32) -> Self {
    Self {
      width: self.width * factor,
      height: self.height * factor,
    }
  }

  pub fn aspect_ratio(&self) -> f32 {
    self.width / self.height
  }

  /// Formats this size as a filesystem-safe cache grouping name.
  ///
  /// Dimensions are rendered to two decimal places: `(15.0, 10.0)` becomes
  /// `"15.00x10.00"`.
  pub fn subdirectory_name(&self) -> String {
    format!("{:.2}x{:.2}", self.width, self.height)
  }
}

/// Information required to produce an image.
///
/// Implementations carry whatever source-specific fields they need (a
/// remote URL, a local identifier, an arbitrary payload) next to the target
/// size. Descriptors are constructed per request, never mutated, and
/// compared structurally.
pub trait RenderDescriptor: Clone + Eq + Hash + Send + Sync + 'static {
  /// The size the final image will be displayed at.
  fn size(&self) -> RenderSize;
}

/// A rendered value plus provenance.
///
/// `cache_hit` is `false` for at most one delivery per logical render; any
/// replay of the same content reports `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult<T> {
  pub output: T,
  pub cache_hit: bool,
}

impl<T> RenderResult<T> {
  pub fn hit(output: T) -> Self {
    Self {
      output,
      cache_hit: true,
    }
  }

  pub fn miss(output: T) -> Self {
    Self {
      output,
      cache_hit: false,
    }
  }
}

/// Values a renderer can emit: a payload with optional provenance.
///
/// Decorators that need to read or rewrite provenance (fallback, multicast,
/// inflate) are generic over this trait so they can wrap renderers that
/// produce either bare payloads or full [`RenderResult`]s.
pub trait RenderOutcome: Send {
  type Payload: Clone + Send;

  /// The carried payload.
  fn payload(&self) -> Self::Payload;

  /// Whether this value came from a cache rather than fresh work.
  fn cache_hit(&self) -> bool;

  /// The same outcome carrying a different payload.
  fn replace_payload(self, payload: Self::Payload) -> Self;

  /// This outcome as an explicit result value.
  fn into_result(self) -> RenderResult<Self::Payload>
  where
    Self: Sized,
  {
    RenderResult {
      cache_hit: self.cache_hit(),
      output: self.payload(),
    }
  }
}

impl<T: Clone + Send> RenderOutcome for RenderResult<T> {
  type Payload = T;

  fn payload(&self) -> T {
    self.output.clone()
  }

  fn cache_hit(&self) -> bool {
    self.cache_hit
  }

  fn replace_payload(self, payload: T) -> Self {
    Self {
      output: payload,
      cache_hit: self.cache_hit,
    }
  }
}

// A freshly produced shared payload is implicitly not a cache hit.
impl<T: Send + Sync> RenderOutcome for Arc<T> {
  type Payload = Arc<T>;

  fn payload(&self) -> Arc<T> {
    Arc::clone(self)
  }

  fn cache_hit(&self) -> bool {
    false
  }

  fn replace_payload(self, payload: Arc<T>) -> Self {
    payload
  }
}
