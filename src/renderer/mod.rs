//! Renderer contract and composition
//!
//! A renderer maps one descriptor to one output, or to an error that
//! upstream decorators eliminate. Decorators each own exactly one inner
//! renderer and preserve its contract, so arbitrary chains compose:
//!
//! ```rust,ignore
//! let renderer = RemoteImageRenderer::new()
//!     .inflated(2.0, false, ContentMode::AspectFill)
//!     .with_cache(DiskCache::in_cache_subdirectory("thumbnails"))
//!     .map_output(|result| result.output)
//!     .ignore_errors()
//!     .multicast();
//! ```
//!
//! Renderers are blocking and intended to run on a background worker; the
//! [`RenderLoader`](crate::loader::RenderLoader) provides that context and
//! the cancellation semantics on top.

pub mod cache;
pub mod fallback;
pub mod inflate;
pub mod multicast;
pub mod process;
pub mod remote;

use crate::cache::Cache;
use crate::descriptor::{Bitmap, RenderDescriptor, RenderOutcome};
use crate::error::NoValue;
use std::marker::PhantomData;
use std::sync::Arc;

pub use cache::CacheRenderer;
pub use fallback::{ErrorIgnoringRenderer, FallbackRenderer};
pub use inflate::{fit_rect, ContentMode, FitRect, InflaterRenderer};
pub use multicast::{MemoryPressure, MulticastRenderer};
pub use process::ProcessingRenderer;
pub use remote::{
  LocalRenderDescriptor, LocalRenderer, RemoteImageRenderer, RemoteRenderDescriptor,
  SourceDescriptor, SourceRenderer,
};

/// Maps a descriptor to an output value.
///
/// `render` is a blocking call: network, disk and CPU work happen inline on
/// the calling thread, which is expected to be a background worker. The
/// call either produces an output, or an error that a wrapping decorator
/// will consume. Display consumers only ever observe "a result" or "no
/// result".
pub trait Renderer: Send + Sync {
  type Descriptor: RenderDescriptor;
  type Output: Send;
  type Error: Send;

  fn render(&self, descriptor: &Self::Descriptor) -> Result<Self::Output, Self::Error>;
}

// Allow Arc<R> to be used as a Renderer
impl<R: Renderer + ?Sized> Renderer for Arc<R> {
  type Descriptor = R::Descriptor;
  type Output = R::Output;
  type Error = R::Error;

  fn render(&self, descriptor: &Self::Descriptor) -> Result<Self::Output, Self::Error> {
    (**self).render(descriptor)
  }
}

/// A type-erased renderer.
///
/// Useful for heterogeneous composition and for building leaf renderers
/// from plain closures.
pub struct AnyRenderer<D, T, E> {
  render: Box<dyn Fn(&D) -> Result<T, E> + Send + Sync>,
}

impl<D: RenderDescriptor, T: Send, E: Send> AnyRenderer<D, T, E> {
  /// Erases the concrete type of `renderer`.
  pub fn new<R>(renderer: R) -> Self
  where
    R: Renderer<Descriptor = D, Output = T, Error = E> + 'static,
  {
    Self {
      render: Box::new(move |descriptor| renderer.render(descriptor)),
    }
  }

  /// Builds a renderer from a closure.
  pub fn from_fn<F>(render: F) -> Self
  where
    F: Fn(&D) -> Result<T, E> + Send + Sync + 'static,
  {
    Self {
      render: Box::new(render),
    }
  }
}

impl<D: RenderDescriptor, T: Send, E: Send> Renderer for AnyRenderer<D, T, E> {
  type Descriptor = D;
  type Output = T;
  type Error = E;

  fn render(&self, descriptor: &D) -> Result<T, E> {
    (self.render)(descriptor)
  }
}

/// A renderer that never produces a value.
///
/// Useful as the default placeholder for a
/// [`RenderLoader`](crate::loader::RenderLoader).
pub struct EmptyRenderer<D, T> {
  _marker: PhantomData<fn(D) -> T>,
}

impl<D, T> EmptyRenderer<D, T> {
  pub fn new() -> Self {
    Self {
      _marker: PhantomData,
    }
  }
}

impl<D, T> Default for EmptyRenderer<D, T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<D: RenderDescriptor, T: Send> Renderer for EmptyRenderer<D, T> {
  type Descriptor = D;
  type Output = T;
  type Error = NoValue;

  fn render(&self, _descriptor: &D) -> Result<T, NoValue> {
    Err(NoValue)
  }
}

/// Adapts a renderer to a different descriptor type.
///
/// This is how two renderers with different descriptor types end up in one
/// chain: the mapper projects the outer descriptor into the inner one.
pub struct MapDescriptor<R, D, F> {
  renderer: R,
  mapper: F,
  _marker: PhantomData<fn(D)>,
}

impl<R, D, F> Renderer for MapDescriptor<R, D, F>
where
  R: Renderer,
  D: RenderDescriptor,
  F: Fn(&D) -> R::Descriptor + Send + Sync,
{
  type Descriptor = D;
  type Output = R::Output;
  type Error = R::Error;

  fn render(&self, descriptor: &D) -> Result<R::Output, R::Error> {
    self.renderer.render(&(self.mapper)(descriptor))
  }
}

/// Applies a transform to every output of the inner renderer.
pub struct MapOutput<R, T, F> {
  renderer: R,
  mapper: F,
  _marker: PhantomData<fn() -> T>,
}

impl<R, T, F> Renderer for MapOutput<R, T, F>
where
  R: Renderer,
  T: Send,
  F: Fn(R::Output) -> T + Send + Sync,
{
  type Descriptor = R::Descriptor;
  type Output = T;
  type Error = R::Error;

  fn render(&self, descriptor: &R::Descriptor) -> Result<T, R::Error> {
    self.renderer.render(descriptor).map(&self.mapper)
  }
}

/// Combinators available on every renderer.
pub trait RendererExt: Renderer + Sized {
  /// Erases the concrete renderer type.
  fn boxed(self) -> AnyRenderer<Self::Descriptor, Self::Output, Self::Error>
  where
    Self: 'static,
  {
    AnyRenderer::new(self)
  }

  /// Maps the descriptor needed to produce images, by applying `mapper`.
  fn map_descriptor<D, F>(self, mapper: F) -> MapDescriptor<Self, D, F>
  where
    D: RenderDescriptor,
    F: Fn(&D) -> Self::Descriptor + Send + Sync,
  {
    MapDescriptor {
      renderer: self,
      mapper,
      _marker: PhantomData,
    }
  }

  /// Maps every produced output with `mapper`.
  fn map_output<T, F>(self, mapper: F) -> MapOutput<Self, T, F>
  where
    T: Send,
    F: Fn(Self::Output) -> T + Send + Sync,
  {
    MapOutput {
      renderer: self,
      mapper,
      _marker: PhantomData,
    }
  }

  /// Converts failures into "no value".
  ///
  /// Recommended when a placeholder path independently supplies content;
  /// otherwise prefer [`with_fallback`](RendererExt::with_fallback).
  fn ignore_errors(self) -> ErrorIgnoringRenderer<Self>
  where
    Self::Error: std::fmt::Debug,
  {
    ErrorIgnoringRenderer::new(self)
  }

  /// Like [`ignore_errors`](RendererExt::ignore_errors), but hands every
  /// dropped error to `observer` first. Purely observational: the observer
  /// cannot alter the outcome.
  fn log_and_ignore_errors<F>(self, observer: F) -> ErrorIgnoringRenderer<Self>
  where
    Self::Error: std::fmt::Debug,
    F: Fn(&Self::Error) + Send + Sync + 'static,
  {
    ErrorIgnoringRenderer::with_observer(self, observer)
  }

  /// Uses `secondary` whenever this renderer produces an error.
  fn with_fallback<S>(self, secondary: S) -> FallbackRenderer<Self, S>
  where
    S: Renderer<Descriptor = Self::Descriptor>,
    Self::Output: RenderOutcome,
    S::Output: RenderOutcome<Payload = <Self::Output as RenderOutcome>::Payload>,
  {
    FallbackRenderer::new(self, secondary)
  }

  /// Surrounds this renderer with a layer of caching.
  fn with_cache<C>(self, cache: C) -> CacheRenderer<Self, C>
  where
    C: Cache<Key = Self::Descriptor, Value = Self::Output>,
    Self::Output: Clone,
  {
    CacheRenderer::new(self, cache)
  }

  /// Rasterizes every produced bitmap into a canvas of the descriptor's
  /// size scaled by `scale`, placing it per `content_mode`.
  fn inflated(self, scale: f32, opaque: bool, content_mode: ContentMode) -> InflaterRenderer<Self>
  where
    Self::Output: RenderOutcome<Payload = Bitmap>,
  {
    InflaterRenderer::new(self, scale, opaque, content_mode)
  }

  /// Applies `block` to every produced bitmap.
  fn process<F>(self, block: F) -> ProcessingRenderer<Self, F>
  where
    Self::Output: RenderOutcome<Payload = Bitmap>,
    F: Fn(Bitmap, &Self::Descriptor) -> Bitmap + Send + Sync,
  {
    ProcessingRenderer::new(self, block)
  }

  /// Multicasts the results of this renderer: at most one in-flight render
  /// per descriptor, replayed to every requester.
  fn multicast(self) -> MulticastRenderer<Self>
  where
    Self::Output: RenderOutcome,
    Self::Error: Clone,
  {
    MulticastRenderer::new(self)
  }
}

impl<R: Renderer> RendererExt for R {}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::descriptor::RenderSize;

  #[derive(Clone, PartialEq, Eq, Hash, Debug)]
  struct TestDescriptor {
    id: u8,
    size: RenderSize,
  }

  impl RenderDescriptor for TestDescriptor {
    fn size(&self) -> RenderSize {
      self.size
    }
  }

  fn descriptor(id: u8) -> TestDescriptor {
    TestDescriptor {
      id,
      size: RenderSize::new(4.0, 4.0),
    }
  }

  #[test]
  fn from_fn_renderer_renders() {
    let renderer = AnyRenderer::<_, _, NoValue>::from_fn(|d: &TestDescriptor| Ok(d.id as u32 * 2));
    assert_eq!(renderer.render(&descriptor(4)), Ok(8));
  }

  #[test]
  fn boxed_preserves_behavior() {
    let renderer = AnyRenderer::<_, _, NoValue>::from_fn(|d: &TestDescriptor| Ok(d.id)).boxed();
    assert_eq!(renderer.render(&descriptor(7)), Ok(7));
  }

  #[test]
  fn arc_renderer_forwards() {
    let renderer = Arc::new(AnyRenderer::<_, _, NoValue>::from_fn(
      |d: &TestDescriptor| Ok(d.id),
    ));
    assert_eq!(renderer.render(&descriptor(3)), Ok(3));
  }

  #[test]
  fn empty_renderer_yields_nothing() {
    let renderer: EmptyRenderer<TestDescriptor, u32> = EmptyRenderer::new();
    assert_eq!(renderer.render(&descriptor(1)), Err(NoValue));
  }

  #[test]
  fn map_descriptor_projects_outer_descriptor() {
    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Outer {
      inner: TestDescriptor,
    }
    impl RenderDescriptor for Outer {
      fn size(&self) -> RenderSize {
        self.inner.size
      }
    }

    let renderer = AnyRenderer::<_, _, NoValue>::from_fn(|d: &TestDescriptor| Ok(d.id))
      .map_descriptor(|outer: &Outer| outer.inner.clone());

    let outer = Outer {
      inner: descriptor(9),
    };
    assert_eq!(renderer.render(&outer), Ok(9));
  }

  #[test]
  fn map_output_transforms_values() {
    let renderer = AnyRenderer::<_, _, NoValue>::from_fn(|d: &TestDescriptor| Ok(d.id))
      .map_output(|id| format!("#{id}"));
    assert_eq!(renderer.render(&descriptor(5)), Ok("#5".to_string()));
  }

  #[test]
  fn map_output_passes_errors_through() {
    let renderer =
      AnyRenderer::<TestDescriptor, u8, NoValue>::from_fn(|_| Err(NoValue)).map_output(|id| id + 1);
    assert_eq!(renderer.render(&descriptor(5)), Err(NoValue));
  }
}
