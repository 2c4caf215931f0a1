//! Cache decorator
//!
//! Short-circuits rendering by checking a [`Cache`] for a previously stored
//! value keyed by descriptor. A miss is internal control flow that falls
//! back to the wrapped renderer and persists the fresh output; it is never
//! an observable error.

use super::Renderer;
use crate::cache::Cache;
use crate::descriptor::RenderResult;

/// Decorates a renderer with a layer of caching.
///
/// Where the cache sits in the chain decides what gets cached: wrapping an
/// inflater caches post-processed bitmaps, wrapping the remote renderer
/// caches raw downloads.
pub struct CacheRenderer<R, C> {
  renderer: R,
  cache: C,
}

impl<R, C> CacheRenderer<R, C> {
  pub fn new(renderer: R, cache: C) -> Self {
    Self { renderer, cache }
  }
}

impl<R, C> Renderer for CacheRenderer<R, C>
where
  R: Renderer,
  R::Output: Clone,
  C: Cache<Key = R::Descriptor, Value = R::Output>,
{
  type Descriptor = R::Descriptor;
  type Output = RenderResult<R::Output>;
  type Error = R::Error;

  /// Returns the cached value when present, otherwise invokes the wrapped
  /// renderer and stores its output before returning it.
  fn render(&self, descriptor: &R::Descriptor) -> Result<Self::Output, R::Error> {
    if let Some(value) = self.cache.lookup(descriptor) {
      return Ok(RenderResult::hit(value));
    }

    let output = self.renderer.render(descriptor)?;
    self.cache.store(descriptor, Some(output.clone()));
    Ok(RenderResult::miss(output))
  }
}
