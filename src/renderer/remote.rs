//! Leaf renderers: remote download and local lookup
//!
//! `RemoteImageRenderer` downloads and decodes the original image for a
//! descriptor carrying a URL; `LocalRenderer` hands back a bitmap the
//! descriptor already carries. Both ignore `RenderDescriptor::size`;
//! chain them with an
//! [`InflaterRenderer`](crate::renderer::InflaterRenderer) to rasterize at
//! the display size.

use super::Renderer;
use crate::descriptor::{Bitmap, RenderDescriptor, RenderSize};
use crate::error::RemoteError;
use crate::fetch::{HttpFetcher, ResourceFetcher};
use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;

/// A descriptor whose image is fetched from a URL.
pub trait RemoteRenderDescriptor: RenderDescriptor {
  fn image_url(&self) -> String;
}

/// A descriptor that already carries its bitmap.
pub trait LocalRenderDescriptor: RenderDescriptor {
  fn image(&self) -> Bitmap;
}

/// Renderer which downloads images.
///
/// Fetching goes through a [`ResourceFetcher`], so tests and offline modes
/// can inject their own transport. The response is validated (2xx status,
/// image payload) and decoded; each failure mode is a distinct
/// [`RemoteError`] case for upstream decorators to inspect.
pub struct RemoteImageRenderer<D> {
  fetcher: Arc<dyn ResourceFetcher>,
  _marker: PhantomData<fn(D)>,
}

impl<D: RemoteRenderDescriptor> RemoteImageRenderer<D> {
  /// Creates a renderer using the default [`HttpFetcher`].
  pub fn new() -> Self {
    Self::with_fetcher(Arc::new(HttpFetcher::new()))
  }

  /// Creates a renderer fetching through `fetcher`.
  pub fn with_fetcher(fetcher: Arc<dyn ResourceFetcher>) -> Self {
    Self {
      fetcher,
      _marker: PhantomData,
    }
  }
}

impl<D: RemoteRenderDescriptor> Default for RemoteImageRenderer<D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<D: RemoteRenderDescriptor> Renderer for RemoteImageRenderer<D> {
  type Descriptor = D;
  type Output = Bitmap;
  type Error = RemoteError;

  fn render(&self, descriptor: &D) -> Result<Bitmap, RemoteError> {
    let url = descriptor.image_url();
    let resource = self.fetcher.fetch(&url)?;

    match resource.status {
      404 => return Err(RemoteError::NotFound { url }),
      status if !resource.is_success() => return Err(RemoteError::BadStatus { url, status }),
      _ => {}
    }

    // A declared text payload is a server-side error page, not an image.
    if let Some(content_type) = &resource.content_type {
      if content_type.starts_with("text/") {
        return Err(RemoteError::UnexpectedResponse {
          url,
          content_type: content_type.clone(),
        });
      }
    }

    log::trace!("decoding {} bytes from {}", resource.bytes.len(), url);
    let decoded = image::load_from_memory(&resource.bytes).map_err(|e| RemoteError::Decode {
      url,
      reason: e.to_string(),
    })?;
    Ok(Arc::new(decoded.to_rgba8()))
  }
}

/// Renderer which produces the bitmap embedded in the descriptor.
pub struct LocalRenderer<D> {
  _marker: PhantomData<fn(D)>,
}

impl<D: LocalRenderDescriptor> LocalRenderer<D> {
  pub fn new() -> Self {
    Self {
      _marker: PhantomData,
    }
  }
}

impl<D: LocalRenderDescriptor> Default for LocalRenderer<D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<D: LocalRenderDescriptor> Renderer for LocalRenderer<D> {
  type Descriptor = D;
  type Output = Bitmap;
  type Error = Infallible;

  fn render(&self, descriptor: &D) -> Result<Bitmap, Infallible> {
    Ok(descriptor.image())
  }
}

/// A descriptor that is either local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceDescriptor<L, R> {
  Local(L),
  Remote(R),
}

impl<L, R> RenderDescriptor for SourceDescriptor<L, R>
where
  L: LocalRenderDescriptor,
  R: RemoteRenderDescriptor,
{
  fn size(&self) -> RenderSize {
    match self {
      Self::Local(descriptor) => descriptor.size(),
      Self::Remote(descriptor) => descriptor.size(),
    }
  }
}

/// Renderer which downloads images and/or serves bundled ones, depending on
/// the descriptor.
pub struct SourceRenderer<L, R> {
  local: LocalRenderer<L>,
  remote: RemoteImageRenderer<R>,
}

impl<L: LocalRenderDescriptor, R: RemoteRenderDescriptor> SourceRenderer<L, R> {
  pub fn new() -> Self {
    Self {
      local: LocalRenderer::new(),
      remote: RemoteImageRenderer::new(),
    }
  }

  pub fn with_fetcher(fetcher: Arc<dyn ResourceFetcher>) -> Self {
    Self {
      local: LocalRenderer::new(),
      remote: RemoteImageRenderer::with_fetcher(fetcher),
    }
  }
}

impl<L: LocalRenderDescriptor, R: RemoteRenderDescriptor> Default for SourceRenderer<L, R> {
  fn default() -> Self {
    Self::new()
  }
}

impl<L, R> Renderer for SourceRenderer<L, R>
where
  L: LocalRenderDescriptor,
  R: RemoteRenderDescriptor,
{
  type Descriptor = SourceDescriptor<L, R>;
  type Output = Bitmap;
  type Error = RemoteError;

  fn render(&self, descriptor: &SourceDescriptor<L, R>) -> Result<Bitmap, RemoteError> {
    match descriptor {
      SourceDescriptor::Local(local) => match self.local.render(local) {
        Ok(bitmap) => Ok(bitmap),
        Err(never) => match never {},
      },
      SourceDescriptor::Remote(remote) => self.remote.render(remote),
    }
  }
}
