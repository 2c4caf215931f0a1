//! Image processing decorator

use super::Renderer;
use crate::descriptor::{Bitmap, RenderOutcome};

/// Decorator that derives a new bitmap from every produced one.
///
/// The block receives the bitmap and the descriptor, so processing can
/// depend on the request (e.g. rounding corners to the target size).
/// Provenance is preserved: a cache hit stays a cache hit.
pub struct ProcessingRenderer<R, F> {
  renderer: R,
  block: F,
}

impl<R, F> ProcessingRenderer<R, F> {
  pub fn new(renderer: R, block: F) -> Self {
    Self { renderer, block }
  }
}

impl<R, F> Renderer for ProcessingRenderer<R, F>
where
  R: Renderer,
  R::Output: RenderOutcome<Payload = Bitmap>,
  F: Fn(Bitmap, &R::Descriptor) -> Bitmap + Send + Sync,
{
  type Descriptor = R::Descriptor;
  type Output = R::Output;
  type Error = R::Error;

  fn render(&self, descriptor: &R::Descriptor) -> Result<R::Output, R::Error> {
    let outcome = self.renderer.render(descriptor)?;
    let processed = (self.block)(outcome.payload(), descriptor);
    Ok(outcome.replace_payload(processed))
  }
}
