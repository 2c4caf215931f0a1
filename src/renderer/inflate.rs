//! Bitmap inflation
//!
//! Remote and local renderers produce bitmaps at whatever size the source
//! had; the inflater redraws them into a device-scaled canvas of the
//! descriptor's size, placing the source per the content mode's
//! rectangle-fitting rule. This is the CPU-heavy stage of a pipeline and is
//! expected to run on a background worker like every other renderer.

use super::Renderer;
use crate::descriptor::{Bitmap, RenderDescriptor, RenderOutcome, RenderSize};
use image::imageops;
use std::sync::Arc;

/// How a source bitmap is placed inside the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
  /// Scale to cover the whole canvas; the fitting axis may overflow.
  AspectFill,
  /// Scale to fit entirely inside the canvas; the fitting axis may leave
  /// empty borders.
  AspectFit,
}

/// The rectangle a source bitmap is drawn into, in canvas coordinates.
///
/// Offsets are negative when the drawn image overflows the canvas
/// (aspect-fill on the non-matching axis).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// Computes where to draw an image of `image_size` inside `canvas_size`.
///
/// Identical sizes (or aspect ratios equal within floating-point epsilon)
/// draw at the full canvas from the origin. Otherwise the scale factor is
/// the max (fill) or min (fit) of the per-axis ratios and the scaled image
/// is centered: offsets are `(canvas - scaled) / 2` per axis.
pub fn fit_rect(mode: ContentMode, image_size: RenderSize, canvas_size: RenderSize) -> FitRect {
  if image_size == canvas_size
    || (image_size.aspect_ratio() - canvas_size.aspect_ratio()).abs() < f32::EPSILON
  {
    return FitRect {
      x: 0.0,
      y: 0.0,
      width: canvas_size.width,
      height: canvas_size.height,
    };
  }

  let scale_x = canvas_size.width / image_size.width;
  let scale_y = canvas_size.height / image_size.height;
  let scale = match mode {
    ContentMode::AspectFill => scale_x.max(scale_y),
    ContentMode::AspectFit => scale_x.min(scale_y),
  };

  let width = image_size.width * scale;
  let height = image_size.height * scale;

  FitRect {
    x: (canvas_size.width - width) / 2.0,
    y: (canvas_size.height - height) / 2.0,
    width,
    height,
  }
}

/// Redraws `bitmap` into a canvas of `size` scaled by `scale`.
///
/// The canvas is transparent unless `opaque`, in which case it is filled
/// white. `size` must be usable; rendering at a degenerate size is a caller
/// bug.
pub fn inflate(
  bitmap: &Bitmap,
  size: RenderSize,
  scale: f32,
  opaque: bool,
  mode: ContentMode,
) -> Bitmap {
  assert!(
    size.is_usable() && scale > 0.0,
    "invalid inflate target: {:?} at scale {}",
    size,
    scale
  );

  let canvas_w = (size.width * scale).round().max(1.0) as u32;
  let canvas_h = (size.height * scale).round().max(1.0) as u32;
  let canvas_size = RenderSize::new(canvas_w as f32, canvas_h as f32);
  let image_size = RenderSize::new(bitmap.width() as f32, bitmap.height() as f32);

  let rect = fit_rect(mode, image_size, canvas_size);
  let draw_w = (rect.width.round() as i64).max(1) as u32;
  let draw_h = (rect.height.round() as i64).max(1) as u32;

  let background = if opaque {
    image::Rgba([255, 255, 255, 255])
  } else {
    image::Rgba([0, 0, 0, 0])
  };
  let mut canvas = image::RgbaImage::from_pixel(canvas_w, canvas_h, background);

  if (draw_w, draw_h) == (bitmap.width(), bitmap.height()) {
    imageops::overlay(&mut canvas, &**bitmap, rect.x.round() as i64, rect.y.round() as i64);
  } else {
    let scaled = imageops::resize(&**bitmap, draw_w, draw_h, imageops::FilterType::Triangle);
    imageops::overlay(&mut canvas, &scaled, rect.x.round() as i64, rect.y.round() as i64);
  }

  Arc::new(canvas)
}

/// Decorator that inflates every produced bitmap.
pub struct InflaterRenderer<R> {
  renderer: R,
  scale: f32,
  opaque: bool,
  content_mode: ContentMode,
}

impl<R> InflaterRenderer<R> {
  pub fn new(renderer: R, scale: f32, opaque: bool, content_mode: ContentMode) -> Self {
    Self {
      renderer,
      scale,
      opaque,
      content_mode,
    }
  }
}

impl<R> Renderer for InflaterRenderer<R>
where
  R: Renderer,
  R::Output: RenderOutcome<Payload = Bitmap>,
{
  type Descriptor = R::Descriptor;
  type Output = R::Output;
  type Error = R::Error;

  fn render(&self, descriptor: &R::Descriptor) -> Result<R::Output, R::Error> {
    let outcome = self.renderer.render(descriptor)?;
    let inflated = inflate(
      &outcome.payload(),
      descriptor.size(),
      self.scale,
      self.opaque,
      self.content_mode,
    );
    Ok(outcome.replace_payload(inflated))
  }
}
