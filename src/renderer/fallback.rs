//! Error-eliminating decorators
//!
//! The renderer contract at the pipeline boundary is errorless: these
//! decorators are how fallible leaves (network fetch, decode) are folded
//! into that contract. `ErrorIgnoringRenderer` turns a failure into "no
//! value"; `FallbackRenderer` substitutes a whole other renderer.

use super::Renderer;
use crate::descriptor::{RenderOutcome, RenderResult};
use crate::error::NoValue;

type ErrorObserver<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Decorator that ignores errors from a renderer.
///
/// On failure the wrapped error is handed to the observer (when one was
/// configured), logged, and replaced with [`NoValue`]: the renderer
/// terminates without a value instead of failing.
pub struct ErrorIgnoringRenderer<R: Renderer> {
  renderer: R,
  observer: Option<ErrorObserver<R::Error>>,
}

impl<R: Renderer> ErrorIgnoringRenderer<R>
where
  R::Error: std::fmt::Debug,
{
  pub fn new(renderer: R) -> Self {
    Self {
      renderer,
      observer: None,
    }
  }

  /// Also hands every dropped error to `observer`. The observer is purely
  /// diagnostic and cannot alter the outcome.
  pub fn with_observer<F>(renderer: R, observer: F) -> Self
  where
    F: Fn(&R::Error) + Send + Sync + 'static,
  {
    Self {
      renderer,
      observer: Some(Box::new(observer)),
    }
  }
}

impl<R: Renderer> Renderer for ErrorIgnoringRenderer<R>
where
  R::Error: std::fmt::Debug,
{
  type Descriptor = R::Descriptor;
  type Output = R::Output;
  type Error = NoValue;

  fn render(&self, descriptor: &R::Descriptor) -> Result<R::Output, NoValue> {
    match self.renderer.render(descriptor) {
      Ok(output) => Ok(output),
      Err(error) => {
        if let Some(observer) = &self.observer {
          observer(&error);
        }
        log::debug!("render error ignored: {:?}", error);
        Err(NoValue)
      }
    }
  }
}

/// Decorator that falls back from one renderer to another.
///
/// The primary renderer's failure is never observable downstream: on error
/// the secondary renderer runs and its outcome (success or failure) becomes
/// the outward result. Both sides' outcomes are unified into a
/// [`RenderResult`], each keeping its own cache-hit flag.
pub struct FallbackRenderer<P, S> {
  primary: P,
  secondary: S,
}

impl<P, S> FallbackRenderer<P, S> {
  pub fn new(primary: P, secondary: S) -> Self {
    Self { primary, secondary }
  }
}

impl<P, S> Renderer for FallbackRenderer<P, S>
where
  P: Renderer,
  S: Renderer<Descriptor = P::Descriptor>,
  P::Output: RenderOutcome,
  S::Output: RenderOutcome<Payload = <P::Output as RenderOutcome>::Payload>,
{
  type Descriptor = P::Descriptor;
  type Output = RenderResult<<P::Output as RenderOutcome>::Payload>;
  type Error = S::Error;

  fn render(&self, descriptor: &P::Descriptor) -> Result<Self::Output, S::Error> {
    match self.primary.render(descriptor) {
      Ok(outcome) => Ok(outcome.into_result()),
      Err(_) => self
        .secondary
        .render(descriptor)
        .map(RenderOutcome::into_result),
    }
  }
}
