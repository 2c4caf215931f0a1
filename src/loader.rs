//! Request coordination
//!
//! `RenderLoader` binds a stream of descriptor updates (typically produced
//! by view geometry and data changes) to a stream of render events, with
//! latest-wins semantics: a new request invalidates interest in the
//! previous one's output, and a stale result is never delivered. The
//! multicast layer underneath may still hand that result to other
//! requesters of the same descriptor.
//!
//! Pipelines run on a private worker pool; the thread draining the event
//! receiver is the UI-affinity context. Consumers must not assume a single
//! emission per request: a reset (or a placeholder result) precedes the
//! final result.

use crate::descriptor::{RenderDescriptor, RenderOutcome, RenderResult};
use crate::renderer::{EmptyRenderer, Renderer};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One delivery on the loader's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent<P> {
  /// Stale content must be dropped (a new request started, or the bound
  /// data went away).
  Reset,
  /// A render finished while its request was still current.
  Rendered(RenderResult<P>),
}

/// Worker configuration for a [`RenderLoader`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
  /// Worker threads for render pipelines. Two lets a placeholder chain and
  /// a superseding request proceed concurrently.
  pub threads: usize,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self { threads: 2 }
  }
}

type PayloadOf<R> = <<R as Renderer>::Output as RenderOutcome>::Payload;

/// Feeds descriptors into a renderer pipeline with latest-wins delivery.
///
/// Constructed together with the [`Receiver`] its events arrive on. An
/// optional placeholder renderer (same payload type, typically local and
/// fast) supplies interim content until the main render lands.
pub struct RenderLoader<R, Pl = EmptyRenderer<<R as Renderer>::Descriptor, <R as Renderer>::Output>>
where
  R: Renderer,
  R::Output: RenderOutcome,
{
  renderer: Arc<R>,
  placeholder: Option<Arc<Pl>>,
  pool: rayon::ThreadPool,
  generation: Arc<AtomicU64>,
  last_requested: Mutex<Option<R::Descriptor>>,
  events: Sender<RenderEvent<PayloadOf<R>>>,
}

impl<R> RenderLoader<R>
where
  R: Renderer + 'static,
  R::Output: RenderOutcome + 'static,
  R::Error: std::fmt::Debug,
  PayloadOf<R>: 'static,
{
  /// A loader without a placeholder renderer: every new request resets
  /// before the result arrives.
  pub fn new(renderer: R) -> (Self, Receiver<RenderEvent<PayloadOf<R>>>) {
    Self::build(renderer, None, LoaderConfig::default())
  }
}

impl<R, Pl> RenderLoader<R, Pl>
where
  R: Renderer + 'static,
  R::Output: RenderOutcome,
  R::Error: std::fmt::Debug,
  Pl: Renderer<Descriptor = R::Descriptor> + 'static,
  Pl::Output: RenderOutcome<Payload = PayloadOf<R>>,
  Pl::Error: std::fmt::Debug,
  PayloadOf<R>: 'static,
{
  /// A loader whose `placeholder` result is shown until the main render
  /// replaces it.
  pub fn with_placeholder(
    renderer: R,
    placeholder: Pl,
    config: LoaderConfig,
  ) -> (Self, Receiver<RenderEvent<PayloadOf<R>>>) {
    Self::build(renderer, Some(placeholder), config)
  }

  fn build(
    renderer: R,
    placeholder: Option<Pl>,
    config: LoaderConfig,
  ) -> (Self, Receiver<RenderEvent<PayloadOf<R>>>) {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(config.threads.max(1))
      .build()
      .expect("failed to build render worker pool");
    let (events, receiver) = unbounded();

    let loader = Self {
      renderer: Arc::new(renderer),
      placeholder: placeholder.map(Arc::new),
      pool,
      generation: Arc::new(AtomicU64::new(0)),
      last_requested: Mutex::new(None),
      events,
    };
    (loader, receiver)
  }

  /// Requests a render for `descriptor`, superseding any request still in
  /// flight. `None` clears the binding: consumers get a reset and nothing
  /// further until the next request.
  ///
  /// Consecutive identical descriptors are ignored. Descriptors must carry
  /// a usable size; callers binding view geometry are expected to hold
  /// requests until the view has one.
  pub fn request(&self, descriptor: Option<R::Descriptor>) {
    {
      let mut last = self.last_requested.lock().unwrap();
      if *last == descriptor {
        return;
      }
      *last = descriptor.clone();
    }

    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

    let descriptor = match descriptor {
      Some(descriptor) => descriptor,
      None => {
        let _ = self.events.send(RenderEvent::Reset);
        return;
      }
    };
    assert!(
      descriptor.size().is_usable(),
      "render requested with degenerate size {:?}",
      descriptor.size()
    );

    // Without a placeholder there is nothing to bridge the gap, so stale
    // content resets immediately.
    if self.placeholder.is_none() {
      let _ = self.events.send(RenderEvent::Reset);
    }

    let renderer = Arc::clone(&self.renderer);
    let placeholder = self.placeholder.clone();
    let counter = Arc::clone(&self.generation);
    let events = self.events.clone();

    self.pool.spawn(move || {
      let current = || counter.load(Ordering::SeqCst) == generation;

      if let Some(placeholder) = placeholder {
        if current() {
          match placeholder.render(&descriptor) {
            Ok(outcome) if current() => {
              let _ = events.send(RenderEvent::Rendered(outcome.into_result()));
            }
            Ok(_) => log::trace!("placeholder superseded, discarding"),
            Err(error) => log::debug!("placeholder produced no value: {:?}", error),
          }
        }
      }

      if !current() {
        log::trace!("render superseded before start, discarding");
        return;
      }
      match renderer.render(&descriptor) {
        Ok(outcome) if current() => {
          let _ = events.send(RenderEvent::Rendered(outcome.into_result()));
        }
        Ok(_) => log::trace!("render superseded, discarding result"),
        Err(error) => log::debug!("render produced no value: {:?}", error),
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::descriptor::RenderSize;
  use crate::error::NoValue;
  use crate::renderer::AnyRenderer;
  use std::thread;
  use std::time::Duration;

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

  type SharedValue = Arc<u32>;

  fn instant_renderer() -> AnyRenderer<TestDescriptor, SharedValue, NoValue> {
    AnyRenderer::from_fn(|d: &TestDescriptor| Ok(Arc::new(d.id as u32 * 10)))
  }

  fn recv(receiver: &Receiver<RenderEvent<SharedValue>>) -> RenderEvent<SharedValue> {
    receiver
      .recv_timeout(Duration::from_secs(2))
      .expect("expected an event")
  }

  #[test]
  fn reset_precedes_the_result() {
    let (loader, events) = RenderLoader::new(instant_renderer());
    loader.request(Some(descriptor(1)));

    assert_eq!(recv(&events), RenderEvent::Reset);
    match recv(&events) {
      RenderEvent::Rendered(result) => {
        assert_eq!(*result.output, 10);
        assert!(!result.cache_hit);
      }
      other => panic!("expected a result, got {:?}", other),
    }
  }

  #[test]
  fn clearing_the_binding_resets_only() {
    let (loader, events) = RenderLoader::new(instant_renderer());
    loader.request(Some(descriptor(1)));
    while !matches!(recv(&events), RenderEvent::Rendered(_)) {}

    loader.request(None);
    assert_eq!(recv(&events), RenderEvent::Reset);
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
  }

  #[test]
  fn duplicate_requests_are_ignored() {
    let (loader, events) = RenderLoader::new(instant_renderer());
    loader.request(Some(descriptor(1)));
    while !matches!(recv(&events), RenderEvent::Rendered(_)) {}

    loader.request(Some(descriptor(1)));
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
  }

  #[test]
  fn a_newer_request_discards_the_older_result() {
    let renderer = AnyRenderer::<TestDescriptor, SharedValue, NoValue>::from_fn(
      |d: &TestDescriptor| {
        if d.id == 1 {
          thread::sleep(Duration::from_millis(300));
        }
        Ok(Arc::new(d.id as u32 * 10))
      },
    );
    let (loader, events) = RenderLoader::new(renderer);

    loader.request(Some(descriptor(1)));
    thread::sleep(Duration::from_millis(50));
    loader.request(Some(descriptor(2)));

    let mut rendered = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_millis(800);
    while std::time::Instant::now() < deadline {
      match events.recv_timeout(Duration::from_millis(100)) {
        Ok(RenderEvent::Rendered(result)) => rendered.push(*result.output),
        Ok(RenderEvent::Reset) => {}
        Err(_) => {}
      }
    }

    // Only the latest request's output is delivered.
    assert_eq!(rendered, vec![20]);
  }

  #[test]
  fn placeholder_result_arrives_before_the_final_one() {
    let placeholder =
      AnyRenderer::<TestDescriptor, SharedValue, NoValue>::from_fn(|_| Ok(Arc::new(0)));
    let renderer = AnyRenderer::<TestDescriptor, SharedValue, NoValue>::from_fn(
      |d: &TestDescriptor| {
        thread::sleep(Duration::from_millis(100));
        Ok(Arc::new(d.id as u32 * 10))
      },
    );

    let (loader, events) =
      RenderLoader::with_placeholder(renderer, placeholder, LoaderConfig::default());
    loader.request(Some(descriptor(3)));

    match recv(&events) {
      RenderEvent::Rendered(result) => assert_eq!(*result.output, 0),
      other => panic!("expected placeholder result, got {:?}", other),
    }
    match recv(&events) {
      RenderEvent::Rendered(result) => assert_eq!(*result.output, 30),
      other => panic!("expected final result, got {:?}", other),
    }
  }

  #[test]
  fn renderer_errors_produce_no_event() {
    let renderer = AnyRenderer::<TestDescriptor, SharedValue, NoValue>::from_fn(|_| Err(NoValue));
    let (loader, events) = RenderLoader::new(renderer);
    loader.request(Some(descriptor(1)));

    assert_eq!(recv(&events), RenderEvent::Reset);
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
  }

  #[test]
  #[should_panic(expected = "degenerate size")]
  fn degenerate_sizes_are_a_caller_bug() {
    let (loader, _events) = RenderLoader::new(instant_renderer());
    loader.request(Some(TestDescriptor {
      id: 1,
      size: RenderSize::new(0.0, 5.0),
    }));
  }
}
