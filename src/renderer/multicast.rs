//! Multicast / single-flight decorator
//!
//! Guarantees at most one concurrent underlying render per descriptor and
//! replays the produced value to every requester: the callers that were
//! waiting while it was in flight and every caller that arrives until the
//! entry is evicted.
//!
//! The descriptor table is the one piece of shared mutable state in a
//! pipeline: lookup-or-insert is a single atomic operation under the table
//! lock, so two callers can never both start work for the same key.

use super::Renderer;
use crate::descriptor::{RenderOutcome, RenderResult};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, Weak};

type Payload<R> = <<R as Renderer>::Output as RenderOutcome>::Payload;

enum CellState<P, E> {
  Pending,
  Ready(P),
  Failed(E),
}

/// A single-value replay cell: resolves once, then hands the same value to
/// every current and future subscriber.
struct ReplayCell<P, E> {
  state: Mutex<CellState<P, E>>,
  cv: Condvar,
}

impl<P: Clone, E: Clone> ReplayCell<P, E> {
  fn new() -> Self {
    Self {
      state: Mutex::new(CellState::Pending),
      cv: Condvar::new(),
    }
  }

  fn resolve(&self, result: Result<P, E>) {
    let mut state = self.state.lock().unwrap();
    *state = match result {
      Ok(payload) => CellState::Ready(payload),
      Err(error) => CellState::Failed(error),
    };
    self.cv.notify_all();
  }

  /// Blocks until the cell resolves, then returns the replayed value.
  fn wait(&self) -> Result<P, E> {
    let mut state = self.state.lock().unwrap();
    loop {
      match &*state {
        CellState::Pending => state = self.cv.wait(state).unwrap(),
        CellState::Ready(payload) => return Ok(payload.clone()),
        CellState::Failed(error) => return Err(error.clone()),
      }
    }
  }
}

type CellTable<D, P, E> = Mutex<HashMap<D, Arc<ReplayCell<P, E>>>>;

/// Decorator which guarantees that values for a given descriptor are only
/// rendered once, and multicast to every requester.
///
/// The first consumed value per descriptor reports `cache_hit: false`;
/// every replay reports `true`, regardless of what the inner renderer's own
/// flag said. This layer's flag is about *its* replay, not the underlying
/// source.
///
/// A render that errors populates nothing: the error is replayed to the
/// callers already waiting on it and the next request retries from scratch.
/// Wrap the inner renderer with the error-eliminating decorators first if
/// retrying is not meaningful.
pub struct MulticastRenderer<R: Renderer>
where
  R::Output: RenderOutcome,
  R::Error: Clone,
{
  renderer: R,
  cells: Arc<CellTable<R::Descriptor, Payload<R>, R::Error>>,
}

impl<R> MulticastRenderer<R>
where
  R: Renderer,
  R::Output: RenderOutcome,
  R::Error: Clone,
{
  pub fn new(renderer: R) -> Self {
    Self {
      renderer,
      cells: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Clears the whole table when `pressure` fires.
  ///
  /// Eviction is deliberately coarse: every descriptor re-renders on its
  /// next request. On platforms without a pressure signal the table is
  /// simply never evicted.
  pub fn with_memory_pressure(self, pressure: &MemoryPressure) -> Self
  where
    Payload<R>: 'static,
    R::Error: 'static,
  {
    let cells = Arc::downgrade(&self.cells);
    pressure.subscribe(move || {
      if let Some(cells) = Weak::upgrade(&cells) {
        cells.lock().unwrap().clear();
      }
    });
    self
  }

  /// Forgets every rendered value, forcing re-renders on the next request.
  pub fn evict_all(&self) {
    self.cells.lock().unwrap().clear();
  }

  /// Removes `cell` from the table unless a newer flight replaced it.
  fn remove_cell(&self, descriptor: &R::Descriptor, cell: &Arc<ReplayCell<Payload<R>, R::Error>>) {
    let mut cells = self.cells.lock().unwrap();
    if let Some(current) = cells.get(descriptor) {
      if Arc::ptr_eq(current, cell) {
        cells.remove(descriptor);
      }
    }
  }
}

impl<R> Renderer for MulticastRenderer<R>
where
  R: Renderer,
  R::Output: RenderOutcome,
  R::Error: Clone + Send,
{
  type Descriptor = R::Descriptor;
  type Output = RenderResult<Payload<R>>;
  type Error = R::Error;

  fn render(&self, descriptor: &R::Descriptor) -> Result<Self::Output, R::Error> {
    let (cell, is_owner) = {
      let mut cells = self.cells.lock().unwrap();
      match cells.entry(descriptor.clone()) {
        Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
        Entry::Vacant(entry) => {
          let cell = Arc::new(ReplayCell::new());
          entry.insert(Arc::clone(&cell));
          (cell, true)
        }
      }
    };

    if !is_owner {
      // Replay: the last value if resolved, otherwise the in-flight one.
      return cell.wait().map(RenderResult::hit);
    }

    match self.renderer.render(descriptor) {
      Ok(outcome) => {
        let payload = outcome.payload();
        cell.resolve(Ok(payload.clone()));
        Ok(RenderResult::miss(payload))
      }
      Err(error) => {
        cell.resolve(Err(error.clone()));
        self.remove_cell(descriptor, &cell);
        Err(error)
      }
    }
  }
}

type PressureSubscriber = Box<dyn Fn() + Send + Sync>;

/// An injectable memory-pressure event source.
///
/// Platform glue owns one of these and calls [`notify`] when the system
/// reports pressure; every subscribed component purges itself. This is a
/// capability, not a hard dependency: absent a platform signal, nothing
/// ever notifies.
///
/// [`notify`]: MemoryPressure::notify
pub struct MemoryPressure {
  subscribers: Mutex<Vec<PressureSubscriber>>,
}

impl MemoryPressure {
  pub fn new() -> Self {
    Self {
      subscribers: Mutex::new(Vec::new()),
    }
  }

  /// Registers `subscriber` to run on every notification.
  pub fn subscribe<F: Fn() + Send + Sync + 'static>(&self, subscriber: F) {
    self.subscribers.lock().unwrap().push(Box::new(subscriber));
  }

  /// Delivers the pressure event to every subscriber.
  pub fn notify(&self) {
    for subscriber in self.subscribers.lock().unwrap().iter() {
      subscriber();
    }
  }
}

impl Default for MemoryPressure {
  fn default() -> Self {
    Self::new()
  }
}
