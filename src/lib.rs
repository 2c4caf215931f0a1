//! Asynchronous, cache-aware image rendering for GUI views.
//!
//! The core is a pipeline that turns a render descriptor (size + source
//! description) into a bitmap through chainable decorator stages: remote
//! fetch, decode, inflate, process, cache, fallback and multicast. The
//! multicast layer guarantees at most one in-flight render per descriptor
//! and replays the result to every requester; the [`loader::RenderLoader`]
//! feeds descriptors in with latest-wins cancellation.

pub mod cache;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod renderer;

pub use cache::{Cache, DataFile, DiskCache, MemoryCache, StoredData};
pub use descriptor::{Bitmap, ImageResult, RenderDescriptor, RenderOutcome, RenderResult, RenderSize};
pub use error::{Error, NoValue, RemoteError, Result};
pub use loader::{LoaderConfig, RenderEvent, RenderLoader};
pub use renderer::{
  AnyRenderer, ContentMode, EmptyRenderer, MemoryPressure, MulticastRenderer, Renderer,
  RendererExt,
};
