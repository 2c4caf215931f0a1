//! Key-value caches for rendered values
//!
//! Renderer decorators treat a cache as a plain key-value interface:
//! `lookup` may miss, and `store` with `None` removes the entry. Two
//! implementations are provided: an in-process [`MemoryCache`] and a
//! durable [`DiskCache`] rooted at a configurable directory.
//!
//! Disk cache values are stored as their raw encoded bytes (PNG for
//! bitmaps, UTF-8 for strings), one file per key, optionally grouped into
//! subdirectories derived from the key.

use crate::descriptor::Bitmap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key-value cache interface consumed by renderer decorators.
///
/// Storing `None` removes the entry.
pub trait Cache: Send + Sync {
  type Key;
  type Value;

  /// Retrieves the value for this key.
  fn lookup(&self, key: &Self::Key) -> Option<Self::Value>;

  /// Sets a value for a key. If `value` is `None`, the entry is removed.
  fn store(&self, key: &Self::Key, value: Option<Self::Value>);
}

// Allow Arc<C> to be used wherever a Cache is expected
impl<C: Cache + ?Sized> Cache for Arc<C> {
  type Key = C::Key;
  type Value = C::Value;

  fn lookup(&self, key: &Self::Key) -> Option<Self::Value> {
    (**self).lookup(key)
  }

  fn store(&self, key: &Self::Key, value: Option<Self::Value>) {
    (**self).store(key, value)
  }
}

/// Process-lifetime in-memory cache.
///
/// A plain guarded map: entries live until removed, [`clear`]ed, or the
/// process exits. Platform glue that receives memory-pressure events can
/// call [`clear`] to purge it wholesale.
///
/// [`clear`]: MemoryCache::clear
pub struct MemoryCache<K, V> {
  entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + std::hash::Hash, V: Clone> MemoryCache<K, V> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Removes every entry.
  pub fn clear(&self) {
    self.entries.lock().unwrap().clear();
  }

  /// Number of live entries.
  pub fn len(&self) -> usize {
    self.entries.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<K: Eq + std::hash::Hash, V: Clone> Default for MemoryCache<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> Cache for MemoryCache<K, V>
where
  K: Eq + std::hash::Hash + Clone + Send + Sync,
  V: Clone + Send + Sync,
{
  type Key = K;
  type Value = V;

  fn lookup(&self, key: &K) -> Option<V> {
    self.entries.lock().unwrap().get(key).cloned()
  }

  fn store(&self, key: &K, value: Option<V>) {
    let mut entries = self.entries.lock().unwrap();
    match value {
      Some(value) => {
        entries.insert(key.clone(), value);
      }
      None => {
        entries.remove(key);
      }
    }
  }
}

/// The filesystem identity of a cacheable key.
pub trait DataFile {
  /// Optional grouping subdirectory for this key, e.g. the formatted
  /// target size (see [`RenderSize::subdirectory_name`]).
  ///
  /// [`RenderSize::subdirectory_name`]: crate::descriptor::RenderSize::subdirectory_name
  fn subdirectory(&self) -> Option<String>;

  /// A unique, filesystem-safe name for this key.
  fn unique_filename(&self) -> String;
}

/// A value that can be persisted as raw bytes.
pub trait StoredData: Sized {
  /// Decodes an instance from raw bytes, if possible.
  fn from_bytes(bytes: &[u8]) -> Option<Self>;

  /// Encodes the receiver as raw bytes. Returns `None` if encoding failed.
  fn to_bytes(&self) -> Option<Vec<u8>>;
}

impl StoredData for String {
  fn from_bytes(bytes: &[u8]) -> Option<Self> {
    String::from_utf8(bytes.to_vec()).ok()
  }

  fn to_bytes(&self) -> Option<Vec<u8>> {
    Some(self.as_bytes().to_vec())
  }
}

impl StoredData for Vec<u8> {
  fn from_bytes(bytes: &[u8]) -> Option<Self> {
    Some(bytes.to_vec())
  }

  fn to_bytes(&self) -> Option<Vec<u8>> {
    Some(self.clone())
  }
}

// Bitmaps persist as PNG bytes.
impl StoredData for Bitmap {
  fn from_bytes(bytes: &[u8]) -> Option<Self> {
    image::load_from_memory(bytes)
      .ok()
      .map(|img| Arc::new(img.to_rgba8()))
  }

  fn to_bytes(&self) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8((**self).clone())
      .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
      .ok()?;
    Some(bytes)
  }
}

/// Durable cache backed by files on disk.
///
/// Layout: `root → subdirectory? → unique filename`, file contents are the
/// value's encoded bytes. Filesystem access is serialized per cache
/// instance, and writes go through a temporary file renamed into place so
/// readers never observe a partially written value.
pub struct DiskCache<K, V> {
  root: PathBuf,
  lock: Mutex<()>,
  _marker: std::marker::PhantomData<fn(K) -> V>,
}

impl<K: DataFile, V: StoredData> DiskCache<K, V> {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      lock: Mutex::new(()),
      _marker: std::marker::PhantomData,
    }
  }

  /// A cache rooted at `<OS cache dir>/imagecast/<name>`.
  pub fn in_cache_subdirectory(name: &str) -> Self {
    Self::new(default_cache_directory().join(name))
  }

  /// The directory this cache stores files under.
  pub fn root(&self) -> &Path {
    &self.root
  }

  fn file_path(&self, key: &K) -> PathBuf {
    let mut path = self.root.clone();
    if let Some(subdirectory) = key.subdirectory() {
      path.push(subdirectory);
    }
    path.push(key.unique_filename());
    path
  }

  fn write_atomically(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(&self.root);
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::Write::write_all(&mut tmp, bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
  }
}

impl<K, V> Cache for DiskCache<K, V>
where
  K: DataFile + Send + Sync,
  V: StoredData + Send + Sync,
{
  type Key = K;
  type Value = V;

  fn lookup(&self, key: &K) -> Option<V> {
    let _guard = self.lock.lock().unwrap();
    let bytes = fs::read(self.file_path(key)).ok()?;
    V::from_bytes(&bytes)
  }

  fn store(&self, key: &K, value: Option<V>) {
    let path = self.file_path(key);
    let _guard = self.lock.lock().unwrap();

    match value.as_ref().and_then(StoredData::to_bytes) {
      Some(bytes) => {
        if let Err(e) = self.write_atomically(&path, &bytes) {
          log::warn!("disk cache store failed for {}: {}", path.display(), e);
        }
      }
      None => {
        if path.exists() {
          if let Err(e) = fs::remove_file(&path) {
            log::warn!("disk cache removal failed for {}: {}", path.display(), e);
          }
        }
      }
    }
  }
}

/// Returns the directory where [`DiskCache::in_cache_subdirectory`] caches
/// are rooted.
pub fn default_cache_directory() -> PathBuf {
  directories::BaseDirs::new()
    .map(|dirs| dirs.cache_dir().join("imagecast"))
    .unwrap_or_else(|| std::env::temp_dir().join("imagecast"))
}

/// Derives a unique, filesystem-safe filename from a URL.
///
/// The sanitized URL stem keeps cache directories inspectable; the hash
/// suffix keeps distinct URLs from colliding after sanitization.
pub fn filename_for_url(url: &str) -> String {
  let mut stem: String = url
    .trim_start_matches("https://")
    .trim_start_matches("http://")
    .chars()
    .map(|c| {
      if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' {
        c
      } else {
        '_'
      }
    })
    .collect();
  stem.truncate(80);
  while stem.ends_with('_') {
    stem.pop();
  }

  let digest = Sha256::digest(url.as_bytes());
  let mut suffix = String::with_capacity(16);
  for byte in digest.iter().take(8) {
    suffix.push_str(&format!("{:02x}", byte));
  }

  format!("{}-{}", stem, suffix)
}
