//! Resource fetching abstraction
//!
//! This module provides a trait-based abstraction for fetching raw image
//! bytes from various sources. The remote renderer stays agnostic about how
//! bytes are retrieved, enabling:
//!
//! - Mocking for tests
//! - Offline modes
//! - Rate limiting or custom transports
//!
//! Response statuses are surfaced as data rather than as errors: the remote
//! renderer owns the status taxonomy (404 vs other failure statuses), the
//! fetcher only reports what the server said.
//!
//! # Example
//!
//! ```rust,ignore
//! use imagecast::fetch::{HttpFetcher, ResourceFetcher};
//!
//! let fetcher = HttpFetcher::new();
//! let resource = fetcher.fetch("https://example.com/image.png")?;
//! println!("status {} ({} bytes)", resource.status, resource.bytes.len());
//! ```

use crate::error::RemoteError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default User-Agent string used by HTTP fetchers
pub const DEFAULT_USER_AGENT: &str = "imagecast/0.1";

/// Result of fetching an image resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
  /// Raw bytes of the resource
  pub bytes: Vec<u8>,
  /// Content-Type header value, if available (e.g., "image/png")
  pub content_type: Option<String>,
  /// HTTP status code; `200` for file and data URLs
  pub status: u16,
}

impl FetchedResource {
  pub fn new(bytes: Vec<u8>, content_type: Option<String>, status: u16) -> Self {
    Self {
      bytes,
      content_type,
      status,
    }
  }

  /// Whether the status code is in the success range [200, 300).
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Check if this resource appears to be an image based on content-type
  pub fn is_image(&self) -> bool {
    self
      .content_type
      .as_ref()
      .map(|ct| ct.starts_with("image/"))
      .unwrap_or(false)
  }
}

/// Trait for fetching image bytes
///
/// URLs can be:
/// - `http://` or `https://` - fetch over network
/// - `file://` (or a bare path) - read from filesystem
/// - `data:` - decode data URL inline
///
/// Implementations must be `Send + Sync` to allow sharing across render
/// workers.
pub trait ResourceFetcher: Send + Sync {
  /// Fetch a resource from the given URL.
  ///
  /// Returns `Ok` whenever a response was obtained, including non-2xx
  /// statuses; errors are reserved for transport-level failures.
  fn fetch(&self, url: &str) -> Result<FetchedResource, RemoteError>;
}

// Allow Arc<dyn ResourceFetcher> to be used as ResourceFetcher
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
  fn fetch(&self, url: &str) -> Result<FetchedResource, RemoteError> {
    (**self).fetch(url)
  }
}

/// Default HTTP resource fetcher
///
/// Fetches resources over HTTP/HTTPS with configurable timeout, user agent
/// and response size cap. Also handles `file://` URLs and `data:` URLs.
///
/// # Example
///
/// ```rust,ignore
/// use imagecast::fetch::HttpFetcher;
/// use std::time::Duration;
///
/// let fetcher = HttpFetcher::new()
///     .with_timeout(Duration::from_secs(60))
///     .with_user_agent("MyApp/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  timeout: Duration,
  user_agent: String,
  max_size: usize,
}

impl HttpFetcher {
  /// Create a new HttpFetcher with default settings
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the request timeout
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Set the User-Agent header
  pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
    self.user_agent = user_agent.into();
    self
  }

  /// Set the maximum response size in bytes
  pub fn with_max_size(mut self, max_size: usize) -> Self {
    self.max_size = max_size;
    self
  }

  /// Fetch from an HTTP/HTTPS URL
  fn fetch_http(&self, url: &str) -> Result<FetchedResource, RemoteError> {
    let config = ureq::Agent::config_builder()
      .timeout_global(Some(self.timeout))
      .http_status_as_error(false)
      .max_redirects(0)
      .build();
    let agent: ureq::Agent = config.into();

    let transport = |reason: String| RemoteError::Transport {
      url: url.to_string(),
      reason,
    };

    let mut current = url.to_string();
    for _ in 0..10 {
      let mut response = agent
        .get(&current)
        .header("User-Agent", &self.user_agent)
        .call()
        .map_err(|e| transport(e.to_string()))?;

      let status = response.status().as_u16();
      if (300..400).contains(&status) {
        if let Some(loc) = response
          .headers()
          .get("location")
          .and_then(|h| h.to_str().ok())
        {
          current = Url::parse(&current)
            .ok()
            .and_then(|base| base.join(loc).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| loc.to_string());
          continue;
        }
      }

      let content_type = response
        .headers()
        .get("content-type")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
      log::trace!("GET {} -> {}", current, status);

      let bytes = response
        .body_mut()
        .with_config()
        .limit(self.max_size as u64)
        .read_to_vec()
        .map_err(|e| transport(e.to_string()))?;

      return Ok(FetchedResource::new(bytes, content_type, status));
    }

    Err(transport("too many redirects".to_string()))
  }

  /// Fetch from a file:// URL or bare path
  fn fetch_file(&self, url: &str) -> Result<FetchedResource, RemoteError> {
    let path = url.strip_prefix("file://").unwrap_or(url);
    let bytes = std::fs::read(path).map_err(|e| RemoteError::Transport {
      url: url.to_string(),
      reason: e.to_string(),
    })?;

    let content_type = guess_content_type_from_path(path);
    Ok(FetchedResource::new(bytes, content_type, 200))
  }
}

impl Default for HttpFetcher {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      user_agent: DEFAULT_USER_AGENT.to_string(),
      max_size: 50 * 1024 * 1024, // 50MB default limit
    }
  }
}

impl ResourceFetcher for HttpFetcher {
  fn fetch(&self, url: &str) -> Result<FetchedResource, RemoteError> {
    if url.starts_with("data:") {
      decode_data_url(url)
    } else if url.starts_with("http://") || url.starts_with("https://") {
      self.fetch_http(url)
    } else {
      self.fetch_file(url)
    }
  }
}

/// Guess content-type from file path extension
fn guess_content_type_from_path(path: &str) -> Option<String> {
  let ext = Path::new(path)
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_lowercase())?;

  let mime = match ext.as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "ico" => "image/x-icon",
    "bmp" => "image/bmp",
    "tif" | "tiff" => "image/tiff",
    _ => return None,
  };

  Some(mime.to_string())
}

/// Decode a data: URL into bytes
pub(crate) fn decode_data_url(url: &str) -> Result<FetchedResource, RemoteError> {
  let rest = url
    .strip_prefix("data:")
    .ok_or_else(|| RemoteError::InvalidDataUrl {
      reason: "URL does not start with 'data:'".to_string(),
    })?;

  let comma_pos = rest.find(',').ok_or_else(|| RemoteError::InvalidDataUrl {
    reason: "Missing comma in data URL".to_string(),
  })?;

  let header = &rest[..comma_pos];
  let data = &rest[comma_pos + 1..];

  // Parse header: [mediatype][;base64]
  let is_base64 = header.ends_with(";base64") || header.contains(";base64;");
  let media_type = header
    .split(';')
    .next()
    .filter(|s| !s.is_empty() && s.contains('/'))
    .map(|s| s.to_string());

  let bytes = if is_base64 {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
      .decode(data)
      .map_err(|e| RemoteError::InvalidDataUrl {
        reason: format!("Invalid base64: {}", e),
      })?
  } else {
    percent_decode(data)?
  };

  Ok(FetchedResource::new(bytes, media_type, 200))
}

/// Percent-decode a string to bytes
fn percent_decode(input: &str) -> Result<Vec<u8>, RemoteError> {
  let mut out = Vec::with_capacity(input.len());
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    if bytes[i] == b'%' {
      if i + 2 >= bytes.len() {
        return Err(RemoteError::InvalidDataUrl {
          reason: "Incomplete percent-escape".to_string(),
        });
      }
      let hi = (bytes[i + 1] as char).to_digit(16);
      let lo = (bytes[i + 2] as char).to_digit(16);
      match (hi, lo) {
        (Some(hi), Some(lo)) => {
          out.push(((hi << 4) | lo) as u8);
          i += 3;
        }
        _ => {
          return Err(RemoteError::InvalidDataUrl {
            reason: "Invalid percent-escape".to_string(),
          })
        }
      }
    } else if bytes[i] == b'+' {
      out.push(b' ');
      i += 1;
    } else {
      out.push(bytes[i]);
      i += 1;
    }
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::{Read, Write};
  use std::net::TcpListener;
  use std::thread;

  #[test]
  fn test_fetched_resource_is_image() {
    let resource = FetchedResource::new(vec![], Some("image/png".to_string()), 200);
    assert!(resource.is_image());

    let resource = FetchedResource::new(vec![], Some("text/html".to_string()), 200);
    assert!(!resource.is_image());
  }

  #[test]
  fn test_fetched_resource_success_range() {
    assert!(FetchedResource::new(vec![], None, 200).is_success());
    assert!(FetchedResource::new(vec![], None, 299).is_success());
    assert!(!FetchedResource::new(vec![], None, 304).is_success());
    assert!(!FetchedResource::new(vec![], None, 404).is_success());
  }

  #[test]
  fn test_guess_content_type() {
    assert_eq!(
      guess_content_type_from_path("/path/to/image.png"),
      Some("image/png".to_string())
    );
    assert_eq!(
      guess_content_type_from_path("/path/to/photo.JPG"),
      Some("image/jpeg".to_string())
    );
    assert_eq!(guess_content_type_from_path("/path/to/file"), None);
  }

  #[test]
  fn test_decode_data_url_base64() {
    let url = "data:image/png;base64,aGVsbG8="; // "hello" in base64
    let resource = decode_data_url(url).unwrap();
    assert_eq!(resource.bytes, b"hello");
    assert_eq!(resource.content_type, Some("image/png".to_string()));
  }

  #[test]
  fn test_decode_data_url_percent() {
    let url = "data:text/plain,hello%20world";
    let resource = decode_data_url(url).unwrap();
    assert_eq!(resource.bytes, b"hello world");
    assert_eq!(resource.content_type, Some("text/plain".to_string()));
  }

  #[test]
  fn test_decode_data_url_no_mediatype() {
    let url = "data:,hello";
    let resource = decode_data_url(url).unwrap();
    assert_eq!(resource.bytes, b"hello");
    assert_eq!(resource.content_type, None);
  }

  #[test]
  fn test_decode_data_url_rejects_missing_comma() {
    assert!(matches!(
      decode_data_url("data:image/png;base64"),
      Err(RemoteError::InvalidDataUrl { .. })
    ));
  }

  #[test]
  fn test_http_fetcher_defaults() {
    let fetcher = HttpFetcher::new();
    assert_eq!(fetcher.timeout, Duration::from_secs(30));
    assert!(fetcher.user_agent.contains("imagecast"));
  }

  #[test]
  fn test_http_fetcher_builder() {
    let fetcher = HttpFetcher::new()
      .with_timeout(Duration::from_secs(60))
      .with_user_agent("Test/1.0")
      .with_max_size(1024);

    assert_eq!(fetcher.timeout, Duration::from_secs(60));
    assert_eq!(fetcher.user_agent, "Test/1.0");
    assert_eq!(fetcher.max_size, 1024);
  }

  #[test]
  fn test_fetch_data_url() {
    let fetcher = HttpFetcher::new();
    let resource = fetcher.fetch("data:text/plain,test").unwrap();
    assert_eq!(resource.bytes, b"test");
  }

  #[test]
  fn test_fetch_file_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pixel.png");
    std::fs::write(&path, b"not-really-png").unwrap();

    let fetcher = HttpFetcher::new();
    let url = format!("file://{}", path.display());
    let resource = fetcher.fetch(&url).unwrap();
    assert_eq!(resource.bytes, b"not-really-png");
    assert_eq!(resource.content_type, Some("image/png".to_string()));
    assert_eq!(resource.status, 200);
  }

  #[test]
  fn test_fetch_missing_file_is_transport_error() {
    let fetcher = HttpFetcher::new();
    let res = fetcher.fetch("/definitely/not/a/real/path.png");
    assert!(matches!(res, Err(RemoteError::Transport { .. })));
  }

  fn one_shot_server(status_line: &'static str, content_type: &'static str, body: &'static [u8]) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
      if let Some(stream) = listener.incoming().next() {
        let mut stream = stream.unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);
        let headers = format!(
          "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
          status_line,
          content_type,
          body.len()
        );
        let _ = stream.write_all(headers.as_bytes());
        let _ = stream.write_all(body);
      }
    });
    (format!("http://{}/", addr), handle)
  }

  #[test]
  fn http_fetcher_reports_success_status_and_body() {
    let (url, handle) = one_shot_server("200 OK", "image/png", b"pngbytes");

    let fetcher = HttpFetcher::new().with_timeout(Duration::from_secs(5));
    let res = fetcher.fetch(&url).expect("fetch");
    handle.join().unwrap();

    assert_eq!(res.bytes, b"pngbytes");
    assert_eq!(res.status, 200);
    assert_eq!(res.content_type, Some("image/png".to_string()));
  }

  #[test]
  fn http_fetcher_surfaces_not_found_as_data() {
    let (url, handle) = one_shot_server("404 Not Found", "text/plain", b"gone");

    let fetcher = HttpFetcher::new().with_timeout(Duration::from_secs(5));
    let res = fetcher.fetch(&url).expect("404 is a response, not an error");
    handle.join().unwrap();

    assert_eq!(res.status, 404);
    assert!(!res.is_success());
  }

  #[test]
  fn http_fetcher_follows_redirects() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind redirect server");
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
      let mut conn_count = 0;
      for stream in listener.incoming() {
        let mut stream = stream.unwrap();
        conn_count += 1;
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);

        if conn_count == 1 {
          let resp = format!(
            "HTTP/1.1 302 Found\r\nLocation: http://{}\r\nContent-Length: 0\r\n\r\n",
            addr
          );
          let _ = stream.write_all(resp.as_bytes());
        } else {
          let body = b"ok";
          let headers = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/gif\r\nContent-Length: {}\r\n\r\n",
            body.len()
          );
          let _ = stream.write_all(headers.as_bytes());
          let _ = stream.write_all(body);
          break;
        }
      }
    });

    let fetcher = HttpFetcher::new().with_timeout(Duration::from_secs(5));
    let res = fetcher.fetch(&url_for(addr)).expect("fetch redirect");
    handle.join().unwrap();

    assert_eq!(res.bytes, b"ok");
    assert_eq!(res.status, 200);
  }

  fn url_for(addr: std::net::SocketAddr) -> String {
    format!("http://{}/", addr)
  }
}
