//! Core types for the offline asset cache.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use url::Url;

/// An outgoing request seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
  pub method: String,
  pub url: Url,
}

impl AssetRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
    }
  }

  pub fn is_get(&self) -> bool {
    self.method.eq_ignore_ascii_case("GET")
  }

  /// Cache key: the request URL without its fragment.
  pub fn cache_key(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.to_string()
  }
}

/// How a response relates to the worker's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
  /// Same-origin response
  Basic,
  /// Cross-origin response
  Cors,
  /// Produced locally, never fetched
  Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub response_type: ResponseType,
}

impl AssetResponse {
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Local response used when an allow-listed asset cannot be fetched.
  pub fn network_unavailable() -> Self {
    Self {
      status: 503,
      headers: vec![("content-type".to_string(), "text/plain; charset=utf-8".to_string())],
      body: NETWORK_ERROR_BODY.as_bytes().to_vec(),
      response_type: ResponseType::Default,
    }
  }
}

pub const NETWORK_ERROR_BODY: &str = "Network error. Check your connection!";

/// A response read back from a cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: AssetResponse,
  pub cached_at: DateTime<Utc>,
}

/// Where the worker got a response from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  Cache,
  Network,
  /// Synthesized after a network failure
  Fallback,
}

/// What the worker does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercept {
  /// Not handled; the request proceeds as if no worker existed
  Passthrough,
  Respond {
    response: AssetResponse,
    source: ResponseSource,
  },
}

/// Network access used by the worker.
pub trait Network: Send + Sync {
  fn fetch(&self, request: &AssetRequest) -> impl Future<Output = Result<AssetResponse>> + Send;
}
