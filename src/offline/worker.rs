//! The offline worker: install, activate and request interception.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::clients::{ClientMessage, ClientRegistry};
use super::storage::CacheStorage;
use super::traits::{AssetRequest, AssetResponse, Intercept, Network, ResponseSource, ResponseType};
use crate::config::OfflineConfig;

/// Lifecycle position of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installed,
  Activated,
}

/// Result of [`OfflineWorker::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
  /// Every static file was stored
  Populated(usize),
  /// Nothing was stored; the reason was logged
  Incomplete(String),
}

pub struct OfflineWorker<S: CacheStorage, N: Network> {
  version: String,
  origin: Url,
  static_files: Vec<String>,
  storage: Arc<S>,
  network: N,
  clients: ClientRegistry,
  reload_delay: Duration,
  state: WorkerState,
}

impl<S: CacheStorage, N: Network> OfflineWorker<S, N> {
  pub fn new(
    config: &OfflineConfig,
    storage: Arc<S>,
    network: N,
    clients: ClientRegistry,
  ) -> Result<Self> {
    let origin = Url::parse(&config.origin)
      .map_err(|e| eyre!("Invalid origin '{}': {}", config.origin, e))?;

    Ok(Self {
      version: config.version.clone(),
      origin,
      static_files: config.static_files.clone(),
      storage,
      network,
      clients,
      reload_delay: config.reload_delay(),
      state: WorkerState::Parsed,
    })
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn origin(&self) -> &Url {
    &self.origin
  }

  pub fn clients(&self) -> &ClientRegistry {
    &self.clients
  }

  /// Names of every cache currently held by the storage.
  pub fn cache_names(&self) -> Result<Vec<String>> {
    self.storage.keys()
  }

  /// Populate the versioned cache with the static files.
  ///
  /// Population is all-or-nothing. A failed population is logged and the
  /// worker still becomes installed.
  pub async fn install(&mut self) -> Result<InstallOutcome> {
    self.storage.open(&self.version)?;

    let outcome = match self.fetch_static_files().await {
      Ok(entries) => match self.storage.put_all(&self.version, &entries) {
        Ok(()) => {
          info!(version = %self.version, count = entries.len(), "Cached static files");
          InstallOutcome::Populated(entries.len())
        }
        Err(e) => {
          error!(version = %self.version, "Failed to store static files: {}", e);
          InstallOutcome::Incomplete(e.to_string())
        }
      },
      Err(e) => {
        error!(version = %self.version, "Failed to cache static files: {}", e);
        InstallOutcome::Incomplete(e.to_string())
      }
    };

    self.state = WorkerState::Installed;
    Ok(outcome)
  }

  async fn fetch_static_files(&self) -> Result<Vec<(String, AssetResponse)>> {
    let requests = self
      .static_files
      .iter()
      .map(|path| {
        self
          .origin
          .join(path)
          .map(AssetRequest::get)
          .map_err(|e| eyre!("Invalid static path '{}': {}", path, e))
      })
      .collect::<Result<Vec<_>>>()?;

    try_join_all(requests.iter().map(|request| async move {
      let response = self.network.fetch(request).await?;
      if !response.is_ok() {
        return Err(eyre!(
          "Request for {} returned status {}",
          request.url,
          response.status
        ));
      }
      Ok((request.cache_key(), response))
    }))
    .await
  }

  /// Drop stale caches, take control of clients and schedule the reload notice.
  pub async fn activate(&mut self) -> Result<JoinHandle<usize>> {
    for name in self.storage.keys()? {
      if name != self.version {
        info!(cache = %name, "Deleting old cache");
        self.storage.delete(&name)?;
      }
    }

    let claimed = self.clients.claim();
    debug!(claimed, "Claimed clients");
    self.state = WorkerState::Activated;

    let clients = self.clients.clone();
    let delay = self.reload_delay;
    Ok(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let notified = clients.post_all(&ClientMessage::Reload);
      info!(notified, "Asked clients to reload");
      notified
    }))
  }

  /// Decide how a request is answered.
  pub async fn handle(&self, request: &AssetRequest) -> Result<Intercept> {
    if !request.is_get() {
      return Ok(Intercept::Passthrough);
    }
    if !matches!(request.url.scheme(), "http" | "https") {
      return Ok(Intercept::Passthrough);
    }

    if self.is_static(&request.url) {
      return Ok(self.cache_first(request).await);
    }

    let response = self.network.fetch(request).await?;
    Ok(Intercept::Respond {
      response,
      source: ResponseSource::Network,
    })
  }

  fn is_static(&self, url: &Url) -> bool {
    let path = url.path();
    let relative = path.trim_start_matches('/');
    self
      .static_files
      .iter()
      .any(|file| file == path || file == relative)
  }

  async fn cache_first(&self, request: &AssetRequest) -> Intercept {
    let key = request.cache_key();

    match self.storage.match_request(&self.version, &key) {
      Ok(Some(cached)) => {
        debug!(url = %key, cached_at = %cached.cached_at, "Serving from cache");
        return Intercept::Respond {
          response: cached.response,
          source: ResponseSource::Cache,
        };
      }
      Ok(None) => {}
      Err(e) => warn!(url = %key, "Cache lookup failed: {}", e),
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.status == 200 && response.response_type == ResponseType::Basic {
          if let Err(e) = self.storage.put(&self.version, &key, &response) {
            warn!(url = %key, "Failed to cache response: {}", e);
          }
        }
        Intercept::Respond {
          response,
          source: ResponseSource::Network,
        }
      }
      Err(e) => {
        warn!(url = %key, "Network unavailable: {}", e);
        Intercept::Respond {
          response: AssetResponse::network_unavailable(),
          source: ResponseSource::Fallback,
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::offline::storage::SqliteStorage;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  const ORIGIN: &str = "http://localhost:5173";

  /// Scripted network: known URLs answer, everything else fails.
  #[derive(Default)]
  struct FakeNetwork {
    routes: Mutex<HashMap<String, AssetResponse>>,
    calls: AtomicUsize,
  }

  impl FakeNetwork {
    fn with(self, url: &str, response: AssetResponse) -> Self {
      self.routes.lock().unwrap().insert(url.to_string(), response);
      self
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  impl Network for FakeNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self
        .routes
        .lock()
        .unwrap()
        .get(request.url.as_str())
        .cloned()
        .ok_or_else(|| eyre!("connection refused"))
    }
  }

  fn ok(body: &str) -> AssetResponse {
    AssetResponse {
      status: 200,
      headers: Vec::new(),
      body: body.as_bytes().to_vec(),
      response_type: ResponseType::Basic,
    }
  }

  fn config(static_files: &[&str]) -> OfflineConfig {
    OfflineConfig {
      enabled: true,
      version: "v2".to_string(),
      origin: ORIGIN.to_string(),
      static_files: static_files.iter().map(|s| s.to_string()).collect(),
      reload_delay_ms: 10,
    }
  }

  fn worker(
    static_files: &[&str],
    network: FakeNetwork,
  ) -> OfflineWorker<SqliteStorage, FakeNetwork> {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    OfflineWorker::new(&config(static_files), storage, network, ClientRegistry::new()).unwrap()
  }

  fn get(path: &str) -> AssetRequest {
    AssetRequest::get(Url::parse(&format!("{}{}", ORIGIN, path)).unwrap())
  }

  fn body(intercept: &Intercept) -> (&[u8], ResponseSource) {
    match intercept {
      Intercept::Respond { response, source } => (response.body.as_slice(), *source),
      Intercept::Passthrough => panic!("expected a response"),
    }
  }

  #[tokio::test]
  async fn test_install_populates_cache() {
    let network = FakeNetwork::default()
      .with("http://localhost:5173/app/", ok("index"))
      .with("http://localhost:5173/app/manifest.json", ok("{}"));
    let mut worker = worker(&["/app/", "/app/manifest.json"], network);

    assert_eq!(worker.state(), WorkerState::Parsed);
    assert_eq!(worker.install().await.unwrap(), InstallOutcome::Populated(2));
    assert_eq!(worker.state(), WorkerState::Installed);

    let cached = [
      ("/app/", b"index".as_slice()),
      ("/app/manifest.json", b"{}".as_slice()),
    ];
    for (path, expected) in cached {
      let intercept = worker.handle(&get(path)).await.unwrap();
      assert_eq!(body(&intercept), (expected, ResponseSource::Cache));
    }
    assert_eq!(worker.network.calls(), 2);
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let network = FakeNetwork::default()
      .with("http://localhost:5173/a.css", ok("a"))
      .with(
        "http://localhost:5173/b.css",
        AssetResponse {
          status: 404,
          ..ok("")
        },
      );
    let mut worker = worker(&["/a.css", "/b.css"], network);

    let outcome = worker.install().await.unwrap();
    assert!(matches!(outcome, InstallOutcome::Incomplete(_)));
    assert_eq!(worker.state(), WorkerState::Installed);
    assert_eq!(worker.cache_names().unwrap(), vec!["v2".to_string()]);
    assert!(worker
      .storage
      .match_request("v2", "http://localhost:5173/a.css")
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_activate_drops_old_caches_and_reloads_clients() {
    let mut worker = worker(&[], FakeNetwork::default());
    worker.storage.put("v1", "http://localhost:5173/old", &ok("old")).unwrap();
    let mut client = worker.clients().register();

    worker.install().await.unwrap();
    let reload = worker.activate().await.unwrap();
    assert_eq!(worker.state(), WorkerState::Activated);
    assert_eq!(worker.cache_names().unwrap(), vec!["v2".to_string()]);

    assert_eq!(reload.await.unwrap(), 1);
    assert_eq!(client.try_message(), Some(ClientMessage::Reload));
  }

  #[tokio::test]
  async fn test_passthrough_requests() {
    let worker = worker(&["/app/"], FakeNetwork::default());

    let post = AssetRequest {
      method: "POST".to_string(),
      ..get("/app/")
    };
    assert_eq!(worker.handle(&post).await.unwrap(), Intercept::Passthrough);

    let extension = AssetRequest::get(Url::parse("chrome-extension://abc/app/").unwrap());
    assert_eq!(worker.handle(&extension).await.unwrap(), Intercept::Passthrough);
    assert_eq!(worker.network.calls(), 0);
  }

  #[tokio::test]
  async fn test_static_miss_is_fetched_and_cached() {
    let network = FakeNetwork::default().with("http://localhost:5173/logo.png", ok("png"));
    let worker = worker(&["logo.png"], network);

    let first = worker.handle(&get("/logo.png")).await.unwrap();
    assert_eq!(body(&first), (b"png".as_slice(), ResponseSource::Network));

    let second = worker.handle(&get("/logo.png")).await.unwrap();
    assert_eq!(body(&second), (b"png".as_slice(), ResponseSource::Cache));
    assert_eq!(worker.network.calls(), 1);
  }

  #[tokio::test]
  async fn test_cross_origin_response_not_cached() {
    let network = FakeNetwork::default().with(
      "http://localhost:5173/font.woff2",
      AssetResponse {
        response_type: ResponseType::Cors,
        ..ok("font")
      },
    );
    let worker = worker(&["/font.woff2"], network);

    worker.handle(&get("/font.woff2")).await.unwrap();
    worker.handle(&get("/font.woff2")).await.unwrap();
    assert_eq!(worker.network.calls(), 2);
  }

  #[tokio::test]
  async fn test_static_network_failure_falls_back() {
    let worker = worker(&["/app/"], FakeNetwork::default());

    let intercept = worker.handle(&get("/app/")).await.unwrap();
    match intercept {
      Intercept::Respond { response, source } => {
        assert_eq!(source, ResponseSource::Fallback);
        assert_eq!(response.status, 503);
        assert_eq!(response.body, b"Network error. Check your connection!".to_vec());
      }
      Intercept::Passthrough => panic!("expected fallback"),
    }
  }

  #[tokio::test]
  async fn test_other_requests_go_to_network() {
    let network = FakeNetwork::default().with("http://localhost:5173/api/data", ok("data"));
    let worker = worker(&["/app/"], network);

    let intercept = worker.handle(&get("/api/data")).await.unwrap();
    assert_eq!(body(&intercept), (b"data".as_slice(), ResponseSource::Network));
    worker.handle(&get("/api/data")).await.unwrap();
    assert_eq!(worker.network.calls(), 2);

    let stored = worker
      .storage
      .match_request("v2", "http://localhost:5173/api/data")
      .unwrap();
    assert!(stored.is_none());
    assert!(worker.cache_names().unwrap().is_empty());

    assert!(worker.handle(&get("/api/missing")).await.is_err());
  }
}
