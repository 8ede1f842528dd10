//! Offline asset cache.
//!
//! A versioned cache of the app's static files, filled on install and
//! served cache-first afterwards. Activating a new version deletes every
//! other cache and asks controlled clients to reload.

mod clients;
mod network;
mod storage;
mod traits;
mod worker;

pub use clients::ClientRegistry;
pub use network::HttpNetwork;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{AssetRequest, Intercept, Network};
pub use worker::{InstallOutcome, OfflineWorker, WorkerState};
