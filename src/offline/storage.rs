//! Named response caches: storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::traits::{AssetResponse, CachedResponse, ResponseType};

/// Trait for cache storage backends.
///
/// A backend holds any number of named caches; each maps a request key to
/// a stored response.
pub trait CacheStorage: Send + Sync {
  /// Create the named cache if it does not exist.
  fn open(&self, cache_name: &str) -> Result<()>;

  /// Names of all existing caches, oldest first.
  fn keys(&self) -> Result<Vec<String>>;

  /// Delete a cache and its entries. Returns whether it existed.
  fn delete(&self, cache_name: &str) -> Result<bool>;

  /// Look up a response by request key.
  fn match_request(&self, cache_name: &str, key: &str) -> Result<Option<CachedResponse>>;

  /// Store one response, replacing any previous one for the key.
  fn put(&self, cache_name: &str, key: &str, response: &AssetResponse) -> Result<()>;

  /// Store several responses atomically.
  fn put_all(&self, cache_name: &str, entries: &[(String, AssetResponse)]) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when the offline cache is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn open(&self, _cache_name: &str) -> Result<()> {
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn delete(&self, _cache_name: &str) -> Result<bool> {
    Ok(false)
  }

  fn match_request(&self, _cache_name: &str, _key: &str) -> Result<Option<CachedResponse>> {
    Ok(None) // Always miss
  }

  fn put(&self, _cache_name: &str, _key: &str, _response: &AssetResponse) -> Result<()> {
    Ok(()) // Discard
  }

  fn put_all(&self, _cache_name: &str, _entries: &[(String, AssetResponse)]) -> Result<()> {
    Ok(()) // Discard
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS caches (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    response_type TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, request_key)
);
"#;

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

fn insert_entry(
  conn: &Connection,
  cache_name: &str,
  key: &str,
  response: &AssetResponse,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;
  let response_type = serde_json::to_string(&response.response_type)
    .map_err(|e| eyre!("Failed to serialize response type: {}", e))?;

  conn
    .execute(
      "INSERT OR IGNORE INTO caches (name) VALUES (?)",
      params![cache_name],
    )
    .map_err(|e| eyre!("Failed to open cache {}: {}", cache_name, e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries
         (cache_name, request_key, status, headers, body, response_type, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
      params![cache_name, key, response.status, headers, response.body, response_type],
    )
    .map_err(|e| eyre!("Failed to store {} in {}: {}", key, cache_name, e))?;

  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open(&self, cache_name: &str) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR IGNORE INTO caches (name) VALUES (?)",
        params![cache_name],
      )
      .map_err(|e| eyre!("Failed to open cache {}: {}", cache_name, e))?;
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM caches ORDER BY created_at, rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;
    Ok(names)
  }

  fn delete(&self, cache_name: &str) -> Result<bool> {
    let conn = self.lock()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE cache_name = ?",
      params![cache_name],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", cache_name, e))?;
    let removed = tx
      .execute("DELETE FROM caches WHERE name = ?", params![cache_name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", cache_name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(removed > 0)
  }

  fn match_request(&self, cache_name: &str, key: &str) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;
    let row: Option<(u16, String, Vec<u8>, String, String)> = conn
      .query_row(
        "SELECT status, headers, body, response_type, cached_at FROM cache_entries
         WHERE cache_name = ? AND request_key = ?",
        params![cache_name, key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", key, e))?;

    let Some((status, headers, body, response_type, cached_at)) = row else {
      return Ok(None);
    };

    let headers: Vec<(String, String)> = serde_json::from_str(&headers)
      .map_err(|e| eyre!("Corrupt headers for {}: {}", key, e))?;
    let response_type: ResponseType = serde_json::from_str(&response_type)
      .map_err(|e| eyre!("Corrupt response type for {}: {}", key, e))?;

    Ok(Some(CachedResponse {
      response: AssetResponse {
        status,
        headers,
        body,
        response_type,
      },
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  fn put(&self, cache_name: &str, key: &str, response: &AssetResponse) -> Result<()> {
    let conn = self.lock()?;
    insert_entry(&conn, cache_name, key, response)
  }

  fn put_all(&self, cache_name: &str, entries: &[(String, AssetResponse)]) -> Result<()> {
    let conn = self.lock()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (key, response) in entries {
      insert_entry(&tx, cache_name, key, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(body: &str) -> AssetResponse {
    AssetResponse {
      status: 200,
      headers: vec![("content-type".to_string(), "text/css".to_string())],
      body: body.as_bytes().to_vec(),
      response_type: ResponseType::Basic,
    }
  }

  #[test]
  fn test_put_and_match() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("v1", "https://a/x.css", &response("x")).unwrap();

    let hit = storage.match_request("v1", "https://a/x.css").unwrap().unwrap();
    assert_eq!(hit.response, response("x"));
    assert!(storage.match_request("v2", "https://a/x.css").unwrap().is_none());
    assert_eq!(storage.keys().unwrap(), vec!["v1".to_string()]);
  }

  #[test]
  fn test_delete_removes_entries() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put_all(
        "v1",
        &[
          ("https://a/1".to_string(), response("1")),
          ("https://a/2".to_string(), response("2")),
        ],
      )
      .unwrap();
    storage.open("v2").unwrap();

    assert!(storage.delete("v1").unwrap());
    assert!(!storage.delete("v1").unwrap());
    assert!(storage.match_request("v1", "https://a/1").unwrap().is_none());
    assert_eq!(storage.keys().unwrap(), vec!["v2".to_string()]);
  }

  #[test]
  fn test_keys_in_creation_order() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.open("v3").unwrap();
    storage.open("v1").unwrap();
    storage.open("v3").unwrap();
    assert_eq!(storage.keys().unwrap(), vec!["v3".to_string(), "v1".to_string()]);
  }

  #[test]
  fn test_noop_storage_never_hits() {
    let storage = NoopStorage;
    storage.put("v1", "k", &response("x")).unwrap();
    assert!(storage.match_request("v1", "k").unwrap().is_none());
    assert!(storage.keys().unwrap().is_empty());
  }
}
