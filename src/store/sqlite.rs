//! Local SQLite document store.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{CollectionRef, Document, DocumentRef, DocumentStore, Fields};

/// Length of generated document ids, matching Firestore auto-ids.
const GENERATED_ID_LEN: usize = 20;

/// Document store backed by a single SQLite table.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  id_counter: AtomicU64,
}

const DOCUMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, id)
);
"#;

impl SqliteStore {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  /// Store that lives only as long as the process.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(DOCUMENT_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
      id_counter: AtomicU64::new(0),
    })
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Generate a 20 character document id.
  fn generate_id(&self, collection: &CollectionRef) -> String {
    let counter = self.id_counter.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(collection.path().as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(counter.to_le_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(GENERATED_ID_LEN);
    id
  }

  fn read(&self, doc: &DocumentRef) -> Result<Option<Document>> {
    let conn = self.lock()?;
    let data: Option<String> = conn
      .query_row(
        "SELECT data FROM documents WHERE collection = ? AND id = ?",
        params![doc.parent().path(), doc.id()],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", doc, e))?;

    data
      .map(|data| parse_document(doc.id().to_string(), &data))
      .transpose()
  }

  fn write(&self, doc: &DocumentRef, fields: &Fields) -> Result<()> {
    let conn = self.lock()?;
    let data =
      serde_json::to_string(fields).map_err(|e| eyre!("Failed to serialize {}: {}", doc, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO documents (collection, id, data, updated_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![doc.parent().path(), doc.id(), data],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", doc, e))?;

    Ok(())
  }

  fn read_collection(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(String, String)> = stmt
      .query_map(params![collection.path()], |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to list {}: {}", collection, e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read row of {}: {}", collection, e))?;

    rows
      .into_iter()
      .map(|(id, data)| parse_document(id, &data))
      .collect()
  }
}

fn parse_document(id: String, data: &str) -> Result<Document> {
  let fields: Fields =
    serde_json::from_str(data).map_err(|e| eyre!("Corrupt document {}: {}", id, e))?;
  Ok(Document { id, fields })
}

impl DocumentStore for SqliteStore {
  async fn add(&self, collection: &CollectionRef, fields: Fields) -> Result<String> {
    let id = self.generate_id(collection);
    self.write(&collection.doc(id.as_str()), &fields)?;
    Ok(id)
  }

  async fn get(&self, doc: &DocumentRef) -> Result<Option<Document>> {
    self.read(doc)
  }

  async fn set(&self, doc: &DocumentRef, fields: Fields, merge: bool) -> Result<()> {
    if !merge {
      return self.write(doc, &fields);
    }

    let mut merged = self.read(doc)?.map(|d| d.fields).unwrap_or_default();
    merged.extend(fields);
    self.write(doc, &merged)
  }

  async fn update(&self, doc: &DocumentRef, fields: Fields) -> Result<()> {
    let mut existing = self
      .read(doc)?
      .ok_or_else(|| eyre!("No document to update: {}", doc))?
      .fields;
    existing.extend(fields);
    self.write(doc, &existing)
  }

  async fn delete(&self, doc: &DocumentRef) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        params![doc.parent().path(), doc.id()],
      )
      .map_err(|e| eyre!("Failed to delete {}: {}", doc, e))?;
    Ok(())
  }

  async fn list(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
    self.read_collection(collection)
  }

  async fn query_eq(
    &self,
    collection: &CollectionRef,
    field: &str,
    value: &Value,
  ) -> Result<Vec<Document>> {
    let documents = self.read_collection(collection)?;
    Ok(
      documents
        .into_iter()
        .filter(|d| d.fields.get(field) == Some(value))
        .collect(),
    )
  }

  async fn delete_all(&self, docs: &[DocumentRef]) -> Result<()> {
    let conn = self.lock()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for doc in docs {
      tx.execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        params![doc.parent().path(), doc.id()],
      )
      .map_err(|e| eyre!("Failed to delete {}: {}", doc, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn fields(value: Value) -> Fields {
    match value {
      Value::Object(map) => map,
      _ => panic!("expected object"),
    }
  }

  fn words() -> CollectionRef {
    CollectionRef::root("users").doc("u1").collection("words")
  }

  #[tokio::test]
  async fn test_add_generates_distinct_ids() {
    let store = SqliteStore::open_in_memory().unwrap();
    let a = store.add(&words(), fields(json!({"sourceWord": "a"}))).await.unwrap();
    let b = store.add(&words(), fields(json!({"sourceWord": "b"}))).await.unwrap();

    assert_eq!(a.len(), GENERATED_ID_LEN);
    assert_ne!(a, b);
    assert_eq!(store.list(&words()).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_update_requires_existing_document() {
    let store = SqliteStore::open_in_memory().unwrap();
    let missing = words().doc("nope");

    assert!(store.update(&missing, fields(json!({"knowCount": 1}))).await.is_err());
    assert!(store.get(&missing).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_update_keeps_other_fields() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = store
      .add(&words(), fields(json!({"sourceWord": "hola", "knowCount": 0})))
      .await
      .unwrap();
    let doc = words().doc(id);

    store.update(&doc, fields(json!({"knowCount": 3}))).await.unwrap();

    let stored = store.get(&doc).await.unwrap().unwrap();
    assert_eq!(stored.fields["sourceWord"], json!("hola"));
    assert_eq!(stored.fields["knowCount"], json!(3));
  }

  #[tokio::test]
  async fn test_set_merge_and_replace() {
    let store = SqliteStore::open_in_memory().unwrap();
    let doc = CollectionRef::root("dictionaries").doc("u1");

    store.set(&doc, fields(json!({"a": 1, "b": 2})), false).await.unwrap();
    store.set(&doc, fields(json!({"b": 3})), true).await.unwrap();
    let merged = store.get(&doc).await.unwrap().unwrap();
    assert_eq!(merged.fields, fields(json!({"a": 1, "b": 3})));

    store.set(&doc, fields(json!({"c": 4})), false).await.unwrap();
    let replaced = store.get(&doc).await.unwrap().unwrap();
    assert_eq!(replaced.fields, fields(json!({"c": 4})));
  }

  #[tokio::test]
  async fn test_query_eq_and_collections_are_isolated() {
    let store = SqliteStore::open_in_memory().unwrap();
    let other_user = CollectionRef::root("users").doc("u2").collection("words");

    store.add(&words(), fields(json!({"dictionaryId": "d1"}))).await.unwrap();
    store.add(&words(), fields(json!({"dictionaryId": "d2"}))).await.unwrap();
    store.add(&other_user, fields(json!({"dictionaryId": "d1"}))).await.unwrap();

    let hits = store.query_eq(&words(), "dictionaryId", &json!("d1")).await.unwrap();
    assert_eq!(hits.len(), 1);
  }

  #[tokio::test]
  async fn test_delete_all_removes_batch() {
    let store = SqliteStore::open_in_memory().unwrap();
    let a = store.add(&words(), fields(json!({}))).await.unwrap();
    let b = store.add(&words(), fields(json!({}))).await.unwrap();
    let c = store.add(&words(), fields(json!({}))).await.unwrap();

    store
      .delete_all(&[words().doc(a), words().doc(b)])
      .await
      .unwrap();

    let left = store.list(&words()).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, c);
  }
}
