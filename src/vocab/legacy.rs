//! Single-document vocabulary model (`dictionaries/{uid}`).
//!
//! Each user has one document holding a `words` map keyed by source word.
//! This model is independent of [`super::VocabularyRepository`]: nothing is
//! migrated between the two and neither is derived from the other.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::types::UserId;
use crate::store::{CollectionRef, DocumentRef, DocumentStore, Fields};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEntry {
  pub source_language: String,
  /// Target language → translation
  #[serde(default)]
  pub translations: BTreeMap<String, String>,
}

pub type LegacyWords = BTreeMap<String, LegacyEntry>;

#[derive(Debug, Default, Deserialize)]
struct LegacyDocument {
  #[serde(default)]
  words: LegacyWords,
}

pub struct LegacyDictionary<S: DocumentStore> {
  store: Arc<S>,
}

fn user_dictionary(user: &UserId) -> DocumentRef {
  CollectionRef::root("dictionaries").doc(user.as_str())
}

fn words_fields(words: &LegacyWords) -> Result<Fields> {
  let value = serde_json::to_value(words).map_err(|e| eyre!("Failed to encode words: {}", e))?;
  let mut fields = Fields::new();
  fields.insert("words".to_string(), value);
  Ok(fields)
}

impl<S: DocumentStore> LegacyDictionary<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  async fn load(&self, doc: &DocumentRef) -> Result<Option<LegacyWords>> {
    match self.store.get(doc).await? {
      Some(document) => Ok(Some(document.decode::<LegacyDocument>()?.words)),
      None => Ok(None),
    }
  }

  /// The user's words, empty when the document does not exist.
  pub async fn get_user_dictionary(&self, user: &UserId) -> Result<LegacyWords> {
    Ok(self.load(&user_dictionary(user)).await?.unwrap_or_default())
  }

  /// Set the translation of `source_word` into `target_language`.
  ///
  /// A new entry takes `source_language`; an existing entry keeps its own
  /// source language and other translations.
  pub async fn add_or_update_word(
    &self,
    user: &UserId,
    source_word: &str,
    source_language: &str,
    target_language: &str,
    translation: &str,
  ) -> Result<()> {
    let doc = user_dictionary(user);
    let mut words = self.load(&doc).await?.unwrap_or_default();

    words
      .entry(source_word.to_string())
      .or_insert_with(|| LegacyEntry {
        source_language: source_language.to_string(),
        translations: BTreeMap::new(),
      })
      .translations
      .insert(target_language.to_string(), translation.to_string());

    self.store.set(&doc, words_fields(&words)?, true).await?;
    info!(source_word, target_language, "Legacy word saved");
    Ok(())
  }

  /// Remove `source_word`. Returns false when the user has no document.
  pub async fn delete_word(&self, user: &UserId, source_word: &str) -> Result<bool> {
    let doc = user_dictionary(user);
    let Some(mut words) = self.load(&doc).await? else {
      return Ok(false);
    };

    words.remove(source_word);
    self.store.update(&doc, words_fields(&words)?).await?;
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::SqliteStore;

  fn legacy() -> (LegacyDictionary<SqliteStore>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    (LegacyDictionary::new(Arc::clone(&store)), store)
  }

  #[tokio::test]
  async fn test_missing_document_is_empty() {
    let (legacy, _) = legacy();
    let user = UserId::new("u1");
    assert!(legacy.get_user_dictionary(&user).await.unwrap().is_empty());
    assert!(!legacy.delete_word(&user, "gato").await.unwrap());
  }

  #[tokio::test]
  async fn test_add_translations_keeps_source_language() {
    let (legacy, _) = legacy();
    let user = UserId::new("u1");

    legacy
      .add_or_update_word(&user, "gato", "es", "en", "cat")
      .await
      .unwrap();
    legacy
      .add_or_update_word(&user, "gato", "pt", "ru", "кот")
      .await
      .unwrap();

    let words = legacy.get_user_dictionary(&user).await.unwrap();
    let gato = &words["gato"];
    assert_eq!(gato.source_language, "es");
    assert_eq!(gato.translations["en"], "cat");
    assert_eq!(gato.translations["ru"], "кот");
  }

  #[tokio::test]
  async fn test_delete_word() {
    let (legacy, _) = legacy();
    let user = UserId::new("u1");
    legacy.add_or_update_word(&user, "gato", "es", "en", "cat").await.unwrap();
    legacy.add_or_update_word(&user, "perro", "es", "en", "dog").await.unwrap();

    assert!(legacy.delete_word(&user, "gato").await.unwrap());

    let words = legacy.get_user_dictionary(&user).await.unwrap();
    assert_eq!(words.keys().collect::<Vec<_>>(), vec!["perro"]);
  }

  #[tokio::test]
  async fn test_does_not_touch_subcollection_model() {
    let (legacy, store) = legacy();
    let user = UserId::new("u1");
    legacy.add_or_update_word(&user, "gato", "es", "en", "cat").await.unwrap();

    let words = CollectionRef::root("users").doc("u1").collection("words");
    assert!(store.list(&words).await.unwrap().is_empty());
  }
}
