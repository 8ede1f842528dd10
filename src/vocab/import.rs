//! Bulk word import from a JSON or YAML list.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{error, info};

use super::repository::VocabularyRepository;
use super::types::{Translation, UserId};
use crate::store::DocumentStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEntry {
  pub source_word: String,
  pub translation: Translation,
  pub dictionary_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
  pub added: usize,
  pub failed: usize,
}

/// Parse an import file; `.json` is read as JSON, anything else as YAML.
pub fn read_entries(path: &Path) -> Result<Vec<ImportEntry>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;

  let is_json = path
    .extension()
    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

  if is_json {
    serde_json::from_str(&contents).map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))
  } else {
    serde_yaml::from_str(&contents).map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))
  }
}

/// Add entries one by one. A failed entry is logged and skipped.
///
/// `dictionary_id` applies to entries that do not name their own.
pub async fn import_words<S: DocumentStore>(
  repo: &VocabularyRepository<S>,
  user: &UserId,
  entries: Vec<ImportEntry>,
  dictionary_id: Option<&str>,
) -> ImportSummary {
  let mut summary = ImportSummary::default();

  for entry in entries {
    let target = entry.dictionary_id.as_deref().or(dictionary_id);
    match repo
      .add_word(user, &entry.source_word, entry.translation, target)
      .await
    {
      Some(_) => {
        info!(source_word = %entry.source_word, "Imported word");
        summary.added += 1;
      }
      None => {
        error!(source_word = %entry.source_word, "Failed to import word");
        summary.failed += 1;
      }
    }
  }

  summary
}
