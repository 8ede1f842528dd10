use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel id of the implicit default dictionary.
pub const DEFAULT_DICTIONARY_ID: &str = "default";

/// Words at or above this count are shown as learned and drilled reversed.
pub const LEARNED_THRESHOLD: u32 = 5;
/// Words at or above this count are mastered and leave the drill.
pub const MASTERED_THRESHOLD: u32 = 10;

/// Authenticated user id; every collection is partitioned by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.trim().is_empty()
  }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A single translation or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Translation {
  One(String),
  Many(Vec<String>),
}

impl Translation {
  /// Build from one or more user-supplied values.
  pub fn from_values(mut values: Vec<String>) -> Self {
    if values.len() == 1 {
      Translation::One(values.remove(0))
    } else {
      Translation::Many(values)
    }
  }
}

impl fmt::Display for Translation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Translation::One(s) => f.pad(s),
      Translation::Many(values) => f.pad(&values.join(", ")),
    }
  }
}

impl From<&str> for Translation {
  fn from(s: &str) -> Self {
    Translation::One(s.to_string())
  }
}

/// A named grouping of words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
  #[serde(skip)]
  pub id: String,
  #[serde(default)]
  pub name: String,
}

impl Dictionary {
  pub fn default_dictionary() -> Self {
    Self {
      id: DEFAULT_DICTIONARY_ID.to_string(),
      name: DEFAULT_DICTIONARY_ID.to_string(),
    }
  }

  pub fn is_default(&self) -> bool {
    self.id == DEFAULT_DICTIONARY_ID
  }
}

/// A vocabulary entry in the subcollection model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
  #[serde(skip)]
  pub id: String,
  pub source_word: String,
  pub translation: Translation,
  /// Absent on words imported before dictionaries existed
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dictionary_id: Option<String>,
  #[serde(default)]
  pub know_count: u32,
}

impl Word {
  pub fn mastery(&self) -> Mastery {
    Mastery::from_count(self.know_count)
  }
}

/// Dictionary a word logically belongs to.
///
/// Words without a dictionary id, or with an empty one, belong to the
/// default dictionary. Every read path that groups words by dictionary goes
/// through here.
pub fn resolve_dictionary_id(word: &Word) -> &str {
  word
    .dictionary_id
    .as_deref()
    .filter(|id| !id.is_empty())
    .unwrap_or(DEFAULT_DICTIONARY_ID)
}

/// Normalize a caller-supplied dictionary id for writes.
pub fn dictionary_id_or_default(id: Option<&str>) -> &str {
  id.filter(|id| !id.is_empty()).unwrap_or(DEFAULT_DICTIONARY_ID)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mastery {
  New,
  Learned,
  Mastered,
}

impl Mastery {
  pub fn from_count(count: u32) -> Self {
    if count >= MASTERED_THRESHOLD {
      Mastery::Mastered
    } else if count >= LEARNED_THRESHOLD {
      Mastery::Learned
    } else {
      Mastery::New
    }
  }
}

impl fmt::Display for Mastery {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Mastery::New => "new",
      Mastery::Learned => "learned",
      Mastery::Mastered => "mastered",
    };
    f.pad(label)
  }
}

/// Replacement of a word's text and translation, optionally moving it.
#[derive(Debug, Clone)]
pub struct WordUpdate {
  pub source_word: String,
  pub translation: Translation,
  /// `None` keeps the current dictionary
  pub dictionary_id: Option<String>,
  /// `None` leaves the count untouched, `Some(0)` resets it
  pub know_count: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn word(dictionary_id: Option<&str>) -> Word {
    Word {
      id: "w".to_string(),
      source_word: "hola".to_string(),
      translation: "hello".into(),
      dictionary_id: dictionary_id.map(String::from),
      know_count: 0,
    }
  }

  #[test]
  fn test_resolve_dictionary_id() {
    assert_eq!(resolve_dictionary_id(&word(None)), DEFAULT_DICTIONARY_ID);
    assert_eq!(resolve_dictionary_id(&word(Some(""))), DEFAULT_DICTIONARY_ID);
    assert_eq!(resolve_dictionary_id(&word(Some("default"))), DEFAULT_DICTIONARY_ID);
    assert_eq!(resolve_dictionary_id(&word(Some("d1"))), "d1");
  }

  #[test]
  fn test_translation_forms() {
    let one: Translation = serde_json::from_str(r#""hello""#).unwrap();
    assert_eq!(one, Translation::One("hello".to_string()));

    let many: Translation = serde_json::from_str(r#"["hello", "hi"]"#).unwrap();
    assert_eq!(many.to_string(), "hello, hi");

    assert_eq!(
      Translation::from_values(vec!["x".to_string()]),
      Translation::One("x".to_string())
    );
  }

  #[test]
  fn test_word_without_dictionary_or_count_decodes() {
    let word: Word =
      serde_json::from_str(r#"{"sourceWord": "achieve", "translation": "достигать"}"#).unwrap();
    assert_eq!(word.dictionary_id, None);
    assert_eq!(word.know_count, 0);
  }

  #[test]
  fn test_mastery_thresholds() {
    assert_eq!(Mastery::from_count(0), Mastery::New);
    assert_eq!(Mastery::from_count(4), Mastery::New);
    assert_eq!(Mastery::from_count(5), Mastery::Learned);
    assert_eq!(Mastery::from_count(10), Mastery::Mastered);
  }
}
