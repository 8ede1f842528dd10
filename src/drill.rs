//! Flashcard drill state.
//!
//! Only words below the mastered threshold are drilled. New words show the
//! source word first; learned words are drilled in reverse.

use crate::vocab::{
  resolve_dictionary_id, Dictionary, Mastery, Word, DEFAULT_DICTIONARY_ID, MASTERED_THRESHOLD,
};

/// The two faces of a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
  pub front: String,
  pub back: String,
}

impl Card {
  pub fn for_word(word: &Word) -> Self {
    let source = word.source_word.clone();
    let translation = word.translation.to_string();
    match word.mastery() {
      Mastery::New => Card {
        front: source,
        back: translation,
      },
      Mastery::Learned | Mastery::Mastered => Card {
        front: translation,
        back: source,
      },
    }
  }
}

fn is_drillable(word: &Word) -> bool {
  word.know_count < MASTERED_THRESHOLD
}

/// First dictionary holding drillable words, the default one otherwise.
pub fn pick_dictionary(dictionaries: &[Dictionary], words: &[Word]) -> String {
  dictionaries
    .iter()
    .find(|d| {
      words
        .iter()
        .any(|w| resolve_dictionary_id(w) == d.id && is_drillable(w))
    })
    .map(|d| d.id.clone())
    .unwrap_or_else(|| DEFAULT_DICTIONARY_ID.to_string())
}

/// Cyclic walk over the drillable words of one dictionary.
#[derive(Debug, Clone)]
pub struct DrillSession {
  words: Vec<Word>,
  index: usize,
  revealed: bool,
}

impl DrillSession {
  pub fn new(words: Vec<Word>) -> Self {
    Self {
      words: words.into_iter().filter(is_drillable).collect(),
      index: 0,
      revealed: false,
    }
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  pub fn current_word(&self) -> Option<&Word> {
    self.words.get(self.index)
  }

  pub fn current_card(&self) -> Option<Card> {
    self.current_word().map(Card::for_word)
  }

  pub fn is_revealed(&self) -> bool {
    self.revealed
  }

  /// Flip the current card.
  pub fn reveal(&mut self) -> Option<Card> {
    self.revealed = true;
    self.current_card()
  }

  pub fn advance(&mut self) {
    self.revealed = false;
    if !self.words.is_empty() {
      self.index = (self.index + 1) % self.words.len();
    }
  }

  /// Record the stored count after a successful recall and move on.
  ///
  /// A word that reaches the mastered threshold leaves the rotation.
  pub fn apply_recall(&mut self, new_count: u32) {
    let Some(word) = self.words.get_mut(self.index) else {
      return;
    };
    word.know_count = new_count;

    if is_drillable(word) {
      self.advance();
      return;
    }

    self.words.remove(self.index);
    self.revealed = false;
    if self.index >= self.words.len() {
      self.index = 0;
    }
  }
}
