use crate::cli::{DataCommand, DictCommand, LegacyCommand, WordCommand};
use crate::commands::{self, DrillAction};
use crate::drill::{pick_dictionary, DrillSession};
use crate::store::DocumentStore;
use crate::vocab::import::{import_words, read_entries};
use crate::vocab::{
  resolve_dictionary_id, LegacyDictionary, Translation, UserId, VocabularyRepository, Word,
  WordUpdate,
};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

/// Counters reported when a drill ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrillStats {
  pub known: usize,
  pub revealed: usize,
}

/// Runs data commands for one user against one store.
pub struct App<S: DocumentStore> {
  repo: VocabularyRepository<S>,
  legacy: LegacyDictionary<S>,
  user: UserId,
}

fn write_err(e: std::io::Error) -> color_eyre::Report {
  eyre!("Failed to write output: {}", e)
}

/// Report a sentinel result: `Ok` on success, an error carrying `what` otherwise.
fn check(ok: bool, what: &str) -> Result<()> {
  if ok {
    Ok(())
  } else {
    Err(eyre!("Failed to {} (see log for details)", what))
  }
}

fn format_word(word: &Word) -> String {
  format!(
    "{:<22} {:<20} -> {:<30} [{}] {:>2} {}",
    word.id,
    word.source_word,
    word.translation,
    resolve_dictionary_id(word),
    word.know_count,
    word.mastery()
  )
}

impl<S: DocumentStore> App<S> {
  pub fn new(store: Arc<S>, user: UserId) -> Self {
    Self {
      repo: VocabularyRepository::new(Arc::clone(&store)),
      legacy: LegacyDictionary::new(store),
      user,
    }
  }

  pub async fn run(&self, command: DataCommand, out: &mut impl Write) -> Result<()> {
    debug!(user = %self.user.as_str(), ?command, "Running command");

    match command {
      DataCommand::Dict(cmd) => self.run_dict(cmd, out).await,
      DataCommand::Word(cmd) => self.run_word(cmd, out).await,
      DataCommand::Drill { dict } => {
        let stdin = BufReader::new(tokio::io::stdin());
        let stats = self.drill(dict.as_deref(), stdin, out).await?;
        writeln!(out, "Known: {}, revealed: {}", stats.known, stats.revealed).map_err(write_err)
      }
      DataCommand::Import { file, dict } => {
        let entries = read_entries(&file)?;
        let summary = import_words(&self.repo, &self.user, entries, dict.as_deref()).await;
        writeln!(out, "Added {} words, {} failed", summary.added, summary.failed)
          .map_err(write_err)?;
        if summary.failed > 0 {
          return Err(eyre!("{} words could not be imported", summary.failed));
        }
        Ok(())
      }
      DataCommand::Legacy(cmd) => self.run_legacy(cmd, out).await,
    }
  }

  async fn run_dict(&self, command: DictCommand, out: &mut impl Write) -> Result<()> {
    match command {
      DictCommand::Add { name } => {
        let id = self
          .repo
          .create_dictionary(&self.user, &name)
          .await
          .ok_or_else(|| eyre!("Failed to create dictionary '{}'", name))?;
        writeln!(out, "{}", id).map_err(write_err)
      }
      DictCommand::List => {
        for dictionary in self.repo.dictionaries_with_default(&self.user).await {
          writeln!(out, "{:<22} {}", dictionary.id, dictionary.name).map_err(write_err)?;
        }
        Ok(())
      }
      DictCommand::Rename { id, name } => check(
        self.repo.rename_dictionary(&self.user, &id, &name).await,
        "rename dictionary",
      ),
      DictCommand::Delete { id } => check(
        self.repo.delete_dictionary(&self.user, &id).await,
        "delete dictionary",
      ),
    }
  }

  async fn run_word(&self, command: WordCommand, out: &mut impl Write) -> Result<()> {
    match command {
      WordCommand::Add {
        source_word,
        translation,
        dict,
      } => {
        let id = self
          .repo
          .add_word(
            &self.user,
            &source_word,
            Translation::from_values(translation),
            dict.as_deref(),
          )
          .await
          .ok_or_else(|| eyre!("Failed to add '{}'", source_word))?;
        writeln!(out, "{}", id).map_err(write_err)
      }
      WordCommand::List { dict, exact } => {
        let words = match dict.as_deref() {
          Some(id) if !exact => self.repo.words_in_dictionary(&self.user, id).await,
          other => self.repo.list_words(&self.user, other).await,
        };
        for word in &words {
          writeln!(out, "{}", format_word(word)).map_err(write_err)?;
        }
        Ok(())
      }
      WordCommand::Edit {
        id,
        source_word,
        translation,
        dict,
        reset_count,
      } => {
        let update = WordUpdate {
          source_word,
          translation: Translation::from_values(translation),
          dictionary_id: dict,
          know_count: reset_count.then_some(0),
        };
        check(
          self.repo.update_word(&self.user, &id, update).await,
          "update word",
        )
      }
      WordCommand::Know { id, count } => check(
        self.repo.update_know_count(&self.user, &id, count).await,
        "update know count",
      ),
      WordCommand::Move { id, dict } => check(
        self.repo.change_word_dictionary(&self.user, &id, &dict).await,
        "move word",
      ),
      WordCommand::Delete { id } => {
        check(self.repo.delete_word(&self.user, &id).await, "delete word")
      }
    }
  }

  async fn run_legacy(&self, command: LegacyCommand, out: &mut impl Write) -> Result<()> {
    match command {
      LegacyCommand::Show => {
        let words = self.legacy.get_user_dictionary(&self.user).await?;
        for (source_word, entry) in &words {
          let translations: Vec<String> = entry
            .translations
            .iter()
            .map(|(language, translation)| format!("{}: {}", language, translation))
            .collect();
          writeln!(
            out,
            "{} ({}) {}",
            source_word,
            entry.source_language,
            translations.join(", ")
          )
          .map_err(write_err)?;
        }
        Ok(())
      }
      LegacyCommand::Set {
        source_word,
        translation,
        from,
        to,
      } => {
        self
          .legacy
          .add_or_update_word(&self.user, &source_word, &from, &to, &translation)
          .await
      }
      LegacyCommand::Remove { source_word } => {
        if !self.legacy.delete_word(&self.user, &source_word).await? {
          writeln!(out, "No legacy dictionary for this user").map_err(write_err)?;
        }
        Ok(())
      }
    }
  }

  /// Interactive drill reading one command per line from `input`.
  pub async fn drill<R>(
    &self,
    dictionary_id: Option<&str>,
    input: R,
    out: &mut impl Write,
  ) -> Result<DrillStats>
  where
    R: AsyncBufRead + Unpin,
  {
    let dictionary_id = match dictionary_id {
      Some(id) => id.to_string(),
      None => {
        let dictionaries = self.repo.dictionaries_with_default(&self.user).await;
        let words = self.repo.list_words(&self.user, None).await;
        pick_dictionary(&dictionaries, &words)
      }
    };

    let words = self.repo.words_in_dictionary(&self.user, &dictionary_id).await;
    let mut session = DrillSession::new(words);
    let mut stats = DrillStats::default();
    let mut lines = input.lines();

    writeln!(out, "Drilling '{}' ({} words)", dictionary_id, session.len()).map_err(write_err)?;

    loop {
      let Some(card) = session.current_card() else {
        writeln!(out, "Nothing left to drill").map_err(write_err)?;
        break;
      };
      if !session.is_revealed() {
        writeln!(out, "\n  {}", card.front).map_err(write_err)?;
      }
      write!(out, "> ").map_err(write_err)?;
      out.flush().map_err(write_err)?;

      let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| eyre!("Failed to read input: {}", e))?
      else {
        break;
      };

      match commands::resolve(&line) {
        Some(DrillAction::Know) => {
          let Some(word) = session.current_word().cloned() else {
            continue;
          };
          match self.repo.record_recall(&self.user, &word).await {
            Some(count) => {
              stats.known += 1;
              session.apply_recall(count);
            }
            None => {
              writeln!(out, "Could not save progress").map_err(write_err)?;
              session.advance();
            }
          }
        }
        Some(DrillAction::Reveal) => {
          if let Some(card) = session.reveal() {
            stats.revealed += 1;
            writeln!(out, "  = {}", card.back).map_err(write_err)?;
          }
        }
        Some(DrillAction::Next) => session.advance(),
        Some(DrillAction::Quit) => break,
        None => {
          for cmd in commands::COMMANDS {
            writeln!(
              out,
              "  {:<8} ({}) {}",
              cmd.name,
              cmd.aliases.join(", "),
              cmd.description
            )
            .map_err(write_err)?;
          }
        }
      }
    }

    Ok(stats)
  }
}
