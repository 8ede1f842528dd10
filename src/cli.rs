use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wordcards")]
#[command(about = "Vocabulary flashcards backed by Firestore or a local store")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wordcards/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  #[command(flatten)]
  Account(AccountCommand),

  #[command(flatten)]
  Data(DataCommand),

  /// Offline asset cache
  #[command(subcommand)]
  Offline(OfflineCommand),
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
  /// Create an account and sign in
  Register(Credentials),
  /// Sign in with an existing account
  Login(Credentials),
  /// Forget the stored session
  Logout,
  /// Show the signed-in user
  Whoami,
}

#[derive(ClapArgs, Debug)]
pub struct Credentials {
  pub email: String,
  #[arg(short, long)]
  pub password: String,
}

/// Commands that read or write vocabulary data.
#[derive(Subcommand, Debug)]
pub enum DataCommand {
  /// Manage dictionaries
  #[command(subcommand)]
  Dict(DictCommand),

  /// Manage words
  #[command(subcommand)]
  Word(WordCommand),

  /// Drill words as flashcards
  Drill {
    /// Dictionary to drill (default: first one with words left to learn)
    #[arg(short, long)]
    dict: Option<String>,
  },

  /// Add words from a JSON or YAML file
  Import {
    file: PathBuf,
    /// Dictionary for entries that do not name one
    #[arg(short, long)]
    dict: Option<String>,
  },

  /// Single-document vocabulary (one translation per target language)
  #[command(subcommand)]
  Legacy(LegacyCommand),
}

#[derive(Subcommand, Debug)]
pub enum DictCommand {
  Add {
    name: String,
  },
  List,
  Rename {
    id: String,
    name: String,
  },
  /// Delete a dictionary and all of its words
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum WordCommand {
  Add {
    source_word: String,
    /// One or more translations
    #[arg(required = true)]
    translation: Vec<String>,
    #[arg(short, long)]
    dict: Option<String>,
  },
  List {
    /// Only words of this dictionary
    #[arg(short, long)]
    dict: Option<String>,
    /// Match the stored dictionary id exactly (no default fallback)
    #[arg(long, requires = "dict")]
    exact: bool,
  },
  /// Replace a word's text, translation and dictionary
  Edit {
    id: String,
    source_word: String,
    #[arg(required = true)]
    translation: Vec<String>,
    #[arg(short, long)]
    dict: Option<String>,
    /// Reset the know count to zero
    #[arg(long)]
    reset_count: bool,
  },
  /// Set the know count
  Know {
    id: String,
    count: u32,
  },
  /// Move a word to another dictionary
  Move {
    id: String,
    dict: String,
  },
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum LegacyCommand {
  Show,
  Set {
    source_word: String,
    translation: String,
    /// Language of the source word (used when the word is new)
    #[arg(long, default_value = "en")]
    from: String,
    /// Language of the translation
    #[arg(long)]
    to: String,
  },
  Remove {
    source_word: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum OfflineCommand {
  /// Fetch the static files into the current cache version
  Install,
  /// Drop old cache versions and notify clients
  Activate,
  /// Resolve a request through the worker
  Fetch {
    url: String,
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
  },
  /// Show cache versions and configuration
  Status,
}
