use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Where vocabulary data lives
  #[serde(default)]
  pub backend: Backend,
  #[serde(default)]
  pub firebase: FirebaseConfig,
  #[serde(default)]
  pub local: LocalConfig,
  #[serde(default)]
  pub offline: OfflineConfig,
  #[serde(default)]
  pub log: LogConfig,
  /// Overrides the platform data directory (session, local store, asset cache)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  /// Cloud Firestore, requires login
  #[default]
  Firestore,
  /// SQLite file in the data directory, single configured user
  Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
  #[serde(default)]
  pub project_id: String,
  /// Web API key; the environment takes precedence (see `resolve_api_key`)
  pub api_key: Option<String>,
  #[serde(default = "default_firestore_url")]
  pub firestore_url: String,
  #[serde(default = "default_auth_url")]
  pub auth_url: String,
  #[serde(default = "default_token_url")]
  pub token_url: String,
}

impl Default for FirebaseConfig {
  fn default() -> Self {
    Self {
      project_id: String::new(),
      api_key: None,
      firestore_url: default_firestore_url(),
      auth_url: default_auth_url(),
      token_url: default_token_url(),
    }
  }
}

fn default_firestore_url() -> String {
  "https://firestore.googleapis.com/v1".to_string()
}

fn default_auth_url() -> String {
  "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_token_url() -> String {
  "https://securetoken.googleapis.com/v1/token".to_string()
}

impl FirebaseConfig {
  /// Get the Firebase web API key.
  ///
  /// Checks WORDCARDS_FIREBASE_API_KEY, then FIREBASE_API_KEY, then the config file.
  pub fn resolve_api_key(&self) -> Result<String> {
    std::env::var("WORDCARDS_FIREBASE_API_KEY")
      .or_else(|_| std::env::var("FIREBASE_API_KEY"))
      .ok()
      .or_else(|| self.api_key.clone())
      .filter(|k| !k.is_empty())
      .ok_or_else(|| {
        eyre!(
          "Firebase API key not found. Set WORDCARDS_FIREBASE_API_KEY or firebase.api_key in the config."
        )
      })
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
  /// User id every local operation is scoped to
  #[serde(default = "default_local_user")]
  pub user: String,
  /// Store file (default: `<data_dir>/vocabulary.db`)
  pub path: Option<PathBuf>,
}

impl Default for LocalConfig {
  fn default() -> Self {
    Self {
      user: default_local_user(),
      path: None,
    }
  }
}

fn default_local_user() -> String {
  "local".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
  /// When false, the asset cache stores nothing and every request goes to the network
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Cache version tag; bump it on every deploy
  #[serde(default = "default_version")]
  pub version: String,
  /// Origin the static paths are resolved against
  #[serde(default = "default_origin")]
  pub origin: String,
  /// Paths cached on install and served cache-first afterwards
  #[serde(default)]
  pub static_files: Vec<String>,
  #[serde(default = "default_reload_delay_ms")]
  pub reload_delay_ms: u64,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      version: default_version(),
      origin: default_origin(),
      static_files: Vec::new(),
      reload_delay_ms: default_reload_delay_ms(),
    }
  }
}

impl OfflineConfig {
  pub fn reload_delay(&self) -> Duration {
    Duration::from_millis(self.reload_delay_ms)
  }
}

fn default_true() -> bool {
  true
}

fn default_version() -> String {
  "v1".to_string()
}

fn default_origin() -> String {
  "http://localhost:5173".to_string()
}

fn default_reload_delay_ms() -> u64 {
  1000
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
  /// tracing filter directive, overridden by RUST_LOG
  pub filter: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wordcards.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wordcards/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/wordcards/config.yaml\n\
                 See wordcards.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("wordcards.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("wordcards").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.backend == Backend::Firestore && self.firebase.project_id.is_empty() {
      return Err(eyre!("firebase.project_id is required for the firestore backend"));
    }
    if self.backend == Backend::Local && self.local.user.trim().is_empty() {
      return Err(eyre!("local.user must not be empty"));
    }
    url::Url::parse(&self.offline.origin)
      .map_err(|e| eyre!("Invalid offline.origin '{}': {}", self.offline.origin, e))?;
    Ok(())
  }

  /// Directory for the session file, local store and asset cache.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("wordcards"))
  }

  pub fn local_store_path(&self) -> Result<PathBuf> {
    match &self.local.path {
      Some(path) => Ok(path.clone()),
      None => Ok(self.data_dir()?.join("vocabulary.db")),
    }
  }

  pub fn asset_cache_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("offline-cache.db"))
  }
}
