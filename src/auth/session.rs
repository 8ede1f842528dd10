use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub user_id: String,
  pub email: String,
  pub id_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl Session {
  pub fn is_expired(&self) -> bool {
    Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
  }
}

/// Persists the current session as JSON in the data directory.
pub struct SessionStore {
  path: PathBuf,
}

impl SessionStore {
  pub fn new(data_dir: &Path) -> Self {
    Self {
      path: data_dir.join("session.json"),
    }
  }

  pub fn load(&self) -> Result<Option<Session>> {
    if !self.path.exists() {
      return Ok(None);
    }

    let contents = std::fs::read_to_string(&self.path)
      .map_err(|e| eyre!("Failed to read session {}: {}", self.path.display(), e))?;
    let session = serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse session {}: {}", self.path.display(), e))?;
    Ok(Some(session))
  }

  pub fn save(&self, session: &Session) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(session)
      .map_err(|e| eyre!("Failed to serialize session: {}", e))?;
    std::fs::write(&self.path, contents)
      .map_err(|e| eyre!("Failed to write session {}: {}", self.path.display(), e))
  }

  /// Forget the session. Returns whether one existed.
  pub fn clear(&self) -> Result<bool> {
    if !self.path.exists() {
      return Ok(false);
    }
    std::fs::remove_file(&self.path)
      .map_err(|e| eyre!("Failed to remove session {}: {}", self.path.display(), e))?;
    Ok(true)
  }
}
