use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info};

use super::session::Session;
use crate::config::FirebaseConfig;

/// Firebase email/password authentication client
#[derive(Clone)]
pub struct AuthClient {
  http: reqwest::Client,
  api_key: String,
  auth_url: String,
  token_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
  email: &'a str,
  password: &'a str,
  return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
  id_token: String,
  refresh_token: String,
  local_id: String,
  email: Option<String>,
  /// Seconds, as a decimal string
  expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
  id_token: String,
  refresh_token: String,
  user_id: String,
  expires_in: String,
}

#[derive(Debug, Deserialize)]
struct AuthErrorResponse {
  error: AuthErrorBody,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
  message: String,
}

impl AuthClient {
  pub fn new(config: &FirebaseConfig) -> Result<Self> {
    let api_key = config.resolve_api_key()?;
    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      api_key,
      auth_url: config.auth_url.trim_end_matches('/').to_string(),
      token_url: config.token_url.clone(),
    })
  }

  /// Create an account and sign in.
  pub async fn register(&self, email: &str, password: &str) -> Result<Session> {
    let session = self
      .password_request("accounts:signUp", email, password)
      .await
      .inspect_err(|e| error!("Error registering: {}", e))?;
    info!(user_id = %session.user_id, "Registered");
    Ok(session)
  }

  /// Sign in with an existing account.
  pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
    let session = self
      .password_request("accounts:signInWithPassword", email, password)
      .await
      .inspect_err(|e| error!("Error logging in: {}", e))?;
    info!(user_id = %session.user_id, "Logged in");
    Ok(session)
  }

  /// Exchange the refresh token for a fresh id token.
  pub async fn refresh(&self, session: &Session) -> Result<Session> {
    let form = [
      ("grant_type", "refresh_token"),
      ("refresh_token", session.refresh_token.as_str()),
    ];
    let builder = self
      .http
      .post(&self.token_url)
      .query(&[("key", &self.api_key)])
      .form(&form);

    let response: RefreshResponse = self.send(builder, "refresh session").await?;
    Ok(Session {
      user_id: response.user_id,
      email: session.email.clone(),
      id_token: response.id_token,
      refresh_token: response.refresh_token,
      expires_at: expiry(&response.expires_in)?,
    })
  }

  async fn password_request(&self, endpoint: &str, email: &str, password: &str) -> Result<Session> {
    let body = PasswordRequest {
      email,
      password,
      return_secure_token: true,
    };
    let builder = self
      .http
      .post(format!("{}/{}", self.auth_url, endpoint))
      .query(&[("key", &self.api_key)])
      .json(&body);

    let response: PasswordResponse = self.send(builder, endpoint).await?;
    Ok(Session {
      user_id: response.local_id,
      email: response.email.unwrap_or_else(|| email.to_string()),
      id_token: response.id_token,
      refresh_token: response.refresh_token,
      expires_at: expiry(&response.expires_in)?,
    })
  }

  async fn send<T: DeserializeOwned>(
    &self,
    builder: reqwest::RequestBuilder,
    what: &str,
  ) -> Result<T> {
    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Failed to {}: {}", what, e))?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!("Failed to {} ({}): {}", what, status, error_code(&body)));
    }

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {} response: {}", what, e))
  }
}

/// Provider error code (`EMAIL_EXISTS`, `INVALID_PASSWORD`, ...) or the raw body.
fn error_code(body: &str) -> String {
  serde_json::from_str::<AuthErrorResponse>(body)
    .map(|e| e.error.message)
    .unwrap_or_else(|_| body.trim().to_string())
}

fn expiry(expires_in: &str) -> Result<chrono::DateTime<Utc>> {
  let seconds: i64 = expires_in
    .parse()
    .map_err(|e| eyre!("Invalid token lifetime '{}': {}", expires_in, e))?;
  Ok(Utc::now() + Duration::seconds(seconds))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_code_extraction() {
    let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
    assert_eq!(error_code(body), "EMAIL_EXISTS");
    assert_eq!(error_code("  bad gateway \n"), "bad gateway");
  }

  #[test]
  fn test_expiry_parsing() {
    let before = Utc::now();
    let at = expiry("3600").unwrap();
    assert!(at >= before + Duration::seconds(3600));
    assert!(expiry("soon").is_err());
  }

  #[test]
  fn test_password_response_parsing() {
    let json = r#"{
      "kind": "identitytoolkit#VerifyPasswordResponse",
      "localId": "uid-1",
      "email": "a@b.c",
      "idToken": "id",
      "refreshToken": "refresh",
      "expiresIn": "3600",
      "registered": true
    }"#;
    let parsed: PasswordResponse = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.local_id, "uid-1");
    assert_eq!(parsed.expires_in, "3600");
  }
}
