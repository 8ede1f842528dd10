mod app;
mod auth;
mod cli;
mod commands;
mod config;
mod drill;
mod logging;
mod offline;
mod store;
mod vocab;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::auth::{AuthClient, Session, SessionStore};
use crate::cli::{AccountCommand, Args, Command, DataCommand, OfflineCommand};
use crate::config::{Backend, Config};
use crate::offline::{
  AssetRequest, CacheStorage, ClientRegistry, HttpNetwork, InstallOutcome, Intercept, Network,
  NoopStorage, OfflineWorker, SqliteStorage, WorkerState,
};
use crate::store::{FirestoreStore, SqliteStore};
use crate::vocab::UserId;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let mut out = std::io::stdout().lock();
  match args.command {
    Command::Account(command) => run_account(&config, command, &mut out).await,
    Command::Data(command) => run_data(&config, command, &mut out).await,
    Command::Offline(command) => run_offline(&config, command, &mut out).await,
  }
}

/// Stored session, refreshed when its token has expired.
async fn active_session(config: &Config) -> Result<Session> {
  let sessions = SessionStore::new(&config.data_dir()?);
  let session = sessions
    .load()?
    .ok_or_else(|| eyre!("Not signed in. Run `wordcards login <email> -p <password>` first."))?;

  if !session.is_expired() {
    return Ok(session);
  }

  info!("Session expired, refreshing");
  let session = AuthClient::new(&config.firebase)?.refresh(&session).await?;
  sessions.save(&session)?;
  Ok(session)
}

async fn run_account(config: &Config, command: AccountCommand, out: &mut impl Write) -> Result<()> {
  let sessions = SessionStore::new(&config.data_dir()?);

  let session = match command {
    AccountCommand::Register(credentials) => {
      AuthClient::new(&config.firebase)?
        .register(&credentials.email, &credentials.password)
        .await?
    }
    AccountCommand::Login(credentials) => {
      AuthClient::new(&config.firebase)?
        .login(&credentials.email, &credentials.password)
        .await?
    }
    AccountCommand::Logout => {
      if sessions.clear()? {
        writeln!(out, "Signed out")?;
      } else {
        writeln!(out, "Not signed in")?;
      }
      return Ok(());
    }
    AccountCommand::Whoami => {
      match config.backend {
        Backend::Local => writeln!(out, "{} (local)", config.local.user)?,
        Backend::Firestore => {
          let session = active_session(config).await?;
          writeln!(out, "{} ({})", session.email, session.user_id)?;
        }
      }
      return Ok(());
    }
  };

  sessions.save(&session)?;
  writeln!(out, "Signed in as {} ({})", session.email, session.user_id)?;
  Ok(())
}

async fn run_data(config: &Config, command: DataCommand, out: &mut impl Write) -> Result<()> {
  match config.backend {
    Backend::Firestore => {
      let session = active_session(config).await?;
      let store = FirestoreStore::new(&config.firebase, session.id_token)?;
      app::App::new(Arc::new(store), UserId::new(session.user_id))
        .run(command, out)
        .await
    }
    Backend::Local => {
      let store = SqliteStore::open(&config.local_store_path()?)?;
      app::App::new(Arc::new(store), UserId::new(config.local.user.as_str()))
        .run(command, out)
        .await
    }
  }
}

async fn run_offline(config: &Config, command: OfflineCommand, out: &mut impl Write) -> Result<()> {
  let origin = Url::parse(&config.offline.origin)
    .map_err(|e| eyre!("Invalid origin '{}': {}", config.offline.origin, e))?;
  let network = HttpNetwork::new(origin)?;

  if config.offline.enabled {
    let storage = SqliteStorage::open_at(&config.asset_cache_path()?)?;
    drive_worker(config, Arc::new(storage), network, command, out).await
  } else {
    warn!("Offline cache disabled, nothing will be stored");
    drive_worker(config, Arc::new(NoopStorage), network, command, out).await
  }
}

async fn drive_worker<S: CacheStorage>(
  config: &Config,
  storage: Arc<S>,
  network: HttpNetwork,
  command: OfflineCommand,
  out: &mut impl Write,
) -> Result<()> {
  let mut worker = OfflineWorker::new(
    &config.offline,
    storage,
    network.clone(),
    ClientRegistry::new(),
  )?;

  match command {
    OfflineCommand::Install => match worker.install().await? {
      InstallOutcome::Populated(count) => {
        writeln!(out, "Cached {} files in {}", count, worker.version())?
      }
      InstallOutcome::Incomplete(reason) => {
        writeln!(out, "Cache {} left empty: {}", worker.version(), reason)?
      }
    },
    OfflineCommand::Activate => {
      if worker.state() == WorkerState::Parsed {
        worker.install().await?;
      }

      // This process is the only client a CLI run can control.
      let mut client = worker.clients().register();
      let notified = worker.activate().await?.await?;
      writeln!(out, "Activated {} ({} clients notified)", worker.version(), notified)?;
      if let Some(message) = client.try_message() {
        writeln!(out, "Client {} received {}", client.id, serde_json::to_string(&message)?)?;
      }
    }
    OfflineCommand::Fetch { url, method } => {
      let url = worker
        .origin()
        .join(&url)
        .map_err(|e| eyre!("Invalid url '{}': {}", url, e))?;
      let request = AssetRequest { method, url };

      let (response, source) = match worker.handle(&request).await? {
        Intercept::Respond { response, source } => (response, format!("{:?}", source)),
        Intercept::Passthrough => (network.fetch(&request).await?, "Passthrough".to_string()),
      };
      writeln!(
        out,
        "{} {} ({} bytes, {})",
        response.status,
        request.url,
        response.body.len(),
        source.to_lowercase()
      )?;
    }
    OfflineCommand::Status => {
      writeln!(out, "version: {}", worker.version())?;
      writeln!(out, "origin:  {}", worker.origin())?;
      writeln!(out, "files:   {}", config.offline.static_files.len())?;
      writeln!(out, "caches:  {}", worker.cache_names()?.join(", "))?;
    }
  }

  Ok(())
}
