//! Clients (open app pages) that the worker can control and message.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Message posted from the worker to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
  Reload,
}

struct ClientSlot {
  id: u64,
  controlled: bool,
  sender: mpsc::UnboundedSender<ClientMessage>,
}

#[derive(Default)]
struct Registry {
  next_id: u64,
  clients: Vec<ClientSlot>,
}

/// Receiving end held by a registered client.
pub struct ClientHandle {
  pub id: u64,
  receiver: mpsc::UnboundedReceiver<ClientMessage>,
}

impl ClientHandle {
  pub fn try_message(&mut self) -> Option<ClientMessage> {
    self.receiver.try_recv().ok()
  }
}

/// Shared set of clients. Cloning shares the same set.
#[derive(Clone, Default)]
pub struct ClientRegistry {
  inner: Arc<Mutex<Registry>>,
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add an uncontrolled client.
  pub fn register(&self) -> ClientHandle {
    let (sender, receiver) = mpsc::unbounded_channel();
    let mut registry = self.lock();
    let id = registry.next_id;
    registry.next_id += 1;
    registry.clients.push(ClientSlot {
      id,
      controlled: false,
      sender,
    });
    ClientHandle { id, receiver }
  }

  /// Take control of every registered client. Returns how many were claimed.
  pub fn claim(&self) -> usize {
    let mut registry = self.lock();
    registry.clients.retain(|c| !c.sender.is_closed());
    for client in registry.clients.iter_mut() {
      client.controlled = true;
    }
    registry.clients.len()
  }

  /// Send a message to every controlled client. Returns how many received it.
  pub fn post_all(&self, message: &ClientMessage) -> usize {
    let mut registry = self.lock();
    registry.clients.retain(|c| !c.sender.is_closed());

    let mut delivered = 0;
    for client in registry.clients.iter().filter(|c| c.controlled) {
      if client.sender.send(message.clone()).is_ok() {
        delivered += 1;
      } else {
        debug!(client = client.id, "Client went away before message delivery");
      }
    }
    delivered
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reload_message_shape() {
    let json = serde_json::to_value(ClientMessage::Reload).unwrap();
    assert_eq!(json, serde_json::json!({ "action": "reload" }));
  }

  #[test]
  fn test_only_controlled_clients_receive() {
    let registry = ClientRegistry::new();
    let mut early = registry.register();

    assert_eq!(registry.post_all(&ClientMessage::Reload), 0);
    assert!(early.try_message().is_none());

    assert_eq!(registry.claim(), 1);
    let mut late = registry.register();

    assert_eq!(registry.post_all(&ClientMessage::Reload), 1);
    assert_eq!(early.try_message(), Some(ClientMessage::Reload));
    assert!(late.try_message().is_none());
  }

  #[test]
  fn test_dropped_clients_are_pruned() {
    let registry = ClientRegistry::new();
    let kept = registry.register();
    drop(registry.register());

    assert_eq!(registry.claim(), 1);
    assert_eq!(registry.post_all(&ClientMessage::Reload), 1);
    drop(kept);
    assert_eq!(registry.post_all(&ClientMessage::Reload), 0);
  }
}
