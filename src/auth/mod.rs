//! Email/password authentication against Firebase and the persisted session.

mod client;
mod session;

pub use client::AuthClient;
pub use session::{Session, SessionStore};
