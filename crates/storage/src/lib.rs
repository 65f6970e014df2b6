//! Storage layer for the finance app
//!
//! This crate provides the device key-value store and the credential
//! store that persists the access token across restarts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod credentials;
pub mod kv;

pub use credentials::{CredentialError, CredentialStore, KvCredentialStore, ACCESS_TOKEN_KEY};
pub use kv::{KvConfig, KvError, KvStore};
