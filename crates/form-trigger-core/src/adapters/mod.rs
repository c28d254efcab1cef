//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the credential store interface.

pub mod memory_credentials;

pub use memory_credentials::InMemoryCredentialStore;
