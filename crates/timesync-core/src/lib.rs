//! Shared service plumbing: config loading, tracing setup, health handler
//! and serialization helpers used by the TimeSync backend services.

pub mod config;
pub mod health;
pub mod serde;
pub mod tracing;

pub use self::config::Config;
pub use self::tracing::init_tracing;
