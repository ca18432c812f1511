pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod infra;
pub mod limiter;
pub mod middleware;
pub mod router;
pub mod state;
pub mod tokens;
pub mod usecase;
