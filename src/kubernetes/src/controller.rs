pub mod config;
pub mod error;
pub mod metrics;
pub mod reconciler;
pub mod server;
