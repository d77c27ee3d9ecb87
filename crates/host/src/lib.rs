pub mod block;
pub mod config;
pub mod metrics;
pub mod session;
