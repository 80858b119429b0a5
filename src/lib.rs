pub mod collaborators;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway_health;
pub mod health;
pub mod metrics;
pub mod proxy;
pub mod server;
