pub mod bootstrap;
pub mod config;
pub mod observability;
pub mod server;

pub use config::{AppConfig, BootstrapClient, BootstrapConfig, BootstrapUser, ServerConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{ServerBuilder, TesseraServer, build_app, spawn_sweeper};
