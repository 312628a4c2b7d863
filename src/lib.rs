pub mod app_context;
pub mod config;
pub mod database;
pub mod errors;
pub mod gedcom;
pub mod services;
pub mod storage;

#[cfg(feature = "server")]
pub mod server;

pub use app_context::AppContext;
pub use config::AppConfig;
