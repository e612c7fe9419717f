mod config;
pub use config::{AppConfig, StartupMode};
pub mod db;
pub mod logging;
