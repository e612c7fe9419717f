//! Per-session chat state and the controller that drives each turn.
mod controller;
mod error;
mod models;

pub use controller::{SessionController, Turn};
pub use error::SessionError;
pub use models::*;
