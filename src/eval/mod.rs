//! The evaluation session: storage and aggregation of query records.
mod db;
mod models;
pub use db::EvalSession;
pub use models::*;
