//! Human readable views of query records and aggregate metrics.
use std::io;

use crate::eval::{LeaderboardRow, QueryRecord};

mod text;
pub use text::TextRenderer;

pub trait TraceRenderer {
    fn render_trace(&mut self, record: &QueryRecord) -> io::Result<()>;
}

pub trait FeedbackRenderer {
    fn render_feedback(&mut self, record: &QueryRecord) -> io::Result<()>;
}

pub trait LeaderboardRenderer {
    fn render_leaderboard(&mut self, rows: &[LeaderboardRow]) -> io::Result<()>;
}
