//! Public types for the metrics API
use serde::{Deserialize, Serialize};

use crate::eval::{LeaderboardRow, QueryRecord};

/// Query parameters for the leaderboard
#[derive(Deserialize)]
pub struct LeaderboardQuery {
    // Only include these apps e.g. "?app=standard&app=filtered"
    pub app: Option<Vec<String>>,
}

/// Aggregate metrics per pipeline variant
#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub apps: Vec<LeaderboardRow>,
}

/// A stored record with its trace and feedback rendered as text
#[derive(Serialize)]
pub struct RecordResponse {
    pub record: QueryRecord,
    pub trace: String,
    pub feedback: String,
}
