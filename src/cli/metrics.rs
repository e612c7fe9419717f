use std::io;

use anyhow::Result;

use crate::core::AppConfig;
use crate::eval::EvalSession;
use crate::render::{LeaderboardRenderer, TextRenderer};

pub async fn run(config: &AppConfig) -> Result<()> {
    let eval = EvalSession::open(&config.eval_db_path, false).await?;
    let rows = eval.leaderboard().await?;
    TextRenderer::new(io::stdout()).render_leaderboard(&rows)?;
    Ok(())
}
