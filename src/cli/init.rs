use anyhow::Result;

use crate::core::AppConfig;
use crate::eval::EvalSession;

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Initializing evaluation db at {}...", config.eval_db_path);
    let eval = EvalSession::open(&config.eval_db_path, false).await?;
    let count = eval.record_count().await?;
    println!("Finished initializing db ({} existing records)", count);
    Ok(())
}
