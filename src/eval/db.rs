use std::collections::BTreeMap;

use anyhow::{Error, Result};
use tokio_rusqlite::Connection;

use super::models::{LeaderboardRow, QueryRecord};
use crate::core::db::{async_db, initialize_db, reset_db};

/// Process-wide handle through which every `QueryRecord` is stored
/// for later aggregate metrics. Cloning shares the same connection.
#[derive(Clone)]
pub struct EvalSession {
    db: Connection,
}

impl EvalSession {
    /// Open (and migrate) the store at `db_path`. When `reset` is set
    /// all historical records are deleted first.
    pub async fn open(db_path: &str, reset: bool) -> Result<Self, Error> {
        let db = async_db(db_path).await?;
        let session = Self::from_connection(db).await?;
        if reset {
            tracing::info!("Resetting evaluation records in {}", db_path);
            session.reset().await?;
        }
        Ok(session)
    }

    pub async fn from_connection(db: Connection) -> Result<Self, Error> {
        db.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await?;
        Ok(Self { db })
    }

    pub async fn in_memory() -> Result<Self, Error> {
        let db = Connection::open_in_memory().await?;
        Self::from_connection(db).await
    }

    pub async fn reset(&self) -> Result<(), Error> {
        self.db
            .call(|conn| {
                reset_db(conn)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn record(&self, record: &QueryRecord) -> Result<(), Error> {
        let data = serde_json::to_string(record)?;
        let id = record.id.to_string();
        let app_id = record.app_id.to_string();
        let prompt = record.prompt.clone();
        let answer = record.answer.clone();
        let latency_ms = record.latency_ms;
        let total_tokens = record.usage.map(|u| u.total_tokens);
        let timestamp = record.timestamp.to_rfc3339();
        let feedback: Vec<(String, f64)> = record
            .feedback
            .iter()
            .map(|f| (f.name.clone(), f.score))
            .collect();

        self.db
            .call(move |conn| {
                // The record and its feedback are stored together or not at all
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO eval_record (id, app_id, prompt, answer, latency_ms, total_tokens, timestamp, data)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        &id,
                        &app_id,
                        &prompt,
                        &answer,
                        &latency_ms,
                        &total_tokens,
                        &timestamp,
                        &data
                    ],
                )?;
                for (name, score) in &feedback {
                    tx.execute(
                        "INSERT OR REPLACE INTO eval_feedback (record_id, name, score) VALUES (?, ?, ?)",
                        rusqlite::params![&id, name, score],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    pub async fn record_count(&self) -> Result<i64, Error> {
        let count = self
            .db
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM eval_record", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn find_record(&self, id: &str) -> Result<Option<QueryRecord>, Error> {
        let id = id.to_owned();
        let data: Option<String> = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT data FROM eval_record WHERE id = ? LIMIT 1")?;
                let row = stmt
                    .query_map([id], |row| row.get::<_, String>(0))?
                    .filter_map(|r| r.ok())
                    .next();
                Ok(row)
            })
            .await?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Aggregate metrics per app, ordered by app id.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardRow>, Error> {
        let (mut rows, feedback) = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                SELECT app_id,
                COUNT(*) AS records,
                AVG(latency_ms) AS avg_latency_ms,
                COALESCE(SUM(total_tokens), 0) AS total_tokens
                FROM eval_record
                GROUP BY app_id
                ORDER BY app_id
                "#,
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(LeaderboardRow {
                            app_id: row.get(0)?,
                            records: row.get(1)?,
                            avg_latency_ms: row.get(2)?,
                            total_tokens: row.get(3)?,
                            feedback: BTreeMap::new(),
                        })
                    })?
                    .filter_map(|r| r.ok())
                    .collect::<Vec<LeaderboardRow>>();

                let mut stmt = conn.prepare(
                    r#"
                SELECT r.app_id, f.name, AVG(f.score)
                FROM eval_feedback f
                JOIN eval_record r ON r.id = f.record_id
                GROUP BY r.app_id, f.name
                "#,
                )?;
                let feedback = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, f64>(2)?,
                        ))
                    })?
                    .filter_map(|r| r.ok())
                    .collect::<Vec<(String, String, f64)>>();

                Ok((rows, feedback))
            })
            .await?;

        for (app_id, name, score) in feedback {
            if let Some(row) = rows.iter_mut().find(|r| r.app_id == app_id) {
                row.feedback.insert(name, score);
            }
        }

        Ok(rows)
    }
}
