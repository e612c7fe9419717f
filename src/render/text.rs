use std::io::{self, Write};

use super::{FeedbackRenderer, LeaderboardRenderer, TraceRenderer};
use crate::eval::{LeaderboardRow, QueryRecord};
use crate::session::Session;

const MAX_CONTEXT_CHARS: usize = 120;

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut out: String = flat.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Plain text output for a terminal.
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Dump of the session for debug mode
    pub fn render_session_state(&mut self, session: &Session) -> io::Result<()> {
        writeln!(self.out, "Session state ({})", session.id)?;
        match session.configuration() {
            Some(config) => {
                writeln!(
                    self.out,
                    "  service: {}",
                    config.selected_search_service.as_deref().unwrap_or("<none>")
                )?;
                writeln!(self.out, "  model: {}", config.model_name)?;
                writeln!(self.out, "  chunks: {}", config.num_retrieved_chunks)?;
                writeln!(self.out, "  history messages: {}", config.num_chat_messages)?;
                writeln!(self.out, "  use chat history: {}", config.use_chat_history)?;
                writeln!(self.out, "  debug: {}", config.debug)?;
            }
            None => writeln!(self.out, "  configuration: <unset>")?,
        }
        writeln!(self.out, "  use filters: {}", session.use_filters())?;
        writeln!(self.out, "  messages: {}", session.transcript().len())?;
        Ok(())
    }
}

impl<W: Write> TraceRenderer for TextRenderer<W> {
    fn render_trace(&mut self, record: &QueryRecord) -> io::Result<()> {
        writeln!(
            self.out,
            "Trace {} ({} pipeline, {} ms)",
            record.id, record.app_id, record.latency_ms
        )?;
        for span in &record.spans {
            writeln!(
                self.out,
                "  {:<10} {:>6} ms  {}",
                span.name, span.duration_ms, span.detail
            )?;
        }
        if record.contexts.is_empty() {
            writeln!(self.out, "  no context retrieved")?;
        }
        for (i, ctx) in record.contexts.iter().enumerate() {
            let status = if ctx.kept { "kept" } else { "dropped" };
            let score = ctx
                .score
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| String::from("-"));
            writeln!(
                self.out,
                "  [{}] {:<7} {:>4}  {}",
                i + 1,
                status,
                score,
                truncate(&ctx.text, MAX_CONTEXT_CHARS)
            )?;
        }
        if let Some(usage) = record.usage {
            writeln!(self.out, "  tokens: {}", usage.total_tokens)?;
        }
        Ok(())
    }
}

impl<W: Write> FeedbackRenderer for TextRenderer<W> {
    fn render_feedback(&mut self, record: &QueryRecord) -> io::Result<()> {
        if record.feedback.is_empty() {
            return writeln!(self.out, "Feedback: none recorded");
        }
        let scores: Vec<String> = record
            .feedback
            .iter()
            .map(|f| format!("{}={:.2}", f.name, f.score))
            .collect();
        writeln!(self.out, "Feedback: {}", scores.join(", "))
    }
}

impl<W: Write> LeaderboardRenderer for TextRenderer<W> {
    fn render_leaderboard(&mut self, rows: &[LeaderboardRow]) -> io::Result<()> {
        writeln!(self.out, "Aggregate Evaluation Metrics")?;
        if rows.is_empty() {
            return writeln!(self.out, "No records yet.");
        }
        writeln!(
            self.out,
            "{:<10} {:>8} {:>16} {:>12}  feedback",
            "app", "records", "avg latency ms", "tokens"
        )?;
        for row in rows {
            let feedback = if row.feedback.is_empty() {
                String::from("-")
            } else {
                row.feedback
                    .iter()
                    .map(|(name, score)| format!("{}={:.2}", name, score))
                    .collect::<Vec<String>>()
                    .join(", ")
            };
            writeln!(
                self.out,
                "{:<10} {:>8} {:>16.1} {:>12}  {}",
                row.app_id, row.records, row.avg_latency_ms, row.total_tokens, feedback
            )?;
        }
        Ok(())
    }
}
