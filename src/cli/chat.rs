use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::core::AppConfig;
use crate::render::{FeedbackRenderer, LeaderboardRenderer, TextRenderer, TraceRenderer};
use crate::session::{ConfigurationUpdate, ModelName, Session, SessionController};

const HELP: &str = "\
Commands:
  /clear                 Clear the conversation
  /filters on|off        Use the context filter guardrail
  /service <name>        Select a search service
  /model <name>          Select a model
  /chunks <n>            Number of retrieved chunks (1-10)
  /history <n>           Number of chat messages sent as history (1-10)
  /use-history on|off    Send chat history with each prompt
  /debug on|off          Print session state after each turn
  /services              List search services
  /metrics               Show aggregate evaluation metrics
  /trace                 Show the trace of the last answer
  /help                  Show this message
Anything else is sent as a prompt.";

#[derive(Debug, PartialEq)]
pub enum ReplCommand {
    Clear,
    Filters(bool),
    Update(ConfigurationUpdate),
    Services,
    Metrics,
    Trace,
    Help,
    Prompt(String),
}

fn parse_switch(arg: &str) -> Result<bool, String> {
    match arg {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("Expected \"on\" or \"off\", got \"{}\"", other)),
    }
}

fn parse_count(arg: &str) -> Result<i64, String> {
    arg.parse::<i64>()
        .map_err(|_| format!("Expected a number, got \"{}\"", arg))
}

/// Parse one line of REPL input. Lines not starting with `/` are
/// prompts.
pub fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Ok(ReplCommand::Prompt(line.to_string()));
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    let cmd = match cmd {
        "/clear" => ReplCommand::Clear,
        "/filters" => ReplCommand::Filters(parse_switch(arg)?),
        "/service" if arg.is_empty() => return Err(String::from("Usage: /service <name>")),
        "/service" => ReplCommand::Update(ConfigurationUpdate {
            selected_search_service: Some(arg.to_string()),
            ..Default::default()
        }),
        "/model" => ReplCommand::Update(ConfigurationUpdate {
            model_name: Some(arg.parse::<ModelName>()?),
            ..Default::default()
        }),
        "/chunks" => ReplCommand::Update(ConfigurationUpdate {
            num_retrieved_chunks: Some(parse_count(arg)?),
            ..Default::default()
        }),
        "/history" => ReplCommand::Update(ConfigurationUpdate {
            num_chat_messages: Some(parse_count(arg)?),
            ..Default::default()
        }),
        "/use-history" => ReplCommand::Update(ConfigurationUpdate {
            use_chat_history: Some(parse_switch(arg)?),
            ..Default::default()
        }),
        "/debug" => ReplCommand::Update(ConfigurationUpdate {
            debug: Some(parse_switch(arg)?),
            ..Default::default()
        }),
        "/services" => ReplCommand::Services,
        "/metrics" => ReplCommand::Metrics,
        "/trace" => ReplCommand::Trace,
        "/help" => ReplCommand::Help,
        other => return Err(format!("Unknown command \"{}\". Try /help", other)),
    };
    Ok(cmd)
}

async fn handle<W: Write>(
    controller: &SessionController,
    session: &mut Session,
    use_filters: &mut bool,
    cmd: ReplCommand,
    out: &mut TextRenderer<W>,
) -> Result<()> {
    match cmd {
        ReplCommand::Clear => {
            controller.clear_conversation(session);
            controller.initialize_session(session).await;
            if let Some(greeting) = session.transcript().last() {
                println!("{}", greeting.text);
            }
        }
        ReplCommand::Filters(on) => {
            *use_filters = on;
            println!("Context filter {}", if on { "on" } else { "off" });
        }
        ReplCommand::Update(update) => {
            let config = controller.update_configuration(session, update);
            println!(
                "service={} model={} chunks={} history={} use_history={} debug={}",
                config.selected_search_service.as_deref().unwrap_or("<none>"),
                config.model_name,
                config.num_retrieved_chunks,
                config.num_chat_messages,
                config.use_chat_history,
                config.debug
            );
        }
        ReplCommand::Services => {
            let snapshot = controller.catalog().snapshot().await;
            if let Some(warning) = &snapshot.warning {
                println!("Warning: {}", warning);
            }
            for service in &snapshot.services {
                println!("{} (column: {})", service.name, service.search_column);
            }
        }
        ReplCommand::Metrics => {
            let rows = controller.eval().leaderboard().await?;
            out.render_leaderboard(&rows)?;
        }
        ReplCommand::Trace => match session.last_record() {
            Some(record) => {
                out.render_trace(record)?;
                out.render_feedback(record)?;
            }
            None => println!("No answer yet."),
        },
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Prompt(text) => {
            match controller.submit_prompt(session, &text, *use_filters).await {
                Ok(turn) => {
                    println!("{}", turn.answer);
                    for warning in &turn.warnings {
                        println!("Warning: {}", warning);
                    }
                    out.render_feedback(&turn.record)?;
                }
                Err(e) => println!("Error ({}): {}", e.kind(), e),
            }
            if session.configuration().is_some_and(|c| c.debug) {
                out.render_session_state(session)?;
            }
        }
    }

    Ok(())
}

/// Run one line of input. Returns the message to show when it
/// failed. Failures never end the session.
pub async fn handle_line<W: Write>(
    controller: &SessionController,
    session: &mut Session,
    use_filters: &mut bool,
    line: &str,
    out: &mut TextRenderer<W>,
) -> Option<String> {
    match parse_command(line) {
        Ok(cmd) => handle(controller, session, use_filters, cmd, out)
            .await
            .err()
            .map(|e| format!("Error: {:#}", e)),
        Err(msg) => Some(msg),
    }
}

pub async fn run(config: AppConfig, use_filters: bool) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let controller = SessionController::from_config(&config).await?;
    let mut session = Session::new(&uuid::Uuid::new_v4().to_string());
    let mut use_filters = use_filters;
    let mut out = TextRenderer::new(io::stdout());

    controller.initialize_session(&mut session).await;
    if let Some(warning) = controller.catalog().snapshot().await.warning {
        println!("Warning: {}", warning);
    }
    if let Some(greeting) = session.transcript().last() {
        println!("{}", greeting.text);
    }

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                if let Some(msg) =
                    handle_line(&controller, &mut session, &mut use_filters, &line, &mut out).await
                {
                    println!("{}", msg);
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
