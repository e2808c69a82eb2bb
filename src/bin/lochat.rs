//! Interactive chat against a local inference server.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the server on the default port, using the first model it offers
//! lochat
//!
//! # Pick a model and a system prompt
//! lochat --model llama3.1:8b --system "You are terse"
//!
//! # Settings from a YAML file, overridden on the command line
//! lochat --config lochat.yaml --temperature 0.2
//! ```
//!
//! Set `LOCHAT_LOG=debug` to see each exchange on stderr.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use lochat::chat::{
    ChatArgs, ChatCommand, ChatConfig, EXIT_INTERRUPTED, INTERRUPT_NOTICE, InterruptAction,
    InterruptState, PlainTextRenderer, Renderer, help_text, parse_command,
};
use lochat::{CatalogResponse, ChatRequest, ChatResponse, ExchangeLogger, InferenceClient, Session};

/// Logs every exchange as JSON through `tracing`.
struct TracingExchangeLogger;

impl ExchangeLogger for TracingExchangeLogger {
    fn log_request(&self, request: &ChatRequest) {
        if let Ok(json) = serde_json::to_string(request) {
            tracing::debug!(target: "lochat::exchange", request = %json);
        }
    }

    fn log_response(&self, response: &ChatResponse) {
        if let Ok(json) = serde_json::to_string(response) {
            tracing::debug!(target: "lochat::exchange", response = %json);
        }
    }

    fn log_catalog(&self, catalog: &CatalogResponse) {
        tracing::debug!(target: "lochat::exchange", models = ?catalog.names());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("LOCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("lochat [OPTIONS]");
    let config = ChatConfig::resolve(args)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let client = InferenceClient::with_options(Some(config.base_url.clone()), config.timeout())?
        .with_logger(Arc::new(TracingExchangeLogger));
    let session = Session::with_settings(client, config.request_settings());
    let mut rl = DefaultEditor::new()?;

    let interrupts = Arc::new(InterruptState::new());
    {
        let interrupts = Arc::clone(&interrupts);
        ctrlc::set_handler(move || match interrupts.signal() {
            InterruptAction::Ignore => {}
            InterruptAction::Warn => eprintln!("\n{INTERRUPT_NOTICE}"),
            InterruptAction::Exit => std::process::exit(EXIT_INTERRUPTED),
        })?;
    }

    println!("lochat ({})", session.backend().base_url());
    if let Some(model) = config.model.as_deref() {
        session.select_model(model)?;
    }
    match interrupts.run(session.refresh_catalog()).await {
        Ok(models) => renderer.print_models(&models, session.model().as_deref()),
        Err(err) => renderer.print_error(&err.to_string()),
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    if !dispatch(cmd, &session, &config, &interrupts, &mut renderer).await {
                        println!("Goodbye!");
                        break;
                    }
                    continue;
                }

                match interrupts.run(session.submit(line)).await {
                    Ok(exchange) => {
                        match exchange.reply.as_deref() {
                            Some(reply) => renderer.print_reply(reply),
                            None => renderer.print_info("(no reply)"),
                        }
                        renderer.print_telemetry(&exchange.telemetry);
                    }
                    Err(err) => renderer.print_error(&err.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

/// Apply one slash command.  Returns false when the REPL should exit.
async fn dispatch(
    cmd: ChatCommand,
    session: &Session,
    config: &ChatConfig,
    interrupts: &InterruptState,
    renderer: &mut PlainTextRenderer,
) -> bool {
    match cmd {
        ChatCommand::Quit => return false,
        ChatCommand::Reset => match session.reset() {
            Ok(()) => renderer.print_info("Conversation cleared."),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Models => match interrupts.run(session.refresh_catalog()).await {
            Ok(models) => renderer.print_models(&models, session.model().as_deref()),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Model(name) => match session.select_model(&name) {
            Ok(()) => {
                renderer.print_info(&format!("Model changed to: {name}"));
                if !session.catalog().is_empty() && !session.catalog().contains(&name) {
                    renderer.print_info("(not in the last fetched catalog)");
                }
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::System(prompt) => {
            session.set_system_prompt(prompt.clone());
            match prompt {
                Some(p) => renderer.print_info(&format!("System prompt set to: {p}")),
                None => renderer.print_info("System prompt cleared."),
            }
        }
        ChatCommand::Temperature(value) => {
            session.update_options(|o| o.temperature = Some(value));
            renderer.print_info(&format!("temperature set to {value:.2}"));
        }
        ChatCommand::ClearTemperature => {
            session.update_options(|o| o.temperature = None);
            renderer.print_info("temperature reset to model default");
        }
        ChatCommand::TopP(value) => {
            session.update_options(|o| o.top_p = Some(value));
            renderer.print_info(&format!("top_p set to {value:.2}"));
        }
        ChatCommand::ClearTopP => {
            session.update_options(|o| o.top_p = None);
            renderer.print_info("top_p reset to model default");
        }
        ChatCommand::TopK(value) => {
            session.update_options(|o| o.top_k = Some(value));
            renderer.print_info(&format!("top_k set to {value}"));
        }
        ChatCommand::ClearTopK => {
            session.update_options(|o| o.top_k = None);
            renderer.print_info("top_k reset to model default");
        }
        ChatCommand::NumCtx(value) => {
            session.update_options(|o| o.num_ctx = Some(value));
            renderer.print_info(&format!("num_ctx set to {value}"));
        }
        ChatCommand::ClearNumCtx => {
            session.update_options(|o| o.num_ctx = None);
            renderer.print_info("num_ctx reset to model default");
        }
        ChatCommand::Stats => print_stats(session),
        ChatCommand::ShowConfig => print_config(session, config),
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {line}");
            }
        }
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn print_stats(session: &Session) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!(
        "      Model: {}",
        stats.model.as_deref().unwrap_or("(none selected)")
    );
    println!("      Turns: {}", stats.turn_count);
    println!("      Models in catalog: {}", stats.catalog_size);
    println!(
        "      Rolling context: {}",
        if stats.has_context { "held" } else { "none" }
    );
    println!(
        "      Exchanges: {} ok / {} failed",
        stats.exchanges, stats.failures
    );
    println!(
        "      Last turn tokens: {}",
        lochat::render::format_telemetry(&stats.telemetry)
    );
}

fn print_config(session: &Session, config: &ChatConfig) {
    let options = session.options();
    println!("    Current Configuration:");
    println!("      Server: {}", session.backend().base_url());
    println!(
        "      Model: {}",
        session.model().as_deref().unwrap_or("(none selected)")
    );
    match config.timeout_secs {
        Some(secs) => println!("      Timeout: {secs}s"),
        None => println!("      Timeout: (none)"),
    }
    println!("      Temperature: {}", describe(options.temperature));
    println!("      Top-p: {}", describe(options.top_p));
    println!("      Top-k: {}", describe(options.top_k));
    println!("      Context window: {}", describe(options.num_ctx));
    match session.system_prompt() {
        Some(prompt) => println!("      System prompt: {prompt}"),
        None => println!("      System prompt: (none)"),
    }
}

fn describe<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "default".to_string())
}
