//! Output rendering for the chat REPL.
//!
//! Renderers present replies, token readouts, and the model catalog.  Errors go to stderr;
//! everything else goes to the renderer's sink.

use std::io::{self, Stdout, Write};

use crate::telemetry::TelemetrySnapshot;

/// ANSI escape code for dim text (used for token readouts).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the selected model).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Presentation surface for a chat session.
pub trait Renderer {
    /// Print the assistant's reply.
    fn print_reply(&mut self, text: &str);

    /// Print the token readouts of the latest exchange.
    fn print_telemetry(&mut self, telemetry: &TelemetrySnapshot);

    /// Print the model catalog, marking the selection.
    fn print_models(&mut self, models: &[String], selected: Option<&str>);

    /// Print an informational line.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            out: io::stdout(),
            use_color,
        }
    }
}

impl<W: Write> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Consume the renderer, returning its sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Format the token readouts; an absent count reads "n/a", never zero.
pub fn format_telemetry(telemetry: &TelemetrySnapshot) -> String {
    fn count(value: Option<u64>) -> String {
        value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
    }
    format!(
        "[tokens] prompt: {} completion: {} context: {}",
        count(telemetry.prompt_tokens),
        count(telemetry.completion_tokens),
        count(telemetry.context_tokens),
    )
}

impl<W: Write> Renderer for PlainTextRenderer<W> {
    fn print_reply(&mut self, text: &str) {
        self.write_line(text.trim_end());
    }

    fn print_telemetry(&mut self, telemetry: &TelemetrySnapshot) {
        let line = self.styled(ANSI_DIM, &format_telemetry(telemetry));
        self.write_line(&line);
    }

    fn print_models(&mut self, models: &[String], selected: Option<&str>) {
        if models.is_empty() {
            self.write_line("No models available.");
            return;
        }
        for model in models {
            let line = if Some(model.as_str()) == selected {
                self.styled(ANSI_CYAN, &format!("* {model}"))
            } else {
                format!("  {model}")
            };
            self.write_line(&line);
        }
    }

    fn print_info(&mut self, info: &str) {
        self.write_line(info);
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("{}", self.styled(ANSI_RED, &format!("Error: {error}")));
    }
}
