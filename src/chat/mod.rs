//! Interactive front end for a lochat [`Session`](crate::Session).
//!
//! - [`config`]: CLI argument parsing and layered configuration
//! - [`commands`]: Slash command parsing
//! - [`interrupt`]: Ctrl+C accounting while a network call is outstanding

mod commands;
mod config;
mod interrupt;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use interrupt::{
    EXIT_INTERRUPTED, INTERRUPT_NOTICE, InFlightGuard, InterruptAction, InterruptState,
};
