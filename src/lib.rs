//! signal-bang - bang-command bridge for signal-cli's JSON event loop

pub mod command;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod processor;
pub mod session;
pub mod subprocess;
pub mod supervisor;
pub mod telemetry;
pub mod wire;
