//! Attendance tracker CLI library.
//!
//! This crate provides the `attend` command line and the HTTP API used by
//! scanner clients.

mod cli;
pub mod commands;
mod config;
pub mod server;

pub use cli::{Cli, Commands};
pub use config::Config;
