//! Data models module
//!
//! - `constants` - Configuration keys and defaults
//! - `config` - Configuration management and command line
//! - `response` - HTTP response envelope
//! - `app_state` - Application state shared across handlers

pub mod app_state;
pub mod config;
pub mod constants;
pub mod response;

pub use app_state::AppState;
pub use config::{Cli, Command, Configuration};
pub use response::{MessageBody, Result};
