//! CAN bus agent: periodic demo traffic and frame recording on top of a
//! `cl_canbus::CanBus` handle.

pub mod cli;
pub mod config;
pub mod demo;
pub mod record;
pub mod runner;

pub use cli::{Cli, Mode};
pub use config::AgentConfig;
pub use runner::run_mode;
