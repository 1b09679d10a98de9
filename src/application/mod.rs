//! Application layer - use cases, reports and the CLI

pub mod commands;
pub mod report;
pub mod services;

pub use commands::{Cli, CommandExecutor, Commands};
pub use services::{AnalysisService, CollectorService};
