pub mod certificates;
pub mod commands;
pub mod error;
pub mod invocation_context;
pub mod login;
pub mod lookups;
pub mod output;
pub mod public;

pub mod cmd {
    pub use super::commands::Cli;
}
