pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, ModelsCommand, SetupArgs};
pub use output::{OutputFormat, OutputFormatter};
