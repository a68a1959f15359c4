pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AnalyzeArgs, CliArgs, Commands, ConfigArgs, ReportFormatArg};
pub use output::{OutputFormat, OutputFormatter};
