//! Progress reporting for analysis runs

mod handler;
mod logging;

pub use handler::{CollectingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use logging::LoggingHandler;
