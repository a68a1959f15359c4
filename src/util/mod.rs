pub mod json_extract;
pub mod logging;

pub use json_extract::{extract_as, extract_json, ExtractionTier, JsonExtractError};
pub use logging::{init_logging, LoggingConfig};
