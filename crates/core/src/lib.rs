pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, ErrorCode, ErrorContext, Result};

// Re-export commonly used types from dependencies
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
