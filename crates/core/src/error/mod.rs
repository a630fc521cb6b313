//! # Error Handling Framework
//!
//! This module provides a comprehensive error handling system for the gateway.
//! It implements structured error management with:
//!
//! ## Core Features
//!
//! - **Structured Error Types**: Categorized error codes for consistent handling
//! - **Rich Context**: Request context and error metadata for debugging
//! - **Severity Classification**: Error categorization for appropriate responses
//! - **Sanitized Responses**: Production-safe error messages at the API boundary
//!
//! ## Error Categories
//!
//! - **Validation**: Input validation and request-shape violations
//! - **Security**: Prompt-injection blocks and policy denials
//! - **Storage**: Persistence layer errors and constraint violations
//! - **Network**: Upstream provider communication failures
//! - **Configuration**: System setup and configuration issues
//! - **System**: Unexpected internal errors requiring investigation
//!
//! ## Context Tracking
//!
//! - **Request Context**: HTTP request tracking with correlation IDs
//! - **Error Context**: Structured error metadata and stack traces
//!
//! ## Usage Examples
//!
//! ```rust
//! use gateway_core::error::{Error, ErrorCode, Result};
//!
//! fn validate_message(content: &str) -> Result<()> {
//!     if content.is_empty() {
//!         return Err(Error::validation("message content must not be empty"));
//!     }
//!     Ok(())
//! }
//!
//! async fn process_request() -> Result<()> {
//!     validate_message("hi")
//!         .map_err(|e| e.add_trace("request validation failed"))?;
//!     Ok(())
//! }
//! ```

pub mod codes;
pub mod context;
pub mod framework;

pub use codes::ErrorCode;
pub use context::{ErrorContext, RequestContext};
pub use framework::{Error, ErrorCategory, ErrorSeverity, Result};