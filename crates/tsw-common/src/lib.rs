//! Shared types for the time-series writer.
//!
//! This crate provides the pieces every other crate depends on:
//! - The unified error type with stable codes
//! - Push identifiers used to correlate log events

pub mod error;
pub mod id;

pub use error::{Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use id::PushId;
