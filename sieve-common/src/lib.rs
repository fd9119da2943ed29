//! # Prompt Sieve Common Library
//!
//! Shared code for the prompt sieve service and its clients:
//! - Wire event types (SieveEvent enum)
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::SieveEvent;
