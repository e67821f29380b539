//! # Formgate Common
//!
//! Shared types, traits, and utilities used across Formgate components.
//!
//! ## Modules
//! - `types` - Core data structures (FormSchema, Submission, VerificationResult, etc.)
//! - `error` - The gateway error taxonomy
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::GatewayError;
pub use types::*;
