//! Core types shared across the pipeline: the error taxonomy and its
//! user-facing presentation.

pub mod error;

pub use error::{ErrorContext, PakrError, user_friendly_error};
