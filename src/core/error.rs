//! Error handling for pakr.
//!
//! Every failure mode in the build pipeline maps to one variant of
//! [`PakrError`], so callers can match on exactly what went wrong while the
//! CLI layer prints a single consistent message. The design follows two rules:
//!
//! 1. **Strongly-typed errors**: each stage of the pipeline (expansion,
//!    remapping, role marking, validation, serialization) has its own
//!    variants with the context a user needs to fix the invocation.
//! 2. **Fail fast**: no variant is ever recovered or retried internally;
//!    the first error aborts the whole build and surfaces verbatim.
//!
//! [`user_friendly_error`] converts any [`anyhow::Error`] coming out of the
//! pipeline into an [`ErrorContext`] that prints a colored message plus an
//! actionable suggestion where one exists.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for pakr operations.
///
/// Variants are grouped by pipeline stage:
///
/// - **Expansion**: [`InvalidPattern`], [`Expansion`]
/// - **Manifest assembly**: [`InvalidMapping`], [`DuplicateDestination`],
///   [`SymlinkDestinationExists`], [`EmptyManifest`]
/// - **Metadata**: [`Validation`]
/// - **Output**: [`OutputExists`], [`Serialization`], [`IoError`]
///
/// [`InvalidPattern`]: PakrError::InvalidPattern
/// [`Expansion`]: PakrError::Expansion
/// [`InvalidMapping`]: PakrError::InvalidMapping
/// [`DuplicateDestination`]: PakrError::DuplicateDestination
/// [`SymlinkDestinationExists`]: PakrError::SymlinkDestinationExists
/// [`EmptyManifest`]: PakrError::EmptyManifest
/// [`Validation`]: PakrError::Validation
/// [`OutputExists`]: PakrError::OutputExists
/// [`Serialization`]: PakrError::Serialization
/// [`IoError`]: PakrError::IoError
#[derive(Error, Debug)]
pub enum PakrError {
    /// A glob pattern could not be compiled.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as given on the command line
        pattern: String,
        /// The glob crate's description of the syntax error
        reason: String,
    },

    /// Pattern expansion failed while reading the filesystem, or produced a
    /// file outside the computed expansion root.
    #[error("failed to expand '{pattern}': {reason}")]
    Expansion {
        /// The pattern or root being expanded
        pattern: String,
        /// Root cause, propagated verbatim
        reason: String,
    },

    /// A positional or symlink argument does not parse as `SOURCE[=DEST]`.
    ///
    /// Produced when an argument contains more than one `=`, or when a
    /// symlink argument does not contain exactly one.
    #[error("file mapping is invalid: {value}")]
    InvalidMapping {
        /// The offending argument
        value: String,
    },

    /// Two file mappings resolved to the same destination path.
    #[error("file mapping produces duplicate destination: {destination}")]
    DuplicateDestination {
        /// The destination claimed twice
        destination: String,
    },

    /// A symlink's link path is already taken by another manifest entry.
    #[error("symlink tries to overwrite existing destination: {destination}")]
    SymlinkDestinationExists {
        /// The contested link path
        destination: String,
    },

    /// The manifest holds no entries after expansion, remapping, and symlink
    /// injection. Rejected before any serializer work begins.
    #[error("file map is empty, package would have no contents")]
    EmptyManifest,

    /// Package metadata failed validation (missing name, version, ...).
    #[error("package metadata is invalid: {reason}")]
    Validation {
        /// What is missing or malformed
        reason: String,
    },

    /// The target archive already exists and `--force` was not given.
    #[error("output file already exists: {path}")]
    OutputExists {
        /// The path that would have been overwritten
        path: String,
    },

    /// The format serializer failed mid-write. The partial output file has
    /// already been removed by the time this surfaces.
    #[error("failed to write {format} package: {reason}")]
    Serialization {
        /// Output format name ("rpm", "deb", "apk")
        format: String,
        /// Root cause chain, flattened
        reason: String,
    },

    /// Wrapped standard I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// User-facing error wrapper with an optional suggestion.
///
/// Produced by [`user_friendly_error`] and displayed by `main` right before
/// the process exits non-zero.
#[derive(Debug)]
pub struct ErrorContext {
    /// The error message chain
    pub message: String,
    /// An actionable hint, when one is known for the error kind
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Print the error (and suggestion, if any) to stderr with colors.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.message);
        if let Some(suggestion) = &self.suggestion {
            eprintln!("{} {}", "hint:".yellow().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

/// Convert any pipeline error into a user-friendly [`ErrorContext`].
///
/// Downcasts to [`PakrError`] where possible to attach a suggestion for the
/// common mistakes; everything else passes through with its context chain
/// flattened into a single line.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = error.downcast_ref::<PakrError>().and_then(|e| match e {
        PakrError::InvalidMapping { .. } => {
            Some("file arguments take the form SOURCE or SOURCE=DEST".to_string())
        }
        PakrError::OutputExists { .. } => {
            Some("pass --force to overwrite the existing file".to_string())
        }
        PakrError::EmptyManifest => {
            Some("pass at least one FILE[=DEST] argument that matches existing files".to_string())
        }
        PakrError::Validation { .. } => {
            Some("--name and --version are required for every package".to_string())
        }
        _ => None,
    });

    ErrorContext {
        message: format!("{error:#}"),
        suggestion,
    }
}
