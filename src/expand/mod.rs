//! Path expansion for file arguments.
//!
//! Turns a shell-style glob, a literal file path, or a directory into a
//! flattened list of regular files plus the *root* prefix that the remap
//! engine later strips when rewriting destinations.
//!
//! # Root semantics
//!
//! The root depends on how the pattern resolved:
//!
//! - the only match is a directory → that directory, with a trailing `/`
//! - exactly one match and it equals the pattern verbatim (no glob
//!   metacharacters took effect) → the literal path itself
//! - anything else → the parent directory of the first match, with a
//!   trailing `/` (or the empty string when the parent is the current
//!   directory, so bare file names remap cleanly)
//!
//! Matches are processed in the sorted order the `glob` crate returns them;
//! directories are flattened depth-first with entries sorted by name at each
//! level, so repeated runs over the same tree produce identical manifests.
//! Symlinked directories are followed like any other directory.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::core::PakrError;

/// Result of expanding one file argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Common prefix later replaced during destination remapping.
    pub root: String,
    /// Every regular file the pattern resolved to, in deterministic order.
    /// Directories never appear here.
    pub files: Vec<String>,
}

/// Expand a glob pattern, literal path, or directory into `(root, files)`.
///
/// Pure filesystem read; no side effects. Fails with
/// [`PakrError::InvalidPattern`] on glob syntax errors and
/// [`PakrError::Expansion`] when the filesystem cannot be read.
///
/// A pattern with no matches is not an error: it yields an empty root and an
/// empty file list, and the caller simply adds nothing.
pub fn expand(pattern: &str) -> Result<Expansion, PakrError> {
    // "conf/" and "conf" name the same directory; the trailing separator is
    // normalized back onto the root after matching.
    let trimmed = if pattern.len() > 1 {
        pattern.strip_suffix('/').unwrap_or(pattern)
    } else {
        pattern
    };

    let paths = glob::glob(trimmed).map_err(|e| PakrError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let matches: Vec<String> = paths
        .map(|entry| {
            entry
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|e| PakrError::Expansion {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect::<Result<_, _>>()?;

    let root = match matches.first() {
        None => String::new(),
        Some(first) => {
            if Path::new(first).is_dir() {
                with_trailing_slash(first)
            } else if matches.len() == 1 && first == trimmed {
                // literal path, no glob expansion occurred
                first.clone()
            } else {
                parent_prefix(first)
            }
        }
    };

    let mut files = Vec::new();
    for matched in &matches {
        if Path::new(matched).is_dir() {
            flatten_dir(matched, &mut files)?;
        } else {
            files.push(matched.clone());
        }
    }

    debug!(pattern, root, count = files.len(), "expanded file argument");
    Ok(Expansion { root, files })
}

/// Recursively collect every regular file under `dir`, depth-first with
/// per-directory name ordering. Follows symlinked directories.
fn flatten_dir(dir: &str, files: &mut Vec<String>) -> Result<(), PakrError> {
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| PakrError::Expansion {
            pattern: dir.to_string(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.path().to_string_lossy().into_owned());
        }
    }
    Ok(())
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Parent directory of `path` as a remap prefix. Empty for bare file names,
/// so stripping the root from a match is always a plain prefix strip.
fn parent_prefix(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() && parent != Path::new(".") => {
            with_trailing_slash(&parent.to_string_lossy())
        }
        _ => String::new(),
    }
}
