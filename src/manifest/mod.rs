//! The package manifest: an ordered, conflict-free mapping of destination
//! path to file descriptor.
//!
//! This is the core of pakr. Command-line file arguments flow through four
//! cooperating passes, all of which live here or in [`crate::expand`]:
//!
//! 1. **Path expansion**: globs and directories become concrete file lists
//!    with a computed remap root ([`crate::expand::expand`]).
//! 2. **Remapping**: [`Manifest::add_files`] applies `SOURCE=DEST`
//!    substitution and rejects destination collisions immediately.
//! 3. **Symlink injection**: [`Manifest::add_symlinks`] adds `TARGET=LINK`
//!    entries without touching the filesystem.
//! 4. **Role classification**: [`Manifest::mark_role`] marks destinations
//!    as config or doc files, first assignment wins.
//!
//! The manifest grows monotonically: entries are never removed or replaced,
//! duplicates are rejected at insertion time, and insertion order is
//! preserved so generated archives are reproducible.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, trace};

use crate::core::PakrError;
use crate::expand::expand;

/// Semantic role of a manifest entry, affecting how the serializer encodes
/// it (deb conffiles, rpm `%config(noreplace)` / `%doc` flags, symlinks).
///
/// `Regular` is the default; classification passes only ever upgrade
/// `Regular` entries, which gives first-write-wins semantics without a
/// separate "unset" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Ordinary file, no special treatment.
    #[default]
    Regular,
    /// Configuration file, preserved on upgrade.
    Config,
    /// Documentation file.
    Doc,
    /// Symbolic link; `source` holds the link target.
    Symlink,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Regular => "regular",
            Role::Config => "config",
            Role::Doc => "doc",
            Role::Symlink => "symlink",
        })
    }
}

/// One entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Filesystem path of the content, or the link target for symlinks.
    /// Symlink targets are not required to exist.
    pub source: String,
    /// Absolute installed path inside the package. Unique per manifest.
    pub destination: String,
    /// Semantic role.
    pub role: Role,
}

/// Ordered collection of [`FileEntry`] with a destination index.
///
/// Owned exclusively by the builder for one command invocation and handed to
/// the serializer by shared reference once assembly is complete.
#[derive(Debug, Default)]
pub struct Manifest {
    entries: Vec<FileEntry>,
    by_destination: HashMap<String, usize>,
}

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by destination path.
    #[must_use]
    pub fn get(&self, destination: &str) -> Option<&FileEntry> {
        self.by_destination.get(destination).map(|&i| &self.entries[i])
    }

    fn insert(&mut self, entry: FileEntry) -> Result<(), PakrError> {
        if self.by_destination.contains_key(&entry.destination) {
            return Err(PakrError::DuplicateDestination {
                destination: entry.destination,
            });
        }
        trace!(source = %entry.source, destination = %entry.destination, "manifest entry");
        self.by_destination.insert(entry.destination.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Expand and remap a list of `SOURCE[=DEST]` file arguments.
    ///
    /// Each argument's left-hand side is expanded to `(root, files)`; every
    /// file becomes one entry. Without a `=DEST`, files install rooted at `/`
    /// mirroring their discovered path. With one, the expansion root prefix
    /// is replaced by the destination prefix.
    ///
    /// # Errors
    ///
    /// - [`PakrError::InvalidMapping`] if an argument contains more than one `=`
    /// - [`PakrError::DuplicateDestination`] if two files land on the same path
    /// - expansion errors from [`expand`]
    pub fn add_files(&mut self, args: &[String]) -> Result<(), PakrError> {
        for arg in args {
            let (pattern, dest) = split_mapping(arg)?;
            let expansion = expand(pattern)?;
            debug!(arg = %arg, files = expansion.files.len(), "adding file mapping");
            for file in expansion.files {
                let destination = match dest {
                    None => {
                        if file.starts_with('/') {
                            file.clone()
                        } else {
                            format!("/{file}")
                        }
                    }
                    Some(prefix) => remap(&file, &expansion.root, prefix)?,
                };
                self.insert(FileEntry {
                    source: file,
                    destination,
                    role: Role::Regular,
                })?;
            }
        }
        Ok(())
    }

    /// Add `TARGET=LINK` symlink entries.
    ///
    /// No filesystem check is performed on the target; dangling links are
    /// legitimate package content.
    ///
    /// # Errors
    ///
    /// - [`PakrError::InvalidMapping`] if an argument does not contain
    ///   exactly one `=`
    /// - [`PakrError::SymlinkDestinationExists`] if the link path is already
    ///   a destination in the manifest
    pub fn add_symlinks(&mut self, args: &[String]) -> Result<(), PakrError> {
        for arg in args {
            let (target, link) = match split_mapping(arg)? {
                (target, Some(link)) => (target, link),
                (_, None) => {
                    return Err(PakrError::InvalidMapping {
                        value: arg.clone(),
                    });
                }
            };
            if self.by_destination.contains_key(link) {
                return Err(PakrError::SymlinkDestinationExists {
                    destination: link.to_string(),
                });
            }
            self.insert(FileEntry {
                source: target.to_string(),
                destination: link.to_string(),
                role: Role::Symlink,
            })?;
        }
        Ok(())
    }

    /// Mark every entry whose destination equals `path` or lives under
    /// `path/` with `role`. First assignment wins: entries that already
    /// carry a non-default role are left alone, so a symlink covered by a
    /// config directory stays a symlink and repeated calls are idempotent.
    ///
    /// An empty match set is not an error.
    pub fn mark_role(&mut self, paths: &[String], role: Role) {
        for path in paths {
            let prefix = if path.ends_with('/') {
                path.clone()
            } else {
                format!("{path}/")
            };
            for entry in &mut self.entries {
                if entry.role == Role::Regular
                    && (entry.destination == *path || entry.destination.starts_with(&prefix))
                {
                    debug!(destination = %entry.destination, %role, "marking role");
                    entry.role = role;
                }
            }
        }
    }

    /// Default-inference policy for role marking, invoked by the CLI layer
    /// when the user supplied no explicit list: if any destination begins
    /// with `prefix`, return that prefix as the single path to mark.
    ///
    /// Kept out of [`Manifest::mark_role`] so the classifier stays
    /// a pure "mark these paths" operation and the convenience default is
    /// separately testable and skippable.
    #[must_use]
    pub fn infer_role_paths(&self, prefix: &str) -> Option<Vec<String>> {
        self.entries
            .iter()
            .any(|e| e.destination.starts_with(prefix))
            .then(|| vec![prefix.to_string()])
    }

    /// Re-root relative sources under `dir` (the `--chdir` search
    /// directory). Absolute sources and symlink targets are untouched.
    pub fn rebase_sources(&mut self, dir: &str) {
        for entry in &mut self.entries {
            if entry.role != Role::Symlink && !entry.source.starts_with('/') {
                entry.source = Path::new(dir)
                    .join(&entry.source)
                    .to_string_lossy()
                    .into_owned();
            }
        }
    }

    /// Reject an empty manifest before any serializer work begins.
    ///
    /// Destination uniqueness needs no check here; it is enforced at every
    /// insertion. Metadata validation belongs to the serializer side.
    pub fn validate(&self) -> Result<(), PakrError> {
        if self.entries.is_empty() {
            return Err(PakrError::EmptyManifest);
        }
        Ok(())
    }
}

/// Split `SOURCE[=DEST]` on `=`. More than one `=` is a format error.
fn split_mapping(arg: &str) -> Result<(&str, Option<&str>), PakrError> {
    let mut parts = arg.split('=');
    let source = parts.next().unwrap_or_default();
    let dest = parts.next();
    if parts.next().is_some() {
        return Err(PakrError::InvalidMapping {
            value: arg.to_string(),
        });
    }
    Ok((source, dest))
}

/// Rewrite `file` by replacing its expansion `root` prefix with the
/// user-supplied destination prefix.
///
/// Hardened against the silent no-op of a plain substring replace: a file
/// that does not share the root is an error, never passed through unchanged.
fn remap(file: &str, root: &str, dest_prefix: &str) -> Result<String, PakrError> {
    match file.strip_prefix(root) {
        Some(suffix) => Ok(format!("{dest_prefix}{suffix}")),
        None => Err(PakrError::Expansion {
            pattern: root.to_string(),
            reason: format!("expanded file '{file}' does not share the expansion root"),
        }),
    }
}

#[cfg(test)]
mod tests;
