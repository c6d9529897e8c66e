//! pakr builds rpm, deb, and apk packages straight from command-line file
//! mappings, fpm-style, without a spec file.
//!
//! The pipeline is small and linear:
//!
//! 1. [`expand`] turns each `FILE[=DEST]` argument's left-hand side into a
//!    concrete file list plus a remap root (globs and directories included).
//! 2. [`manifest`] remaps the files under their destinations, injects
//!    symlinks, classifies config/doc roles, and rejects conflicts.
//! 3. [`metadata`] normalizes the package identity fields.
//! 4. [`serializer`] writes the chosen archive format.
//!
//! The [`cli`] module wires those stages to the flag surface; [`config`]
//! supplies optional file-based defaults; [`core`] holds the error types.

pub mod cli;
pub mod config;
pub mod core;
pub mod expand;
pub mod manifest;
pub mod metadata;
pub mod serializer;

#[cfg(test)]
mod test_utils;
