//! The serializer seam and the output-file glue.
//!
//! The manifest builder treats package encoding as an opaque capability:
//! anything implementing [`Serializer`] can turn a finished
//! ([`PackageInfo`], [`Manifest`]) pair into bytes. The built-in
//! implementations ([`deb`], [`rpm`], [`apk`]) write structurally minimal
//! but genuine archives; [`write_package`] owns the file handling around
//! them: overwrite policy, and removal of partial output when a writer
//! fails mid-stream so a failed run never leaves a corrupt archive behind.

pub mod apk;
pub mod deb;
pub mod rpm;

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use serde::Deserialize;

use crate::core::PakrError;
use crate::manifest::Manifest;
use crate::metadata::PackageInfo;

/// A package-format writer.
///
/// Implementations stream the manifest and metadata into a concrete archive.
/// They never see the output path: the glue in [`write_package`] hands them
/// an open stream and cleans up if they fail.
pub trait Serializer {
    /// Serialize the package into `out`.
    fn package(
        &self,
        info: &PackageInfo,
        manifest: &Manifest,
        out: &mut dyn Write,
    ) -> Result<()>;

    /// The format's conventional file name for this package, used when the
    /// user gives no explicit output name.
    fn conventional_file_name(&self, info: &PackageInfo) -> String;
}

/// Input layout accepted on the command line. Only plain directories/files
/// are supported; the variant exists so the flag surface stays a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputFormat {
    /// Files and directories straight from the filesystem.
    #[default]
    Dir,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputFormat::Dir => "dir",
        })
    }
}

/// Output package format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// RPM package (Red Hat family).
    Rpm,
    /// Debian package.
    Deb,
    /// Alpine package.
    Apk,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Rpm => "rpm",
            OutputFormat::Deb => "deb",
            OutputFormat::Apk => "apk",
        })
    }
}

impl OutputFormat {
    /// The writer for this format.
    #[must_use]
    pub fn serializer(self) -> Box<dyn Serializer> {
        match self {
            OutputFormat::Rpm => Box::new(rpm::RpmSerializer),
            OutputFormat::Deb => Box::new(deb::DebSerializer),
            OutputFormat::Apk => Box::new(apk::ApkSerializer),
        }
    }
}

/// Write the package to `target` through `serializer`.
///
/// Behavior around the output file:
///
/// - an existing target fails with [`PakrError::OutputExists`] unless
///   `force` is set, in which case it is removed immediately before the new
///   write begins;
/// - on any serialization failure the partially written file is deleted
///   before the error is returned.
pub fn write_package(
    serializer: &dyn Serializer,
    format: &str,
    info: &PackageInfo,
    manifest: &Manifest,
    target: &Path,
    force: bool,
) -> Result<(), PakrError> {
    if target.exists() {
        if !force {
            return Err(PakrError::OutputExists {
                path: target.display().to_string(),
            });
        }
        std::fs::remove_file(target)?;
    }

    let file = File::create(target)?;
    let mut writer = BufWriter::new(file);

    let result = serializer
        .package(info, manifest, &mut writer)
        .and_then(|()| writer.flush().map_err(Into::into));

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(writer);
            let _ = std::fs::remove_file(target);
            Err(PakrError::Serialization {
                format: format.to_string(),
                reason: format!("{e:#}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingSerializer;

    impl Serializer for FailingSerializer {
        fn package(&self, _: &PackageInfo, _: &Manifest, out: &mut dyn Write) -> Result<()> {
            out.write_all(b"partial garbage")?;
            anyhow::bail!("disk on fire")
        }

        fn conventional_file_name(&self, _: &PackageInfo) -> String {
            "never.used".to_string()
        }
    }

    struct OkSerializer;

    impl Serializer for OkSerializer {
        fn package(&self, _: &PackageInfo, _: &Manifest, out: &mut dyn Write) -> Result<()> {
            out.write_all(b"package bytes")?;
            Ok(())
        }

        fn conventional_file_name(&self, _: &PackageInfo) -> String {
            "ok.pkg".to_string()
        }
    }

    #[test]
    fn failed_serialization_removes_partial_output() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("out.pkg");

        let err = write_package(
            &FailingSerializer,
            "test",
            &PackageInfo::default(),
            &Manifest::new(),
            &target,
            false,
        )
        .unwrap_err();

        assert!(matches!(err, PakrError::Serialization { .. }));
        assert!(err.to_string().contains("disk on fire"));
        assert!(!target.exists(), "partial output must be cleaned up");
    }

    #[test]
    fn existing_output_requires_force() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("out.pkg");
        std::fs::write(&target, "previous build").unwrap();

        let err = write_package(
            &OkSerializer,
            "test",
            &PackageInfo::default(),
            &Manifest::new(),
            &target,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, PakrError::OutputExists { .. }));
        // Untouched without --force.
        assert_eq!(std::fs::read(&target).unwrap(), b"previous build");

        write_package(
            &OkSerializer,
            "test",
            &PackageInfo::default(),
            &Manifest::new(),
            &target,
            true,
        )
        .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"package bytes");
    }

    #[test]
    fn format_names_round_trip() {
        assert_eq!(OutputFormat::Rpm.to_string(), "rpm");
        assert_eq!(OutputFormat::Deb.to_string(), "deb");
        assert_eq!(OutputFormat::Apk.to_string(), "apk");
        assert_eq!(InputFormat::Dir.to_string(), "dir");
    }
}
