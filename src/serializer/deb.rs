//! Debian package writer.
//!
//! A `.deb` is an `ar` archive with three members in fixed order:
//! `debian-binary` (the format version), `control.tar.gz` (package fields,
//! conffiles, maintainer scripts), and `data.tar.gz` (the payload). The ar
//! container is simple enough to emit directly; the tar members go through
//! the `tar` and `flate2` crates.
//!
//! The writer is minimal: no md5sums member, no alternative
//! compressors. Config-role entries become `conffiles` lines, doc-role
//! entries need no special encoding in deb.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};

use crate::manifest::{Manifest, Role};
use crate::metadata::PackageInfo;

use super::Serializer;

/// Writes Debian binary packages.
pub struct DebSerializer;

impl Serializer for DebSerializer {
    fn package(
        &self,
        info: &PackageInfo,
        manifest: &Manifest,
        out: &mut dyn Write,
    ) -> Result<()> {
        let data = data_member(manifest)?;
        let control = control_member(info, manifest)?;

        out.write_all(b"!<arch>\n")?;
        append_ar_member(out, "debian-binary", b"2.0\n")?;
        append_ar_member(out, "control.tar.gz", &control)?;
        append_ar_member(out, "data.tar.gz", &data)?;
        Ok(())
    }

    fn conventional_file_name(&self, info: &PackageInfo) -> String {
        format!(
            "{}_{}-{}_{}.deb",
            info.name, info.version, info.release, info.arch
        )
    }
}

/// One ar member: 60-byte header, data, newline pad to even length.
fn append_ar_member(out: &mut dyn Write, name: &str, data: &[u8]) -> Result<()> {
    write!(out, "{name:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n", 0, 0, 0, 100644, data.len())?;
    out.write_all(data)?;
    if data.len() % 2 != 0 {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn control_member(info: &PackageInfo, manifest: &Manifest) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_entry(&mut builder, "./control", control_fields(info, manifest).as_bytes(), 0o644)?;

    let conffiles: String = manifest
        .entries()
        .iter()
        .filter(|e| e.role == Role::Config)
        .map(|e| format!("{}\n", e.destination))
        .collect();
    if !conffiles.is_empty() {
        append_entry(&mut builder, "./conffiles", conffiles.as_bytes(), 0o644)?;
    }

    let scripts = [
        ("./preinst", &info.scripts.pre_install),
        ("./postinst", &info.scripts.post_install),
        ("./prerm", &info.scripts.pre_remove),
        ("./postrm", &info.scripts.post_remove),
    ];
    for (name, path) in scripts {
        if let Some(path) = path {
            let body = std::fs::read(path)
                .with_context(|| format!("failed to read script file {path}"))?;
            append_entry(&mut builder, name, &body, 0o755)?;
        }
    }

    Ok(builder.into_inner()?.finish()?)
}

fn control_fields(info: &PackageInfo, manifest: &Manifest) -> String {
    let mut control = String::new();
    control.push_str(&format!("Package: {}\n", info.name));
    control.push_str(&format!("Version: {}\n", info.full_version()));
    control.push_str(&format!("Architecture: {}\n", info.arch));
    if !info.section.is_empty() {
        control.push_str(&format!("Section: {}\n", info.section));
    }
    control.push_str("Priority: optional\n");
    if !info.maintainer.is_empty() {
        control.push_str(&format!("Maintainer: {}\n", info.maintainer));
    }
    if !info.homepage.is_empty() {
        control.push_str(&format!("Homepage: {}\n", info.homepage));
    }
    control.push_str(&format!("Installed-Size: {}\n", installed_kib(manifest)));
    control.push_str(&format!("Description: {}\n", info.description));
    control
}

/// Sum of payload file sizes in KiB, the unit `Installed-Size` expects.
fn installed_kib(manifest: &Manifest) -> u64 {
    let bytes: u64 = manifest
        .entries()
        .iter()
        .filter(|e| e.role != Role::Symlink)
        .filter_map(|e| std::fs::metadata(&e.source).ok())
        .map(|m| m.len())
        .sum();
    bytes.div_ceil(1024)
}

fn data_member(manifest: &Manifest) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    // dpkg wants parent directories present before the files under them.
    for dir in parent_dirs(manifest) {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(0);
        builder.append_data(&mut header, format!("./{dir}"), std::io::empty())?;
    }

    for entry in manifest.entries() {
        let name = format!("./{}", entry.destination.trim_start_matches('/'));
        match entry.role {
            Role::Symlink => {
                let mut header = Header::new_gnu();
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                header.set_mtime(0);
                builder.append_link(&mut header, &name, &entry.source)?;
            }
            _ => {
                let mut file = std::fs::File::open(&entry.source)
                    .with_context(|| format!("failed to open source file {}", entry.source))?;
                let meta = file.metadata()?;
                let mut header = Header::new_gnu();
                header.set_size(meta.len());
                header.set_mode(source_mode(&meta));
                header.set_mtime(source_mtime(&meta));
                builder.append_data(&mut header, &name, &mut file)?;
            }
        }
    }

    Ok(builder.into_inner()?.finish()?)
}

/// Unique parent directories of every destination, shallow-first.
fn parent_dirs(manifest: &Manifest) -> BTreeSet<String> {
    let mut dirs = BTreeSet::new();
    for entry in manifest.entries() {
        let path = entry.destination.trim_start_matches('/');
        let mut prefix = String::new();
        let components: Vec<&str> = path.split('/').collect();
        for component in &components[..components.len().saturating_sub(1)] {
            prefix.push_str(component);
            prefix.push('/');
            dirs.insert(prefix.clone());
        }
    }
    dirs
}

#[cfg(unix)]
pub(super) fn source_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub(super) fn source_mode(_meta: &std::fs::Metadata) -> u32 {
    0o644
}

fn source_mtime(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

fn append_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    data: &[u8],
    mode: u32,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(0);
    builder.append_data(&mut header, name, data)?;
    Ok(())
}
