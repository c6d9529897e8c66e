//! Alpine package writer.
//!
//! An apk v2 package is a concatenation of gzip streams: a control segment
//! holding `.PKGINFO` (and install scripts), followed by the data segment
//! with the payload tree. This writer emits the two segments unsigned;
//! `apk` tooling and plain `tar -tzf` can both read the result.
//!
//! Payload paths are relative without a leading `./`, per Alpine convention.

use std::io::Write;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};

use crate::manifest::{Manifest, Role};
use crate::metadata::PackageInfo;

use super::Serializer;

/// Writes Alpine packages.
pub struct ApkSerializer;

impl Serializer for ApkSerializer {
    fn package(
        &self,
        info: &PackageInfo,
        manifest: &Manifest,
        out: &mut dyn Write,
    ) -> Result<()> {
        out.write_all(&control_segment(info, manifest)?)?;
        out.write_all(&data_segment(manifest)?)?;
        Ok(())
    }

    fn conventional_file_name(&self, info: &PackageInfo) -> String {
        format!("{}-{}-r{}.apk", info.name, info.version, info.release)
    }
}

fn pkginfo(info: &PackageInfo, manifest: &Manifest) -> String {
    let size: u64 = manifest
        .entries()
        .iter()
        .filter(|e| e.role != Role::Symlink)
        .filter_map(|e| std::fs::metadata(&e.source).ok())
        .map(|m| m.len())
        .sum();

    let mut fields = String::new();
    fields.push_str(&format!("pkgname = {}\n", info.name));
    fields.push_str(&format!("pkgver = {}-r{}\n", info.version, info.release));
    fields.push_str(&format!("pkgdesc = {}\n", info.description));
    fields.push_str(&format!("arch = {}\n", info.arch));
    fields.push_str(&format!("size = {size}\n"));
    if !info.license.is_empty() {
        fields.push_str(&format!("license = {}\n", info.license));
    }
    if !info.homepage.is_empty() {
        fields.push_str(&format!("url = {}\n", info.homepage));
    }
    if !info.maintainer.is_empty() {
        fields.push_str(&format!("maintainer = {}\n", info.maintainer));
    }
    fields
}

fn control_segment(info: &PackageInfo, manifest: &Manifest) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_entry(&mut builder, ".PKGINFO", pkginfo(info, manifest).as_bytes(), 0o644)?;

    let scripts = [
        (".pre-install", &info.scripts.pre_install),
        (".post-install", &info.scripts.post_install),
        (".pre-deinstall", &info.scripts.pre_remove),
        (".post-deinstall", &info.scripts.post_remove),
        (".pre-upgrade", &info.scripts.pre_upgrade),
        (".post-upgrade", &info.scripts.post_upgrade),
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

fn data_segment(manifest: &Manifest) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in manifest.entries() {
        let name = entry.destination.trim_start_matches('/').to_string();
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
                header.set_mode(super::deb::source_mode(&meta));
                header.set_mtime(0);
                builder.append_data(&mut header, &name, &mut file)?;
            }
        }
    }

    Ok(builder.into_inner()?.finish()?)
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
