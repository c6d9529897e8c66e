//! RPM package writer.
//!
//! An rpm v3 package is four sections back to back: a fixed 96-byte lead, a
//! signature header, the main metadata header, and a gzip-compressed cpio
//! (newc) payload. The two headers share one binary layout: a magic, an
//! index of 16-byte entries (tag, type, offset, count, all big-endian), and
//! a store the offsets point into.
//!
//! This writer emits unsigned packages: the signature header carries only
//! the sizes and the SHA-256 of the main header. File roles map to rpm file
//! flags (`%config(noreplace)` for config, `%doc` for doc); symlinks travel
//! in `FILELINKTOS` with a symlink mode bit and their target as payload.

use std::io::Write;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};

use crate::manifest::{Manifest, Role};
use crate::metadata::PackageInfo;

use super::Serializer;

// Header index entry types.
const TYPE_INT16: u32 = 3;
const TYPE_INT32: u32 = 4;
const TYPE_STRING: u32 = 6;
const TYPE_STRING_ARRAY: u32 = 8;
const TYPE_I18N_STRING: u32 = 9;

// Signature header tags.
const SIGTAG_SHA256: u32 = 273;
const SIGTAG_SIZE: u32 = 1000;
const SIGTAG_PAYLOADSIZE: u32 = 1007;

// Main header tags, in the ascending order they are emitted.
const TAG_HEADERI18NTABLE: u32 = 100;
const TAG_NAME: u32 = 1000;
const TAG_VERSION: u32 = 1001;
const TAG_RELEASE: u32 = 1002;
const TAG_SUMMARY: u32 = 1004;
const TAG_DESCRIPTION: u32 = 1005;
const TAG_SIZE: u32 = 1009;
const TAG_LICENSE: u32 = 1014;
const TAG_GROUP: u32 = 1016;
const TAG_URL: u32 = 1020;
const TAG_OS: u32 = 1021;
const TAG_ARCH: u32 = 1022;
const TAG_PREIN: u32 = 1023;
const TAG_POSTIN: u32 = 1024;
const TAG_PREUN: u32 = 1025;
const TAG_POSTUN: u32 = 1026;
const TAG_FILESIZES: u32 = 1028;
const TAG_FILEMODES: u32 = 1030;
const TAG_FILERDEVS: u32 = 1033;
const TAG_FILEMTIMES: u32 = 1034;
const TAG_FILEDIGESTS: u32 = 1035;
const TAG_FILELINKTOS: u32 = 1036;
const TAG_FILEFLAGS: u32 = 1037;
const TAG_FILEUSERNAME: u32 = 1039;
const TAG_FILEGROUPNAME: u32 = 1040;
const TAG_PREINPROG: u32 = 1085;
const TAG_POSTINPROG: u32 = 1086;
const TAG_PREUNPROG: u32 = 1087;
const TAG_POSTUNPROG: u32 = 1088;
const TAG_FILEDEVICES: u32 = 1095;
const TAG_FILEINODES: u32 = 1096;
const TAG_FILELANGS: u32 = 1097;
const TAG_DIRINDEXES: u32 = 1116;
const TAG_BASENAMES: u32 = 1117;
const TAG_DIRNAMES: u32 = 1118;
const TAG_PAYLOADFORMAT: u32 = 1124;
const TAG_PAYLOADCOMPRESSOR: u32 = 1125;
const TAG_PAYLOADFLAGS: u32 = 1126;
const TAG_PRETRANS: u32 = 1151;
const TAG_POSTTRANS: u32 = 1152;
const TAG_PRETRANSPROG: u32 = 1153;
const TAG_POSTTRANSPROG: u32 = 1154;
const TAG_FILEDIGESTALGO: u32 = 5011;

// File flag bits.
const FLAG_CONFIG: u32 = 1;
const FLAG_DOC: u32 = 2;
const FLAG_NOREPLACE: u32 = 1 << 4;

const DIGEST_ALGO_SHA256: u32 = 8;
const SCRIPT_INTERPRETER: &str = "/bin/sh";

/// Writes RPM packages.
pub struct RpmSerializer;

impl Serializer for RpmSerializer {
    fn package(
        &self,
        info: &PackageInfo,
        manifest: &Manifest,
        out: &mut dyn Write,
    ) -> Result<()> {
        let files = collect_files(manifest)?;
        let cpio = build_cpio(&files)?;

        let mut gz = GzEncoder::new(Vec::new(), Compression::new(9));
        gz.write_all(&cpio)?;
        let compressed = gz.finish()?;

        let header = main_header(info, &files)?;
        let signature = signature_header(&header, &compressed, cpio.len() as u32);

        out.write_all(&lead(info))?;
        out.write_all(&signature)?;
        out.write_all(&header)?;
        out.write_all(&compressed)?;
        Ok(())
    }

    fn conventional_file_name(&self, info: &PackageInfo) -> String {
        format!(
            "{}-{}-{}.{}.rpm",
            info.name, info.version, info.release, info.arch
        )
    }
}

/// Everything the header and payload need to know about one file.
struct FileInfo {
    dirname: String,
    basename: String,
    /// Payload bytes: file content, or the link target for symlinks.
    content: Vec<u8>,
    mode: u16,
    mtime: u32,
    digest: String,
    linkto: String,
    flags: u32,
}

fn collect_files(manifest: &Manifest) -> Result<Vec<FileInfo>> {
    manifest
        .entries()
        .iter()
        .map(|entry| {
            let (dirname, basename) = split_destination(&entry.destination);
            match entry.role {
                Role::Symlink => Ok(FileInfo {
                    dirname,
                    basename,
                    content: entry.source.clone().into_bytes(),
                    mode: 0o120777,
                    mtime: 0,
                    digest: String::new(),
                    linkto: entry.source.clone(),
                    flags: 0,
                }),
                role => {
                    let content = std::fs::read(&entry.source).with_context(|| {
                        format!("failed to read source file {}", entry.source)
                    })?;
                    let meta = std::fs::metadata(&entry.source)?;
                    Ok(FileInfo {
                        dirname,
                        basename,
                        digest: hex::encode(Sha256::digest(&content)),
                        content,
                        mode: 0o100000 | (super::deb::source_mode(&meta) as u16),
                        mtime: u32::try_from(source_mtime(&meta)).unwrap_or(0),
                        linkto: String::new(),
                        flags: match role {
                            Role::Config => FLAG_CONFIG | FLAG_NOREPLACE,
                            Role::Doc => FLAG_DOC,
                            _ => 0,
                        },
                    })
                }
            }
        })
        .collect()
}

/// Split an absolute destination into rpm's `(dirname, basename)` pair,
/// where dirnames keep both slashes: `/usr/bin/tool` → (`/usr/bin/`, `tool`).
fn split_destination(destination: &str) -> (String, String) {
    match destination.rfind('/') {
        Some(idx) => (
            destination[..=idx].to_string(),
            destination[idx + 1..].to_string(),
        ),
        None => ("/".to_string(), destination.to_string()),
    }
}

fn source_mtime(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

/// 96-byte lead: magic, rpm v3, binary package type, package name, and the
/// "header-style signature follows" marker. Modern rpm only reads the magic
/// and signature type, the rest is kept for compatibility.
fn lead(info: &PackageInfo) -> [u8; 96] {
    let mut lead = [0u8; 96];
    lead[0..4].copy_from_slice(&[0xed, 0xab, 0xee, 0xdb]);
    lead[4] = 3; // major
    lead[5] = 0; // minor
    lead[6..8].copy_from_slice(&0u16.to_be_bytes()); // type: binary
    lead[8..10].copy_from_slice(&1u16.to_be_bytes()); // archnum
    let name = format!("{}-{}-{}", info.name, info.version, info.release);
    let bytes = name.as_bytes();
    let len = bytes.len().min(65);
    lead[10..10 + len].copy_from_slice(&bytes[..len]);
    lead[76..78].copy_from_slice(&1u16.to_be_bytes()); // osnum: linux
    lead[78..80].copy_from_slice(&5u16.to_be_bytes()); // signature type: header
    lead
}

fn signature_header(header: &[u8], compressed_payload: &[u8], payload_size: u32) -> Vec<u8> {
    let mut builder = HeaderBuilder::new();
    builder.string(SIGTAG_SHA256, &hex::encode(Sha256::digest(header)));
    builder.int32(SIGTAG_SIZE, (header.len() + compressed_payload.len()) as u32);
    builder.int32(SIGTAG_PAYLOADSIZE, payload_size);
    let mut bytes = builder.build();
    // The section after the signature header is 8-byte aligned.
    while bytes.len() % 8 != 0 {
        bytes.push(0);
    }
    bytes
}

fn main_header(info: &PackageInfo, files: &[FileInfo]) -> Result<Vec<u8>> {
    let mut dirnames: Vec<String> = files.iter().map(|f| f.dirname.clone()).collect();
    dirnames.sort();
    dirnames.dedup();
    let dirindexes: Vec<u32> = files
        .iter()
        .map(|f| dirnames.iter().position(|d| *d == f.dirname).unwrap_or(0) as u32)
        .collect();

    let scripts = [
        (TAG_PREIN, TAG_PREINPROG, &info.scripts.pre_install),
        (TAG_POSTIN, TAG_POSTINPROG, &info.scripts.post_install),
        (TAG_PREUN, TAG_PREUNPROG, &info.scripts.pre_remove),
        (TAG_POSTUN, TAG_POSTUNPROG, &info.scripts.post_remove),
        (TAG_PRETRANS, TAG_PRETRANSPROG, &info.scripts.pre_upgrade),
        (TAG_POSTTRANS, TAG_POSTTRANSPROG, &info.scripts.post_upgrade),
    ];
    let mut script_bodies: Vec<(u32, u32, String)> = Vec::new();
    for (tag, prog_tag, path) in scripts {
        if let Some(path) = path {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read script file {path}"))?;
            script_bodies.push((tag, prog_tag, body));
        }
    }

    let mut b = HeaderBuilder::new();
    b.string_array(TAG_HEADERI18NTABLE, &["C".to_string()]);
    b.string(TAG_NAME, &info.name);
    b.string(TAG_VERSION, &info.version);
    b.string(TAG_RELEASE, &info.release);
    b.i18n_string(TAG_SUMMARY, &info.description);
    b.i18n_string(TAG_DESCRIPTION, &info.description);
    b.int32(TAG_SIZE, files.iter().map(|f| f.content.len() as u32).sum());
    b.string(TAG_LICENSE, nonempty(&info.license, "unknown"));
    b.i18n_string(TAG_GROUP, nonempty(&info.section, "default"));
    if !info.homepage.is_empty() {
        b.string(TAG_URL, &info.homepage);
    }
    b.string(TAG_OS, nonempty(&info.platform, "linux"));
    b.string(TAG_ARCH, &info.arch);
    for (tag, _, body) in &script_bodies {
        if *tag <= TAG_POSTUN {
            b.string(*tag, body);
        }
    }
    b.int32_array(TAG_FILESIZES, &files.iter().map(|f| f.content.len() as u32).collect::<Vec<_>>());
    b.int16_array(TAG_FILEMODES, &files.iter().map(|f| f.mode).collect::<Vec<_>>());
    b.int16_array(TAG_FILERDEVS, &vec![0u16; files.len()]);
    b.int32_array(TAG_FILEMTIMES, &files.iter().map(|f| f.mtime).collect::<Vec<_>>());
    b.string_array(TAG_FILEDIGESTS, &files.iter().map(|f| f.digest.clone()).collect::<Vec<_>>());
    b.string_array(TAG_FILELINKTOS, &files.iter().map(|f| f.linkto.clone()).collect::<Vec<_>>());
    b.int32_array(TAG_FILEFLAGS, &files.iter().map(|f| f.flags).collect::<Vec<_>>());
    b.string_array(TAG_FILEUSERNAME, &vec!["root".to_string(); files.len()]);
    b.string_array(TAG_FILEGROUPNAME, &vec!["root".to_string(); files.len()]);
    for (tag, prog_tag, _) in &script_bodies {
        if *tag <= TAG_POSTUN {
            b.string(*prog_tag, SCRIPT_INTERPRETER);
        }
    }
    b.int32_array(TAG_FILEDEVICES, &vec![1u32; files.len()]);
    b.int32_array(TAG_FILEINODES, &(1..=files.len() as u32).collect::<Vec<_>>());
    b.string_array(TAG_FILELANGS, &vec![String::new(); files.len()]);
    b.int32_array(TAG_DIRINDEXES, &dirindexes);
    b.string_array(TAG_BASENAMES, &files.iter().map(|f| f.basename.clone()).collect::<Vec<_>>());
    b.string_array(TAG_DIRNAMES, &dirnames);
    b.string(TAG_PAYLOADFORMAT, "cpio");
    b.string(TAG_PAYLOADCOMPRESSOR, "gzip");
    b.string(TAG_PAYLOADFLAGS, "9");
    for (tag, _, body) in &script_bodies {
        if *tag > TAG_POSTUN {
            b.string(*tag, body);
        }
    }
    for (tag, prog_tag, _) in &script_bodies {
        if *tag > TAG_POSTUN {
            b.string(*prog_tag, SCRIPT_INTERPRETER);
        }
    }
    b.int32(TAG_FILEDIGESTALGO, DIGEST_ALGO_SHA256);

    Ok(b.build())
}

fn nonempty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Incrementally assembles one header section (index + store).
struct HeaderBuilder {
    index: Vec<u8>,
    store: Vec<u8>,
    count: u32,
}

impl HeaderBuilder {
    fn new() -> Self {
        Self {
            index: Vec::new(),
            store: Vec::new(),
            count: 0,
        }
    }

    fn entry(&mut self, tag: u32, typ: u32, offset: u32, count: u32) {
        self.index.extend_from_slice(&tag.to_be_bytes());
        self.index.extend_from_slice(&typ.to_be_bytes());
        self.index.extend_from_slice(&offset.to_be_bytes());
        self.index.extend_from_slice(&count.to_be_bytes());
        self.count += 1;
    }

    fn align(&mut self, boundary: usize) {
        while self.store.len() % boundary != 0 {
            self.store.push(0);
        }
    }

    fn string(&mut self, tag: u32, value: &str) {
        self.typed_string(tag, TYPE_STRING, value);
    }

    fn i18n_string(&mut self, tag: u32, value: &str) {
        self.typed_string(tag, TYPE_I18N_STRING, value);
    }

    fn typed_string(&mut self, tag: u32, typ: u32, value: &str) {
        let offset = self.store.len() as u32;
        self.store.extend_from_slice(value.as_bytes());
        self.store.push(0);
        self.entry(tag, typ, offset, 1);
    }

    fn string_array(&mut self, tag: u32, values: &[String]) {
        let offset = self.store.len() as u32;
        for value in values {
            self.store.extend_from_slice(value.as_bytes());
            self.store.push(0);
        }
        self.entry(tag, TYPE_STRING_ARRAY, offset, values.len() as u32);
    }

    fn int16_array(&mut self, tag: u32, values: &[u16]) {
        self.align(2);
        let offset = self.store.len() as u32;
        for value in values {
            self.store.extend_from_slice(&value.to_be_bytes());
        }
        self.entry(tag, TYPE_INT16, offset, values.len() as u32);
    }

    fn int32_array(&mut self, tag: u32, values: &[u32]) {
        self.align(4);
        let offset = self.store.len() as u32;
        for value in values {
            self.store.extend_from_slice(&value.to_be_bytes());
        }
        self.entry(tag, TYPE_INT32, offset, values.len() as u32);
    }

    fn int32(&mut self, tag: u32, value: u32) {
        self.int32_array(tag, &[value]);
    }

    fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.index.len() + self.store.len());
        out.extend_from_slice(&[0x8e, 0xad, 0xe8, 0x01]);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&self.count.to_be_bytes());
        out.extend_from_slice(&(self.store.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.index);
        out.extend_from_slice(&self.store);
        out
    }
}

/// Build the uncompressed cpio (newc, `070701`) payload.
fn build_cpio(files: &[FileInfo]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let name = format!(".{}{}", file.dirname, file.basename);
        cpio_entry(
            &mut out,
            &name,
            i as u32 + 1,
            u32::from(file.mode),
            file.mtime,
            &file.content,
        );
    }
    cpio_entry(&mut out, "TRAILER!!!", 0, 0, 0, &[]);
    Ok(out)
}

fn cpio_entry(out: &mut Vec<u8>, name: &str, ino: u32, mode: u32, mtime: u32, data: &[u8]) {
    let fields = [
        ino,
        mode,
        0, // uid
        0, // gid
        1, // nlink
        mtime,
        data.len() as u32,
        0, // devmajor
        0, // devminor
        0, // rdevmajor
        0, // rdevminor
        name.len() as u32 + 1,
        0, // check
    ];
    out.extend_from_slice(b"070701");
    for field in fields {
        out.extend_from_slice(format!("{field:08x}").as_bytes());
    }
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}
