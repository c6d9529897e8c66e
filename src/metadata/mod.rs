//! Package metadata: name, version, architecture, scripts, and the output
//! file-name templating.
//!
//! Everything here is plain data plus a few normalization rules. The
//! serializers read [`PackageInfo`] together with the manifest; nothing in
//! this module touches the filesystem except the script paths, which are
//! read lazily by the serializers.

use crate::core::PakrError;
use crate::serializer::OutputFormat;

/// Maintainer scripts, given as paths to shell scripts on the build host.
///
/// Upgrade scripts only apply to formats that have the concept (rpm
/// pre/post-trans, apk pre/post-upgrade); deb ignores them.
#[derive(Debug, Clone, Default)]
pub struct Scripts {
    /// Run before package installation.
    pub pre_install: Option<String>,
    /// Run after package installation.
    pub post_install: Option<String>,
    /// Run before package removal.
    pub pre_remove: Option<String>,
    /// Run after package removal.
    pub post_remove: Option<String>,
    /// Run before package upgrade (rpm pretrans, apk pre-upgrade).
    pub pre_upgrade: Option<String>,
    /// Run after package upgrade (rpm posttrans, apk post-upgrade).
    pub post_upgrade: Option<String>,
}

/// Metadata for the package being built.
///
/// Field semantics follow the common rpm/deb vocabulary: `release` is what
/// rpm calls release and fpm calls iteration; `section` is the deb section /
/// rpm group.
#[derive(Debug, Clone, Default)]
pub struct PackageInfo {
    /// Package name. Required.
    pub name: String,
    /// Upstream version. Required.
    pub version: String,
    /// Package iteration / rpm release. Defaults to "1".
    pub release: String,
    /// Target architecture in the output format's vocabulary. Detected from
    /// the build host when empty.
    pub arch: String,
    /// Target platform / OS. Defaults to "linux".
    pub platform: String,
    /// License identifier.
    pub license: String,
    /// Package maintainer, `Name <email>` form.
    pub maintainer: String,
    /// One-line description.
    pub description: String,
    /// Upstream homepage URL.
    pub homepage: String,
    /// Category (deb section / rpm group).
    pub section: String,
    /// Maintainer scripts.
    pub scripts: Scripts,
}

impl PackageInfo {
    /// Fill in host-derived and constant defaults: architecture from the
    /// build host (per output format vocabulary) and platform "linux".
    pub fn finalize(&mut self, format: OutputFormat) {
        if self.arch.is_empty() {
            self.arch = detect_arch(format);
        }
        if self.platform.is_empty() {
            self.platform = "linux".to_string();
        }
    }

    /// Normalize version and release.
    ///
    /// `--iteration 0` asks pakr to derive the iteration from the version
    /// string: `1.2.3-4` splits into version `1.2.3`, release `4` (`_` works
    /// as separator too). An empty release becomes "1".
    pub fn normalize(&mut self) {
        if self.release == "0" {
            if let Some(idx) = self.version.find(['-', '_']) {
                if idx > 1 {
                    self.release = self.version[idx + 1..].to_string();
                    self.version.truncate(idx);
                }
            }
        }
        if self.release.is_empty() {
            self.release = "1".to_string();
        }
    }

    /// Check that the fields every format requires are present.
    pub fn validate(&self) -> Result<(), PakrError> {
        for (field, value) in [
            ("name", &self.name),
            ("version", &self.version),
            ("iteration", &self.release),
        ] {
            if value.is_empty() {
                return Err(PakrError::Validation {
                    reason: format!("{field} not set"),
                });
            }
        }
        Ok(())
    }

    /// Full version string in deb vocabulary: `version-release`.
    #[must_use]
    pub fn full_version(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }
}

/// Render a user-supplied output-name template, substituting every
/// occurrence of `NAME`, `VERSION`, `ITERATION`, `ARCH`, and `PLATFORM`.
#[must_use]
pub fn render_name_template(template: &str, info: &PackageInfo) -> String {
    template
        .replace("NAME", &info.name)
        .replace("VERSION", &info.version)
        .replace("ITERATION", &info.release)
        .replace("ARCH", &info.arch)
        .replace("PLATFORM", &info.platform)
}

/// Map the build host's architecture into the output format's vocabulary
/// (rpm and apk say `x86_64`, deb says `amd64`). Unknown architectures pass
/// through unchanged; `--architecture` overrides the detection entirely.
#[must_use]
pub fn detect_arch(format: OutputFormat) -> String {
    map_arch(std::env::consts::ARCH, format)
}

fn map_arch(host: &str, format: OutputFormat) -> String {
    match (host, format) {
        ("x86_64", OutputFormat::Deb) => "amd64".to_string(),
        ("aarch64", OutputFormat::Deb) => "arm64".to_string(),
        (other, _) => other.to_string(),
    }
}
