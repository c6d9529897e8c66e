//! Command-line interface for pakr.
//!
//! pakr is a single-command tool, so there are no subcommands: the flag
//! surface mirrors fpm's package-building vocabulary and the positional
//! arguments are `FILE[=DEST]` mappings.
//!
//! ```bash
//! # Stage a build tree and package it as a deb
//! pakr -t deb -n tool -v 1.2.3 -C ./stage -f usr/=/usr/
//!
//! # Glob expansion with an explicit destination prefix
//! pakr -n tool -v 1.0 'out/*.bin=/usr/bin/'
//! ```
//!
//! [`Cli::execute`] runs the whole pipeline: expansion, remapping, symlink
//! injection, role classification, validation, and serialization.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::manifest::{Manifest, Role};
use crate::metadata::{PackageInfo, Scripts, render_name_template};
use crate::serializer::{InputFormat, OutputFormat, write_package};

/// Build rpm, deb, and apk packages from plain files.
#[derive(Parser, Debug)]
#[command(name = "pakr", version, disable_version_flag = true, arg_required_else_help = true)]
pub struct Cli {
    /// The package type to use as input.
    #[arg(short = 's', long, value_enum, default_value_t = InputFormat::Dir)]
    pub input_type: InputFormat,

    /// Directory to search files in (not scripts).
    #[arg(short = 'C', long, value_name = "DIR")]
    pub chdir: Option<String>,

    /// The type of package to create. Falls back to the config file
    /// default, then to rpm.
    #[arg(short = 't', long, value_enum)]
    pub output_type: Option<OutputFormat>,

    /// Directory to store the package in.
    #[arg(long, value_name = "DIR")]
    pub target: Option<String>,

    /// Overwrite the output file if it already exists.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// The package file name to output. NAME, VERSION, ITERATION, ARCH and
    /// PLATFORM are substituted. Defaults to the output format's
    /// conventional file name.
    #[arg(short = 'p', long, value_name = "TEMPLATE")]
    pub package: Option<String>,

    /// The name to give to the package.
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// The version to give to the package.
    #[arg(short = 'v', long)]
    pub version: Option<String>,

    /// The iteration to give to the package. RPM calls this the 'release'.
    /// Pass 0 to derive it from a version of the form VERSION-ITERATION.
    #[arg(short = 'i', long, default_value = "1")]
    pub iteration: String,

    /// The architecture name. Usually matches 'uname -m'. Detected from the
    /// build host when omitted.
    #[arg(short = 'a', long)]
    pub architecture: Option<String>,

    /// The platform name.
    #[arg(short = 'P', long)]
    pub platform: Option<String>,

    /// License name for this package.
    #[arg(short = 'l', long)]
    pub license: Option<String>,

    /// The maintainer of this package.
    #[arg(short = 'm', long)]
    pub maintainer: Option<String>,

    /// A description for this package.
    #[arg(short = 'd', long)]
    pub description: Option<String>,

    /// Homepage for this package.
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Category this package belongs to.
    #[arg(long)]
    pub category: Option<String>,

    /// Mark a file or directory in the package as configuration. Repeatable.
    /// Defaults to everything under /etc when any destination lives there.
    #[arg(long, value_name = "PATH")]
    pub config_files: Vec<String>,

    /// Mark a file or directory in the package as documentation. Repeatable.
    /// Defaults to everything under /usr/share when any destination lives
    /// there.
    #[arg(long, value_name = "PATH")]
    pub doc_files: Vec<String>,

    /// Create a symlink, given as TARGET=LINK. Repeatable.
    #[arg(long, value_name = "TARGET=LINK")]
    pub symlink_files: Vec<String>,

    /// A script to be run before package installation.
    #[arg(long, alias = "pre-install", value_name = "FILE")]
    pub before_install: Option<String>,

    /// A script to be run after package installation.
    #[arg(long, alias = "post-install", value_name = "FILE")]
    pub after_install: Option<String>,

    /// A script to be run before package removal.
    #[arg(long, alias = "pre-uninstall", value_name = "FILE")]
    pub before_remove: Option<String>,

    /// A script to be run after package removal.
    #[arg(long, alias = "post-uninstall", value_name = "FILE")]
    pub after_remove: Option<String>,

    /// A script to be run before package upgrade (rpm and apk only).
    #[arg(long, value_name = "FILE")]
    pub before_upgrade: Option<String>,

    /// A script to be run after package upgrade (rpm and apk only).
    #[arg(long, value_name = "FILE")]
    pub after_upgrade: Option<String>,

    /// fpm compatibility flag, accepted and ignored.
    #[arg(long, hide = true)]
    pub no_deb_systemd_restart_after_upgrade: bool,

    /// Path to a defaults file. pakr.toml in the working directory is used
    /// when present and this flag is not given.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug output.
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress everything except errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Files to add to the package, each optionally remapped with =DEST.
    #[arg(value_name = "FILE[=DEST]")]
    pub files: Vec<String>,
}

impl Cli {
    /// Run the build pipeline and write the package.
    pub fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_default()?,
        };

        let format = self
            .output_type
            .or(config.defaults.output_type)
            .unwrap_or(OutputFormat::Rpm);
        debug!(%format, "resolved output format");

        let mut info = self.package_info(&config);
        info.normalize();
        info.finalize(format);

        let manifest = self.build_manifest()?;
        info.validate()?;

        let serializer = format.serializer();
        let file_name = match &self.package {
            Some(template) => render_name_template(template, &info),
            None => serializer.conventional_file_name(&info),
        };
        let target = match &self.target {
            Some(dir) => Path::new(dir).join(&file_name),
            None => PathBuf::from(&file_name),
        };

        write_package(
            serializer.as_ref(),
            &format.to_string(),
            &info,
            &manifest,
            &target,
            self.force,
        )?;

        if !self.quiet {
            println!("created package: {}", target.display());
        }
        Ok(())
    }

    fn package_info(&self, config: &Config) -> PackageInfo {
        let defaults = &config.defaults;
        let pick = |flag: &Option<String>, default: &Option<String>| {
            flag.clone().or_else(|| default.clone()).unwrap_or_default()
        };
        PackageInfo {
            name: self.name.clone().unwrap_or_default(),
            version: self.version.clone().unwrap_or_default(),
            release: self.iteration.clone(),
            arch: self.architecture.clone().unwrap_or_default(),
            platform: self.platform.clone().unwrap_or_default(),
            license: pick(&self.license, &defaults.license),
            maintainer: pick(&self.maintainer, &defaults.maintainer),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| "no description".to_string()),
            homepage: pick(&self.url, &defaults.homepage),
            section: self
                .category
                .clone()
                .or_else(|| defaults.section.clone())
                .unwrap_or_else(|| "none".to_string()),
            scripts: Scripts {
                pre_install: self.before_install.clone(),
                post_install: self.after_install.clone(),
                pre_remove: self.before_remove.clone(),
                post_remove: self.after_remove.clone(),
                pre_upgrade: self.before_upgrade.clone(),
                post_upgrade: self.after_upgrade.clone(),
            },
        }
    }

    fn build_manifest(&self) -> Result<Manifest> {
        let mut manifest = Manifest::new();

        match &self.chdir {
            Some(dir) => {
                // Expansion happens inside the search directory, then the
                // relative sources are rebased so later reads work from the
                // original working directory.
                let previous = std::env::current_dir()?;
                std::env::set_current_dir(dir)
                    .with_context(|| format!("failed to change into search directory {dir}"))?;
                let result = manifest.add_files(&self.files);
                std::env::set_current_dir(&previous)
                    .context("failed to restore working directory")?;
                result?;
                manifest.rebase_sources(dir);
            }
            None => manifest.add_files(&self.files)?,
        }

        manifest.add_symlinks(&self.symlink_files)?;

        for (explicit, prefix, role) in [
            (&self.config_files, "/etc", Role::Config),
            (&self.doc_files, "/usr/share", Role::Doc),
        ] {
            if explicit.is_empty() {
                if let Some(paths) = manifest.infer_role_paths(prefix) {
                    debug!(prefix, %role, "applying default role paths");
                    manifest.mark_role(&paths, role);
                }
            } else {
                manifest.mark_role(explicit, role);
            }
        }

        manifest.validate()?;
        Ok(manifest)
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
