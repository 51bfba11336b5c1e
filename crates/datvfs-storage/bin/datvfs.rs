//! datvfs command-line entry point.
//!
//! A thin wrapper around the datvfs-storage library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Registers sources from `--sources` and `--config`
//! 4. Runs one inspection command
//!
//! Logs go to stderr so `cat` output can be piped.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datvfs_formats::dat::DatArchive;
use datvfs_storage::{DatabaseConfig, OpenMode, Resolver};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Command-line options
#[derive(Debug, Parser)]
#[command(
    name = "datvfs",
    about = "Inspect DAT archives and resolve asset paths across layered sources",
    version
)]
struct Cli {
    /// Semicolon-separated source list, registered in order (last wins)
    #[arg(long, env = "DATVFS_SOURCES", global = true)]
    sources: Option<String>,

    /// JSON database configuration, registered after --sources
    #[arg(long, env = "DATVFS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the catalogue of one archive
    Entries {
        /// Archive file
        archive: PathBuf,

        /// Only list entries matching this pattern
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Resolve a logical path and copy its contents to stdout
    Cat {
        /// Logical path, e.g. text\english\game\misc.msg
        path: String,

        /// Open in text mode (CRLF read as LF)
        #[arg(long)]
        text: bool,
    },

    /// List unique file names matching a pattern
    Ls {
        /// Pattern, e.g. art\critters\*.frm
        pattern: String,
    },

    /// Print registered sources in priority order
    Sources,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Entries { archive, pattern } = &cli.command {
        return list_entries(archive, pattern.as_deref());
    }

    let resolver = build_resolver(&cli)?;
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Command::Cat { path, text } => {
            let mode = if *text {
                OpenMode::READ_TEXT
            } else {
                OpenMode::READ
            };
            let mut file = resolver
                .open(path, mode)
                .with_context(|| format!("cannot open {path}"))?;
            tracing::debug!(path, kind = %file.kind(), "Resolved");
            io::copy(&mut file, &mut stdout)?;
        }
        Command::Ls { pattern } => {
            for name in resolver.list_files(pattern) {
                writeln!(stdout, "{name}")?;
            }
        }
        Command::Sources => {
            for (priority, source) in resolver.sources().iter().enumerate() {
                let kind = if source.is_archive() {
                    "archive"
                } else {
                    "directory"
                };
                writeln!(stdout, "{priority}\t{kind}\t{}", source.path())?;
            }
        }
        Command::Entries { .. } => {}
    }

    stdout.flush()?;
    Ok(())
}

fn build_resolver(cli: &Cli) -> Result<Resolver> {
    let mut resolver = Resolver::new();

    if let Some(list) = &cli.sources {
        resolver
            .reset(list)
            .with_context(|| format!("cannot register sources {list:?}"))?;
    }

    if let Some(path) = &cli.config {
        let config = DatabaseConfig::from_json_file(path)?;
        let report = resolver.open_database(&config)?;
        tracing::info!(
            patches = report.patches.len(),
            mods = report.mods.as_ref().map_or(0, |mods| mods.loaded.len()),
            "Configuration applied"
        );
    }

    Ok(resolver)
}

fn list_entries(path: &Path, pattern: Option<&str>) -> Result<()> {
    let archive =
        DatArchive::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut stdout = io::stdout().lock();

    let entries: Vec<_> = match pattern {
        Some(pattern) => archive.find_matching(pattern).collect(),
        None => archive.entries().iter().collect(),
    };

    for entry in entries {
        writeln!(
            stdout,
            "{}\t{}\t{}\t{}",
            entry.path,
            entry.uncompressed_size,
            entry.stored_size,
            if entry.compressed { "zlib" } else { "stored" }
        )?;
    }

    stdout.flush()?;
    Ok(())
}
