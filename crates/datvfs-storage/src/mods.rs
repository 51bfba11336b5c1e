//! Mod overlay loading
//!
//! Mods are archives or folders inside the mods directory. Their load order
//! comes from a manifest with one entry per line; later entries override
//! earlier ones. When the manifest is missing it is generated from the
//! `*.dat` files found in the mods directory.
//!
//! ```text
//! ; comments start with ';' or '#'
//! restoration.dat
//! hires_portraits
//! ```

use crate::config::ModsConfig;
use crate::resolver::Resolver;
use crate::stream::VfsFile;
use crate::Result;
use datvfs_formats::dat::OpenMode;
use std::fs;
use std::io;
use tracing::{debug, info, warn};

/// Parsed mod load order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModManifest {
    entries: Vec<String>,
}

impl ModManifest {
    /// Parse manifest text
    ///
    /// Lines are trimmed; blank lines and lines starting with `;` or `#`
    /// are ignored.
    pub fn parse(text: &str) -> Self {
        Self {
            entries: text.lines().filter_map(parse_line).collect(),
        }
    }

    /// Read a manifest line by line from an open file
    pub fn read_from(file: &mut VfsFile) -> io::Result<Self> {
        let mut entries = Vec::new();
        while let Some(line) = file.read_line()? {
            entries.extend(parse_line(&line));
        }
        Ok(Self { entries })
    }

    /// Render a manifest listing `names` in order
    pub fn render(names: &[String]) -> String {
        names.iter().map(|name| format!("{name}\n")).collect()
    }

    /// Entries in load order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

fn parse_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with([';', '#']) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Outcome of [`load_mods`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModLoadReport {
    /// The manifest did not exist and was generated
    pub manifest_created: bool,
    /// Mods registered, in load order
    pub loaded: Vec<String>,
    /// Manifest entries that do not exist or failed to register
    pub skipped: Vec<String>,
}

/// Register every mod listed in the manifest
///
/// Creates the mods directory and the manifest when they are missing. A
/// manifest that cannot be opened loads nothing.
pub fn load_mods(resolver: &mut Resolver, config: &ModsConfig) -> Result<ModLoadReport> {
    let mut report = ModLoadReport::default();

    if !config.directory.is_empty() {
        fs::create_dir_all(resolver.native_path(&config.directory))?;
    }

    let manifest_path = config.manifest_path();
    let manifest_native = resolver.native_path(&manifest_path);
    if !manifest_native.exists() {
        let names = resolver.list_files(&config.archive_pattern());
        info!(
            path = %manifest_native.display(),
            mods = names.len(),
            "Generating mod load order from mods directory"
        );
        fs::write(&manifest_native, ModManifest::render(&names))?;
        report.manifest_created = true;
    }

    let manifest = match resolver.open(&manifest_path, OpenMode::READ_TEXT) {
        Ok(mut file) => ModManifest::read_from(&mut file)?,
        Err(e) => {
            warn!(path = %manifest_path, error = %e, "Cannot open mod load order");
            return Ok(report);
        }
    };

    for entry in manifest.entries() {
        let mod_path = config.entry_path(entry);

        if !resolver.native_path(&mod_path).exists() {
            warn!(path = %mod_path, manifest = %manifest_path, "Skipping missing mod");
            report.skipped.push(mod_path);
            continue;
        }

        match resolver.register_source(&mod_path) {
            Ok(()) => {
                info!(path = %mod_path, "Loaded mod");
                report.loaded.push(mod_path);
            }
            Err(e) => {
                warn!(path = %mod_path, error = %e, "Skipping mod that failed to register");
                report.skipped.push(mod_path);
            }
        }
    }

    debug!(
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        "Mod loading finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_manifest() {
        let manifest = ModManifest::parse(
            "; load order\n  first.dat  \n\n# disabled\nsecond\r\n\t\nthird.dat",
        );
        assert_eq!(manifest.entries(), ["first.dat", "second", "third.dat"]);
    }

    #[test]
    fn test_comment_marker_only_at_line_start() {
        let manifest = ModManifest::parse("odd;name.dat\n ;indented comment\n");
        assert_eq!(manifest.entries(), ["odd;name.dat"]);
    }

    #[test]
    fn test_render() {
        let names = vec!["a.dat".to_string(), "b.dat".to_string()];
        assert_eq!(ModManifest::render(&names), "a.dat\nb.dat\n");
        assert_eq!(ModManifest::render(&[]), "");
    }
}
