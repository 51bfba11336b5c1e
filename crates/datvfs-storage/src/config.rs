//! Configuration for database bootstrap and mod loading

use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where mods live and how their load order is recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModsConfig {
    /// Directory holding mod archives and folders
    pub directory: String,

    /// Load order manifest, relative to `directory`
    pub manifest: String,
}

impl Default for ModsConfig {
    fn default() -> Self {
        Self {
            directory: "mods".to_string(),
            manifest: "mods_order.txt".to_string(),
        }
    }
}

impl ModsConfig {
    /// Set the mods directory
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set the manifest file name
    #[must_use]
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Logical path of the manifest
    pub fn manifest_path(&self) -> String {
        self.entry_path(&self.manifest)
    }

    /// Logical path of a manifest entry
    pub fn entry_path(&self, entry: &str) -> String {
        if self.directory.is_empty() {
            entry.to_string()
        } else {
            format!("{}\\{}", self.directory.trim_end_matches(['\\', '/']), entry)
        }
    }

    /// Pattern matching archives directly inside the mods directory
    pub fn archive_pattern(&self) -> String {
        self.entry_path("*.dat")
    }
}

/// Which archives and overlays to register at startup
///
/// Empty strings disable the corresponding source, so a config file can
/// switch off the critter archive with `"critter_dat": ""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Main game archive
    pub master_dat: String,

    /// Loose-file overlay for the main archive
    pub master_patches: String,

    /// Creature art archive
    pub critter_dat: String,

    /// Loose-file overlay for the creature archive
    pub critter_patches: String,

    /// Register `patch000.dat` through `patch999.dat` when present
    pub numbered_patches: bool,

    /// Load mods after everything else
    pub load_mods: bool,

    /// Mod directory settings
    pub mods: ModsConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            master_dat: "master.dat".to_string(),
            master_patches: "data".to_string(),
            critter_dat: "critter.dat".to_string(),
            critter_patches: "data".to_string(),
            numbered_patches: true,
            load_mods: true,
            mods: ModsConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Set the main archive and its overlay
    #[must_use]
    pub fn with_master(mut self, dat: impl Into<String>, patches: impl Into<String>) -> Self {
        self.master_dat = dat.into();
        self.master_patches = patches.into();
        self
    }

    /// Set the creature archive and its overlay
    #[must_use]
    pub fn with_critter(mut self, dat: impl Into<String>, patches: impl Into<String>) -> Self {
        self.critter_dat = dat.into();
        self.critter_patches = patches.into();
        self
    }

    /// Enable or disable probing for numbered patch archives
    #[must_use]
    pub const fn with_numbered_patches(mut self, enable: bool) -> Self {
        self.numbered_patches = enable;
        self
    }

    /// Enable or disable mod loading
    #[must_use]
    pub const fn with_load_mods(mut self, enable: bool) -> Self {
        self.load_mods = enable;
        self
    }

    /// Set the mod directory settings
    #[must_use]
    pub fn with_mods(mut self, mods: ModsConfig) -> Self {
        self.mods = mods;
        self
    }
}
