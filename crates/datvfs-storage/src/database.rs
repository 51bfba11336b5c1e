//! Startup registration sequence
//!
//! Registration order decides priority, so the sequence matters:
//!
//! 1. master archive, then its loose-file overlay
//! 2. critter archive, then its loose-file overlay
//! 3. `patch000.dat` .. `patch999.dat` found in the base directory
//! 4. mods, in manifest order
//!
//! Each step lands in front of the previous ones, so mods override
//! everything and the master archive is consulted last.

use crate::config::DatabaseConfig;
use crate::mods::{ModLoadReport, load_mods};
use crate::resolver::Resolver;
use crate::Result;
use tracing::{info, warn};

/// Highest numbered patch archive probed at startup, exclusive
pub const NUMBERED_PATCH_LIMIT: u32 = 1000;

/// Outcome of [`Resolver::open_database`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseReport {
    /// Numbered patch archives that were registered
    pub patches: Vec<String>,
    /// Mod loading outcome, when mods are enabled
    pub mods: Option<ModLoadReport>,
}

/// File name of numbered patch archive `index`
pub fn numbered_patch_name(index: u32) -> String {
    format!("patch{index:03}.dat")
}

impl Resolver {
    /// Register the game's data sources described by `config`
    ///
    /// A main archive that cannot be registered is an error. Overlay,
    /// numbered patch and mod failures are logged and skipped.
    pub fn open_database(&mut self, config: &DatabaseConfig) -> Result<DatabaseReport> {
        self.open_pair(&config.master_dat, &config.master_patches)?;
        self.open_pair(&config.critter_dat, &config.critter_patches)?;

        let mut report = DatabaseReport::default();

        if config.numbered_patches {
            for index in 0..NUMBERED_PATCH_LIMIT {
                let name = numbered_patch_name(index);
                if !self.native_path(&name).exists() {
                    continue;
                }
                match self.register_source(&name) {
                    Ok(()) => report.patches.push(name),
                    Err(e) => warn!(path = %name, error = %e, "Skipping numbered patch"),
                }
            }
        }

        if config.load_mods {
            report.mods = Some(load_mods(self, &config.mods)?);
        }

        info!(
            sources = self.len(),
            patches = report.patches.len(),
            "Database opened"
        );
        Ok(report)
    }

    fn open_pair(&mut self, main: &str, patches: &str) -> Result<()> {
        if !main.is_empty() {
            self.register_source(main)?;
        }

        if !patches.is_empty()
            && let Err(e) = self.register_source(patches)
        {
            warn!(path = %patches, error = %e, "Skipping patch overlay");
        }

        Ok(())
    }
}
