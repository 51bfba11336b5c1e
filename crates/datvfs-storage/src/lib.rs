//! Layered asset resolution for DAT-based game data.
//!
//! Game code asks for assets by logical path (`art\items\sword.frm`). This
//! crate answers from an ordered list of sources, most recent first:
//!
//! - **Archive sources**: opened [`DatArchive`](datvfs_formats::dat::DatArchive) catalogues
//! - **Directory sources**: loose files below a directory
//! - **Working directory**: a last resort for anything not found above
//!
//! Registering a source that is already known moves it to the front, which
//! is the whole mod override mechanism: whatever was registered or touched
//! last wins.
//!
//! # Example
//!
//! ```rust,no_run
//! use datvfs_storage::{OpenMode, Resolver};
//! use std::io::Read;
//!
//! let mut resolver = Resolver::new();
//! resolver.reset("master.dat;data")?;
//!
//! let mut file = resolver.open("text\\english\\game\\misc.msg", OpenMode::READ_TEXT)?;
//! let mut text = String::new();
//! file.read_to_string(&mut text)?;
//!
//! for name in resolver.list_files("maps\\*.map") {
//!     println!("{name}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use thiserror::Error;

// Path helpers for the host filesystem
pub mod native;

// Stream kinds behind a resolved file
pub mod stream;

// Source list and path resolution
pub mod resolver;

// Pattern enumeration and name lists
pub mod enumerate;

// Configuration
pub mod config;

// Mod overlay loading
pub mod mods;

// Startup registration sequence
pub mod database;

pub use config::{DatabaseConfig, ModsConfig};
pub use database::DatabaseReport;
pub use datvfs_formats::dat::{DatError, OpenMode};
pub use enumerate::{EntryKind, FoundEntry};
pub use mods::{ModLoadReport, ModManifest, load_mods};
pub use resolver::{Resolver, Source, SourceKind};
pub use stream::{StreamKind, VfsFile, VfsStream};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while resolving or loading assets.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be read.
    #[error("Archive error: {0}")]
    Archive(#[from] DatError),

    /// No source could provide the path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A source path is neither an archive nor a usable directory.
    #[error("Cannot register source {path}: {source}")]
    Registration {
        /// The path passed to registration
        path: String,
        /// Why the directory could not be created
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Check if this error means the asset does not exist anywhere
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Archive(e) => e.is_not_found(),
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Version information for the storage crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Separator used between paths in a source list.
pub const SOURCE_LIST_SEPARATOR: char = ';';
