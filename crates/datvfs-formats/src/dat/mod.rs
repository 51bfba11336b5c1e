//! DAT archive container
//!
//! A DAT archive is a flat container of named entries. Payloads come
//! first, followed by the entry table and an 8-byte footer:
//!
//! ```text
//! +--------------------+  <- data section start (file_size - data_section_size)
//! | payloads           |
//! +--------------------+  <- file_size - 8 - entry_table_size
//! | u32 entry count    |
//! | entry records ...  |
//! +--------------------+  <- file_size - 8
//! | u32 entry_table_sz |
//! | u32 data_section_sz|
//! +--------------------+
//! ```
//!
//! Each entry record is, little-endian:
//!
//! | Field | Size |
//! |-------|------|
//! | path length | u32 |
//! | path bytes | path length |
//! | compressed flag | u8 (1 = zlib) |
//! | uncompressed size | u32 |
//! | stored size | u32 |
//! | data offset (from data section start) | u32 |
//!
//! Records are sorted by case-insensitive path so lookups binary search.
//!
//! # Usage
//!
//! ```rust,no_run
//! use datvfs_formats::dat::{DatArchive, OpenMode};
//! use std::io::Read;
//!
//! let archive = DatArchive::open("master.dat")?;
//! let mut stream = archive.open_entry("text\\english\\game\\misc.msg", OpenMode::READ_TEXT)?;
//!
//! let mut text = String::new();
//! stream.read_to_string(&mut text)?;
//!
//! for entry in archive.find_matching("art\\critters\\*.frm") {
//!     println!("{} ({} bytes)", entry.path, entry.uncompressed_size);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
#[cfg(any(test, feature = "builder"))]
mod builder;
mod entry;
mod error;
mod stream;


pub use archive::DatArchive;
#[cfg(any(test, feature = "builder"))]
pub use builder::DatBuilder;
pub use entry::{DatEntry, DatEntryArgs, DatFooter, normalize_path};
pub use error::{DatError, DatResult};
pub use stream::{DatStream, OpenMode};

/// DAT format constants
pub mod constants {
    /// Size of the trailing footer in bytes
    pub const FOOTER_SIZE: u64 = 8;

    /// Smallest possible entry record (empty path)
    pub const MIN_ENTRY_SIZE: usize = 17;

    /// Compressed bytes pulled from the archive per refill
    pub const STAGING_BUFFER_SIZE: usize = 0x400;
}
