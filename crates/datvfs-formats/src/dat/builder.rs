//! DAT archive writer
//!
//! Produces archives in the layout the reader expects: payloads first, then
//! the entry table, then the footer. Used to build fixtures and small
//! test archives.

use crate::dat::constants::FOOTER_SIZE;
use crate::dat::entry::{DatEntry, DatFooter, normalize_path};
use crate::dat::error::{DatError, DatResult};
use binrw::{BinWrite, BinWriterExt};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::{Cursor, Write};
use std::path::Path;

#[derive(Debug, Clone)]
struct PendingFile {
    path: String,
    data: Vec<u8>,
    compress: bool,
}

/// Builder for DAT archives
///
/// Paths keep their case on disk; the reader lowercases them on load.
#[derive(Debug, Clone)]
pub struct DatBuilder {
    files: Vec<PendingFile>,
    sorted: bool,
    leading: Vec<u8>,
}

impl Default for DatBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            sorted: true,
            leading: Vec::new(),
        }
    }

    /// Add an entry stored as-is
    pub fn add_file(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.push(path.into(), data.into(), false)
    }

    /// Add a zlib-compressed entry
    pub fn add_compressed(
        &mut self,
        path: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(path.into(), data.into(), true)
    }

    fn push(&mut self, path: String, data: Vec<u8>, compress: bool) -> &mut Self {
        self.files.push(PendingFile {
            path: path.replace('/', "\\"),
            data,
            compress,
        });
        self
    }

    /// Write entries in insertion order instead of sorting them
    ///
    /// Only useful for producing deliberately malformed archives.
    pub fn unsorted(mut self) -> Self {
        self.sorted = false;
        self
    }

    /// Prefix the archive with bytes that belong to no entry
    pub fn with_leading_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.leading = bytes.into();
        self
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no entries were added
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize the archive into memory
    pub fn build(&self) -> DatResult<Vec<u8>> {
        let mut files: Vec<&PendingFile> = self.files.iter().collect();
        if self.sorted {
            files.sort_by_cached_key(|file| normalize_path(&file.path));
        }

        let mut out = Cursor::new(Vec::new());
        out.write_all(&self.leading)?;
        let data_start = self.leading.len() as u64;

        let mut entries = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let payload = if file.compress {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&file.data)?;
                encoder.finish()?
            } else {
                file.data.clone()
            };

            let data_offset = out.position() - data_start;
            entries.push(DatEntry {
                path: file.path.clone(),
                compressed: file.compress,
                uncompressed_size: to_u32(file.data.len() as u64, index)?,
                stored_size: to_u32(payload.len() as u64, index)?,
                data_offset: to_u32(data_offset, index)?,
            });
            out.write_all(&payload)?;
        }

        let table_start = out.position();
        out.write_le(&to_u32(entries.len() as u64, entries.len())?)?;
        for entry in &entries {
            out.write_le(entry)?;
        }
        let table_end = out.position();

        let footer = DatFooter {
            entry_table_size: to_u32(table_end - table_start, entries.len())?,
            data_section_size: to_u32(table_end + FOOTER_SIZE - data_start, entries.len())?,
        };
        footer.write(&mut out)?;

        Ok(out.into_inner())
    }

    /// Serialize the archive to a file
    pub fn write_file(&self, path: impl AsRef<Path>) -> DatResult<()> {
        std::fs::write(path, self.build()?)?;
        Ok(())
    }
}

fn to_u32(value: u64, index: usize) -> DatResult<u32> {
    u32::try_from(value).map_err(|_| DatError::InvalidEntry {
        index,
        reason: format!("value {value} does not fit in 32 bits"),
    })
}
