//! Entry table records and archive footer

use crate::dat::constants::{FOOTER_SIZE, MIN_ENTRY_SIZE};
use crate::dat::error::{DatError, DatResult};
use binrw::{BinRead, BinResult, BinWrite, Endian};
use std::io::{Read, Seek, Write};

/// Fixed-size footer at the very end of every archive
///
/// Both sizes are measured backwards from the end of the file. The data
/// section starts at offset 0 of a well-formed archive, but archives with
/// leading bytes are still addressable because every offset is relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DatFooter {
    /// Size of the entry table including its leading count field
    pub entry_table_size: u32,
    /// Size of everything from the data section start to the end of file
    pub data_section_size: u32,
}

impl DatFooter {
    /// Absolute offset of the entry table in a file of `file_size` bytes
    pub fn entry_table_offset(&self, file_size: u64) -> DatResult<u64> {
        file_size
            .checked_sub(FOOTER_SIZE)
            .and_then(|end| end.checked_sub(u64::from(self.entry_table_size)))
            .ok_or_else(|| DatError::InvalidFooter {
                reason: format!(
                    "entry table of {} bytes does not fit in a {} byte file",
                    self.entry_table_size, file_size
                ),
            })
    }

    /// Absolute offset of the data section in a file of `file_size` bytes
    pub fn data_section_offset(&self, file_size: u64) -> DatResult<u64> {
        file_size
            .checked_sub(u64::from(self.data_section_size))
            .ok_or_else(|| DatError::InvalidFooter {
                reason: format!(
                    "data section of {} bytes does not fit in a {} byte file",
                    self.data_section_size, file_size
                ),
            })
    }
}

/// One entry of the archive catalogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatEntry {
    /// Path inside the archive
    ///
    /// Entries read from disk are normalized with [`normalize_path`].
    pub path: String,
    /// Whether the payload is zlib compressed
    pub compressed: bool,
    /// Size of the payload after decompression
    pub uncompressed_size: u32,
    /// Size of the payload as stored
    pub stored_size: u32,
    /// Payload offset relative to the data section start
    pub data_offset: u32,
}

impl DatEntry {
    /// Number of payload bytes occupied on disk
    pub fn payload_len(&self) -> u64 {
        if self.compressed {
            u64::from(self.stored_size)
        } else {
            u64::from(self.uncompressed_size)
        }
    }

    /// Size of this record in the serialized entry table
    pub fn serialized_size(&self) -> usize {
        MIN_ENTRY_SIZE + self.path.len()
    }

    /// Final path component, after the last separator
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(self.path.as_str())
    }
}

/// Normalize an archive path for storage and lookup
///
/// Separators become `\` and ASCII letters are lowercased. The backslash
/// keeps the on-disk sort order intact: archives are sorted with `\`, which
/// orders differently from `/`.
pub fn normalize_path(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '/' => '\\',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Arguments for reading a [`DatEntry`]
#[derive(Debug, Clone, Copy)]
pub struct DatEntryArgs {
    /// Absolute offset where the entry table ends
    pub table_end: u64,
}

impl BinRead for DatEntry {
    type Args<'a> = DatEntryArgs;

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let path_len = u32::read_options(reader, endian, ())?;

        // Check the length before allocating for it
        let pos = reader.stream_position()?;
        let remaining = args.table_end.saturating_sub(pos);
        if u64::from(path_len) + (MIN_ENTRY_SIZE as u64 - 4) > remaining {
            return Err(binrw::Error::AssertFail {
                pos,
                message: format!(
                    "path length {path_len} overruns the entry table ({remaining} bytes left)"
                ),
            });
        }

        let mut raw = vec![0u8; path_len as usize];
        reader.read_exact(&mut raw)?;

        let compressed = u8::read_options(reader, endian, ())?;
        let uncompressed_size = u32::read_options(reader, endian, ())?;
        let stored_size = u32::read_options(reader, endian, ())?;
        let data_offset = u32::read_options(reader, endian, ())?;

        Ok(Self {
            path: normalize_path(&String::from_utf8_lossy(&raw)),
            compressed: compressed == 1,
            uncompressed_size,
            stored_size,
            data_offset,
        })
    }
}

impl BinWrite for DatEntry {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        (): Self::Args<'_>,
    ) -> BinResult<()> {
        let path_len = u32::try_from(self.path.len()).map_err(|_| binrw::Error::AssertFail {
            pos: 0,
            message: format!("path of {} bytes is too long", self.path.len()),
        })?;

        path_len.write_options(writer, endian, ())?;
        writer.write_all(self.path.as_bytes())?;
        u8::from(self.compressed).write_options(writer, endian, ())?;
        self.uncompressed_size.write_options(writer, endian, ())?;
        self.stored_size.write_options(writer, endian, ())?;
        self.data_offset.write_options(writer, endian, ())?;
        Ok(())
    }
}
