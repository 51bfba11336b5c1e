//! Archive catalogue loading and lookup

use crate::dat::constants::{FOOTER_SIZE, MIN_ENTRY_SIZE};
use crate::dat::entry::{DatEntry, DatEntryArgs, DatFooter, normalize_path};
use crate::dat::error::{DatError, DatResult};
use crate::dat::stream::{DatStream, OpenMode};
use crate::pattern::Pattern;
use binrw::{BinRead, Endian};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// An opened DAT archive
///
/// Holds the parsed catalogue only; payload bytes stay on disk until an
/// entry stream reads them. Each [`DatStream`] opens its own handle on the
/// archive file, so any number of entries can be read at once.
#[derive(Debug, Clone)]
pub struct DatArchive {
    path: PathBuf,
    file_size: u64,
    data_section_offset: u64,
    entries: Vec<DatEntry>,
}

impl DatArchive {
    /// Open and parse the archive at `path`
    pub fn open(path: impl AsRef<Path>) -> DatResult<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        Self::parse(&mut reader, path.to_path_buf())
    }

    /// Parse an archive catalogue from `reader`
    ///
    /// `path` is remembered for opening entry streams later; `reader` must
    /// yield the same bytes as the file at `path`.
    pub fn parse<R: Read + Seek>(reader: &mut R, path: PathBuf) -> DatResult<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        if file_size < FOOTER_SIZE {
            return Err(DatError::Truncated {
                expected: FOOTER_SIZE,
                actual: file_size,
            });
        }

        reader.seek(SeekFrom::Start(file_size - FOOTER_SIZE))?;
        let footer = DatFooter::read(reader)?;
        let table_offset = footer.entry_table_offset(file_size)?;
        let data_section_offset = footer.data_section_offset(file_size)?;
        let table_end = file_size - FOOTER_SIZE;

        // Pull the whole table into memory and parse from there
        reader.seek(SeekFrom::Start(table_offset))?;
        let mut table = vec![0u8; (table_end - table_offset) as usize];
        reader.read_exact(&mut table)?;

        let entries = parse_table(&table, table_offset)?;
        validate_entries(&entries, data_section_offset, file_size)?;

        Ok(Self {
            path,
            file_size,
            data_section_offset,
            entries,
        })
    }

    /// Path of the archive file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the archive file in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Absolute offset of the data section
    pub fn data_section_offset(&self) -> u64 {
        self.data_section_offset
    }

    /// All entries in catalogue order
    pub fn entries(&self) -> &[DatEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by path
    ///
    /// Matching is case-insensitive and treats `/` and `\` alike.
    pub fn find_entry(&self, path: &str) -> Option<&DatEntry> {
        let key = normalize_path(path);
        self.entries
            .binary_search_by(|entry| entry.path.as_str().cmp(key.as_str()))
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Whether an entry with this path exists
    pub fn contains(&self, path: &str) -> bool {
        self.find_entry(path).is_some()
    }

    /// Iterate over entries whose path matches `pattern`
    ///
    /// The literal prefix of the pattern narrows the scan to a contiguous
    /// range of the sorted catalogue. A malformed pattern yields nothing.
    pub fn find_matching(&self, pattern: &str) -> impl Iterator<Item = &DatEntry> + '_ {
        let compiled = Pattern::new(normalize_path(pattern)).ok();
        let (start, prefix) = match &compiled {
            Some(pattern) => {
                let prefix = pattern.literal_prefix().to_string();
                let start = self
                    .entries
                    .partition_point(|entry| entry.path.as_str() < prefix.as_str());
                (start, prefix)
            }
            None => (self.entries.len(), String::new()),
        };

        self.entries[start..]
            .iter()
            .take_while(move |entry| entry.path.starts_with(prefix.as_str()))
            .filter(move |entry| {
                compiled
                    .as_ref()
                    .is_some_and(|pattern| pattern.matches(&entry.path))
            })
    }

    /// Open a read stream over the entry at `path`
    pub fn open_entry(&self, path: &str, mode: OpenMode) -> DatResult<DatStream> {
        let entry = self
            .find_entry(path)
            .ok_or_else(|| DatError::EntryNotFound(path.to_string()))?;

        if mode.is_write() {
            return Err(DatError::ReadOnly(path.to_string()));
        }

        DatStream::open(self, entry.clone(), mode)
    }

    /// Read the entire contents of the entry at `path`
    pub fn read_entry(&self, path: &str) -> DatResult<Vec<u8>> {
        let mut stream = self.open_entry(path, OpenMode::READ)?;
        let mut data = Vec::with_capacity(stream.len() as usize);
        stream.read_to_end(&mut data)?;
        Ok(data)
    }
}

fn parse_table(table: &[u8], table_offset: u64) -> DatResult<Vec<DatEntry>> {
    let table_end = table.len() as u64;
    let mut cursor = Cursor::new(table);

    let count = u32::read_options(&mut cursor, Endian::Little, ()).map_err(|_| {
        DatError::InvalidFooter {
            reason: format!("entry table at offset {table_offset} has no count field"),
        }
    })? as usize;

    // Every record needs at least MIN_ENTRY_SIZE bytes
    let available = (table_end - cursor.position()) as usize;
    if count > available / MIN_ENTRY_SIZE {
        return Err(DatError::InvalidEntry {
            index: available / MIN_ENTRY_SIZE,
            reason: format!("table declares {count} entries but holds at most {available} bytes"),
        });
    }

    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let entry = DatEntry::read_options(&mut cursor, Endian::Little, DatEntryArgs { table_end })
            .map_err(|e| DatError::InvalidEntry {
                index,
                reason: e.to_string(),
            })?;
        entries.push(entry);
    }

    Ok(entries)
}

fn validate_entries(entries: &[DatEntry], data_section_offset: u64, file_size: u64) -> DatResult<()> {
    if let Some(pair) = entries.windows(2).find(|pair| pair[0].path > pair[1].path) {
        return Err(DatError::UnsortedEntries {
            previous: pair[0].path.clone(),
            next: pair[1].path.clone(),
        });
    }

    for (index, entry) in entries.iter().enumerate() {
        let end = data_section_offset + u64::from(entry.data_offset) + entry.payload_len();
        if end > file_size {
            return Err(DatError::InvalidEntry {
                index,
                reason: format!(
                    "payload of {:?} ends at {end}, past the end of a {file_size} byte file",
                    entry.path
                ),
            });
        }
    }

    Ok(())
}
