//! Streaming reads over a single archive entry

use crate::dat::archive::DatArchive;
use crate::dat::constants::STAGING_BUFFER_SIZE;
use crate::dat::entry::DatEntry;
use crate::dat::error::{DatError, DatResult};
use flate2::{Decompress, FlushDecompress, Status};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::str::FromStr;

/// How a stream is opened
///
/// Parsed from C-style mode strings such as `"rb"`, `"rt"` or `"w"`. Only
/// the access direction and the text flag matter here; archive streams
/// reject every mode that writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenMode {
    /// Write, append or update access was requested
    pub write: bool,
    /// Text mode: CRLF pairs are read as a single `\n`
    pub text: bool,
}

impl OpenMode {
    /// Binary read
    pub const READ: Self = Self {
        write: false,
        text: false,
    };

    /// Text read
    pub const READ_TEXT: Self = Self {
        write: false,
        text: true,
    };

    /// Binary write
    pub const WRITE: Self = Self {
        write: true,
        text: false,
    };

    /// Parse a C-style mode string
    ///
    /// Any of `w`, `a` or `+` requests write access; `t` selects text mode.
    /// Unknown characters are ignored, and an empty string means binary read.
    pub fn parse(mode: &str) -> Self {
        let mut parsed = Self::default();
        for c in mode.chars() {
            match c {
                'w' | 'a' | '+' => parsed.write = true,
                't' => parsed.text = true,
                _ => {}
            }
        }
        parsed
    }

    /// Whether any form of write access was requested
    pub const fn is_write(self) -> bool {
        self.write
    }
}

impl FromStr for OpenMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.write { "w" } else { "r" })?;
        f.write_str(if self.text { "t" } else { "b" })
    }
}

/// Incremental zlib state for one compressed entry
struct Inflater {
    decompress: Decompress,
    staging: Box<[u8]>,
    start: usize,
    end: usize,
    /// Compressed bytes pulled from the archive so far
    consumed: u64,
}

impl Inflater {
    fn new() -> Self {
        Self {
            decompress: Decompress::new(true),
            staging: vec![0u8; STAGING_BUFFER_SIZE].into_boxed_slice(),
            start: 0,
            end: 0,
            consumed: 0,
        }
    }

    fn reset(&mut self) {
        self.decompress.reset(true);
        self.start = 0;
        self.end = 0;
        self.consumed = 0;
    }

    /// Fill `out` completely with decompressed bytes
    ///
    /// Once all compressed input has been staged the decompressor may
    /// still hold output back, so it keeps being called with empty input
    /// until it stops producing.
    fn inflate<R: Read>(&mut self, reader: &mut R, stored_size: u64, out: &mut [u8]) -> DatResult<()> {
        let mut written = 0;

        while written < out.len() {
            if self.start == self.end {
                let remaining = stored_size.saturating_sub(self.consumed);
                if remaining > 0 {
                    let want = remaining.min(STAGING_BUFFER_SIZE as u64) as usize;
                    reader.read_exact(&mut self.staging[..want]).map_err(|e| {
                        DatError::Decompression(format!("failed to read compressed payload: {e}"))
                    })?;
                    self.start = 0;
                    self.end = want;
                    self.consumed += want as u64;
                }
            }
            let exhausted = self.start == self.end;

            let in_before = self.decompress.total_in();
            let out_before = self.decompress.total_out();
            let status = self
                .decompress
                .decompress(
                    &self.staging[self.start..self.end],
                    &mut out[written..],
                    FlushDecompress::None,
                )
                .map_err(|e| DatError::Decompression(e.to_string()))?;

            let used = (self.decompress.total_in() - in_before) as usize;
            let produced = (self.decompress.total_out() - out_before) as usize;
            self.start += used;
            written += produced;

            if status == Status::StreamEnd && written < out.len() {
                return Err(DatError::Decompression(
                    "zlib stream ended before end of entry".to_string(),
                ));
            }
            if used == 0 && produced == 0 {
                return Err(DatError::Decompression(if exhausted {
                    "compressed payload exhausted before end of entry".to_string()
                } else {
                    "decompressor made no progress".to_string()
                }));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StreamFlags {
    eof: bool,
    error: bool,
    text: bool,
}

/// A read stream over one archive entry
///
/// The stream owns its own handle on the archive file. Compressed entries
/// are inflated on the fly through a small staging buffer, so memory use
/// does not grow with entry size.
///
/// # Seeking
///
/// - Binary streams seek anywhere in `0..=len`
/// - Compressed streams seek forward by decompressing and discarding;
///   seeking backwards restarts decompression from the beginning
/// - Text streams can only seek to the start (or stay where they are)
///
/// # Errors
///
/// A decompression failure is sticky: every later read and seek fails
/// until [`DatStream::rewind`] is called.
pub struct DatStream {
    entry: DatEntry,
    reader: BufReader<File>,
    data_start: u64,
    inflater: Option<Inflater>,
    position: u64,
    flags: StreamFlags,
    /// Byte read past a lone CR in an uncompressed text stream
    pending: Option<u8>,
    /// Byte inflated past a lone CR in a compressed text stream
    inflated_pending: Option<u8>,
}

impl fmt::Debug for DatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatStream")
            .field("path", &self.entry.path)
            .field("position", &self.position)
            .field("size", &self.entry.uncompressed_size)
            .field("compressed", &self.entry.compressed)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl DatStream {
    pub(crate) fn open(archive: &DatArchive, entry: DatEntry, mode: OpenMode) -> DatResult<Self> {
        let data_start = archive.data_section_offset() + u64::from(entry.data_offset);
        let reader = open_reader(archive, data_start)?;
        let inflater = entry.compressed.then(Inflater::new);

        Ok(Self {
            entry,
            reader,
            data_start,
            inflater,
            position: 0,
            flags: StreamFlags {
                text: mode.text,
                ..StreamFlags::default()
            },
            pending: None,
            inflated_pending: None,
        })
    }

    /// Point this stream at another entry, keeping the decompressor
    ///
    /// On failure the stream is left unchanged.
    pub fn reopen(&mut self, archive: &DatArchive, path: &str, mode: OpenMode) -> DatResult<()> {
        let entry = archive
            .find_entry(path)
            .cloned()
            .ok_or_else(|| DatError::EntryNotFound(path.to_string()))?;
        if mode.is_write() {
            return Err(DatError::ReadOnly(path.to_string()));
        }

        let data_start = archive.data_section_offset() + u64::from(entry.data_offset);
        self.reader = open_reader(archive, data_start)?;

        if entry.compressed {
            match &mut self.inflater {
                Some(inflater) => inflater.reset(),
                None => self.inflater = Some(Inflater::new()),
            }
        } else {
            self.inflater = None;
        }

        self.entry = entry;
        self.data_start = data_start;
        self.position = 0;
        self.flags = StreamFlags {
            text: mode.text,
            ..StreamFlags::default()
        };
        self.pending = None;
        self.inflated_pending = None;
        Ok(())
    }

    /// The catalogue entry this stream reads
    pub fn entry(&self) -> &DatEntry {
        &self.entry
    }

    /// Uncompressed size of the entry
    pub fn len(&self) -> u64 {
        u64::from(self.entry.uncompressed_size)
    }

    /// Whether the entry is empty
    pub fn is_empty(&self) -> bool {
        self.entry.uncompressed_size == 0
    }

    /// Current logical position
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Whether a read has hit the end of the entry
    pub fn is_eof(&self) -> bool {
        self.flags.eof
    }

    /// Whether the stream is in its sticky error state
    pub fn has_failed(&self) -> bool {
        self.flags.error
    }

    /// Whether the stream was opened in text mode
    pub fn is_text(&self) -> bool {
        self.flags.text
    }

    /// Read bytes into `buf`, returning how many were read
    ///
    /// Returns 0 at end of entry. Binary reads never return more than
    /// the bytes left in the entry.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> DatResult<usize> {
        if self.flags.error {
            return Err(DatError::StreamFailed);
        }
        if self.flags.eof || buf.is_empty() {
            return Ok(0);
        }

        let result = if self.flags.text {
            self.read_text(buf)
        } else {
            self.read_binary(buf)
        };

        if result.is_err() {
            self.flags.error = true;
        }
        result
    }

    /// Read a single byte, or `None` at end of entry
    pub fn read_char(&mut self) -> DatResult<Option<u8>> {
        if self.flags.error {
            return Err(DatError::StreamFailed);
        }
        if self.flags.eof {
            return Ok(None);
        }

        match self.next_char() {
            Ok(Some(ch)) => Ok(Some(ch)),
            Ok(None) => {
                self.flags.eof = true;
                Ok(None)
            }
            Err(e) => {
                self.flags.error = true;
                Err(e)
            }
        }
    }

    /// Read one line of at most `max - 1` bytes
    ///
    /// The line keeps its trailing `\n` if one was read. Returns `None`
    /// when nothing could be read.
    pub fn read_line(&mut self, max: usize) -> DatResult<Option<Vec<u8>>> {
        if self.flags.error {
            return Err(DatError::StreamFailed);
        }
        if self.flags.eof || max < 2 {
            return Ok(None);
        }

        let mut line = Vec::new();
        while line.len() < max - 1 {
            let ch = match self.next_char() {
                Ok(Some(ch)) => ch,
                Ok(None) => break,
                Err(e) => {
                    self.flags.error = true;
                    return Err(e);
                }
            };
            line.push(ch);
            if ch == b'\n' {
                break;
            }
        }

        Ok((!line.is_empty()).then_some(line))
    }

    /// Move to a new logical position
    pub fn seek_to(&mut self, pos: SeekFrom) -> DatResult<u64> {
        if self.flags.error {
            return Err(DatError::StreamFailed);
        }
        if self.flags.text && !matches!(pos, SeekFrom::Start(0) | SeekFrom::Current(0)) {
            return Err(DatError::UnsupportedSeek);
        }

        let size = self.len();
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
        };
        if target < 0 || target > i128::from(size) {
            return Err(DatError::SeekOutOfRange { target, size });
        }
        let target = target as u64;

        if target == self.position {
            self.flags.eof = false;
            return Ok(target);
        }

        if target == 0 {
            self.restart()?;
            return Ok(0);
        }

        if self.entry.compressed {
            if target < self.position {
                self.restart()?;
            }
            if let Err(e) = self.skip_forward(target - self.position) {
                self.flags.error = true;
                return Err(e);
            }
        } else {
            self.reader.seek(SeekFrom::Start(self.data_start + target))?;
            self.pending = None;
            self.position = target;
        }

        self.flags.eof = false;
        Ok(target)
    }

    /// Return to the start of the entry, clearing EOF and error state
    pub fn rewind(&mut self) -> DatResult<()> {
        self.flags.error = false;
        if let Err(e) = self.restart() {
            self.flags.error = true;
            return Err(e);
        }
        Ok(())
    }

    fn restart(&mut self) -> DatResult<()> {
        self.reader.seek(SeekFrom::Start(self.data_start))?;
        if let Some(inflater) = &mut self.inflater {
            inflater.reset();
        }
        self.position = 0;
        self.pending = None;
        self.inflated_pending = None;
        self.flags.eof = false;
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position)
    }

    fn read_binary(&mut self, buf: &mut [u8]) -> DatResult<usize> {
        let remaining = self.remaining();
        let mut want = buf.len();
        if (want as u64) > remaining {
            want = remaining as usize;
            self.flags.eof = true;
        }
        if want == 0 {
            return Ok(0);
        }

        if self.entry.compressed {
            self.read_compressed(&mut buf[..want])?;
            return Ok(want);
        }

        let mut filled = 0;
        if let Some(byte) = self.pending.take() {
            buf[0] = byte;
            filled = 1;
        }
        while filled < want {
            let n = self.reader.read(&mut buf[filled..want])?;
            if n == 0 {
                self.flags.eof = true;
                break;
            }
            filled += n;
        }

        self.position += filled as u64;
        Ok(filled)
    }

    fn read_text(&mut self, buf: &mut [u8]) -> DatResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.next_char()? {
                Some(ch) => {
                    buf[filled] = ch;
                    filled += 1;
                }
                None => {
                    self.flags.eof = true;
                    break;
                }
            }
        }
        Ok(filled)
    }

    /// Next logical byte, collapsing CRLF in text mode
    fn next_char(&mut self) -> DatResult<Option<u8>> {
        let size = self.len();
        if self.position >= size {
            return Ok(None);
        }

        if self.entry.compressed {
            let mut byte = [0u8];
            self.read_compressed(&mut byte)?;
            let mut ch = byte[0];

            if self.flags.text && ch == b'\r' && self.position < size {
                let mut next = [0u8];
                self.read_compressed(&mut next)?;
                if next[0] == b'\n' {
                    ch = b'\n';
                } else {
                    self.inflated_pending = Some(next[0]);
                    self.position -= 1;
                }
            }
            return Ok(Some(ch));
        }

        let Some(mut ch) = self.next_raw_byte()? else {
            return Ok(None);
        };

        if self.flags.text && ch == b'\r' && self.position + 1 < size {
            match self.next_raw_byte()? {
                Some(b'\n') => {
                    ch = b'\n';
                    self.position += 1;
                }
                Some(other) => self.pending = Some(other),
                None => {}
            }
        }

        self.position += 1;
        Ok(Some(ch))
    }

    fn next_raw_byte(&mut self) -> DatResult<Option<u8>> {
        if let Some(byte) = self.pending.take() {
            return Ok(Some(byte));
        }
        let mut byte = [0u8];
        match self.reader.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn read_compressed(&mut self, out: &mut [u8]) -> DatResult<()> {
        if out.is_empty() {
            return Ok(());
        }

        let mut offset = 0;
        if let Some(byte) = self.inflated_pending.take() {
            out[0] = byte;
            self.position += 1;
            offset = 1;
        }
        if offset == out.len() {
            return Ok(());
        }

        let stored_size = u64::from(self.entry.stored_size);
        let inflater = self.inflater.as_mut().ok_or_else(|| {
            DatError::Decompression("compressed entry has no decompressor".to_string())
        })?;
        inflater.inflate(&mut self.reader, stored_size, &mut out[offset..])?;
        self.position += (out.len() - offset) as u64;
        Ok(())
    }

    fn skip_forward(&mut self, mut distance: u64) -> DatResult<()> {
        let mut scratch = [0u8; STAGING_BUFFER_SIZE];
        while distance > 0 {
            let chunk = distance.min(scratch.len() as u64) as usize;
            self.read_compressed(&mut scratch[..chunk])?;
            distance -= chunk as u64;
        }
        Ok(())
    }
}

fn open_reader(archive: &DatArchive, data_start: u64) -> DatResult<BufReader<File>> {
    let mut reader = BufReader::with_capacity(STAGING_BUFFER_SIZE, File::open(archive.path())?);
    reader.seek(SeekFrom::Start(data_start))?;
    Ok(reader)
}

impl Read for DatStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl Seek for DatStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_to(pos).map_err(Into::into)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}
