//! Stream kinds behind a resolved file
//!
//! Resolution picks one of three concrete streams and hides it behind
//! [`VfsFile`]:
//!
//! | Kind | Backing | Seek |
//! |------|---------|------|
//! | [`PlainStream`] | native file | anywhere |
//! | [`DatStream`] | archive entry | see [`DatStream`] |
//! | [`GzipStream`] | gzip-wrapped native file | forward by decompressing, backward by reopening |

use datvfs_formats::dat::DatStream;
use flate2::read::MultiGzDecoder;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes at the start of every gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Which concrete stream backs a [`VfsFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Loose native file
    Plain,
    /// Entry inside a DAT archive
    Archive,
    /// Gzip-compressed native file
    Gzip,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Archive => f.write_str("archive"),
            Self::Gzip => f.write_str("gzip"),
        }
    }
}

/// Operations every resolved stream supports
pub trait VfsStream: Read + Seek {
    /// The concrete stream kind
    fn kind(&self) -> StreamKind;

    /// Logical size in bytes (decompressed for compressed kinds)
    fn size(&self) -> io::Result<u64>;

    /// Whether a read has hit the end of the stream
    fn is_eof(&self) -> bool;

    /// Write access, for streams opened in a write mode
    fn writer(&mut self) -> Option<&mut dyn Write> {
        None
    }
}

/// A loose file on the host filesystem
#[derive(Debug)]
pub struct PlainStream {
    file: File,
    writable: bool,
    eof: bool,
}

impl PlainStream {
    /// Wrap an open file
    pub fn new(file: File, writable: bool) -> Self {
        Self {
            file,
            writable,
            eof: false,
        }
    }
}

impl Read for PlainStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        if n < buf.len() {
            self.eof = true;
        }
        Ok(n)
    }
}

impl Seek for PlainStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = self.file.seek(pos)?;
        self.eof = false;
        Ok(position)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }
}

impl VfsStream for PlainStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Plain
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn writer(&mut self) -> Option<&mut dyn Write> {
        if self.writable {
            Some(&mut self.file)
        } else {
            None
        }
    }
}

/// A gzip-compressed loose file, read transparently
pub struct GzipStream {
    path: PathBuf,
    decoder: MultiGzDecoder<BufReader<File>>,
    position: u64,
    size: u64,
    eof: bool,
}

impl fmt::Debug for GzipStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GzipStream")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl GzipStream {
    /// Open the gzip file at `path`
    ///
    /// Concatenated members are read back to back. The decompressed size
    /// comes from the trailing ISIZE field, which holds the size modulo
    /// 2^32 of the last member only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = read_isize(&path)?;
        let decoder = MultiGzDecoder::new(BufReader::new(File::open(&path)?));

        Ok(Self {
            path,
            decoder,
            position: 0,
            size,
            eof: false,
        })
    }

    fn restart(&mut self) -> io::Result<()> {
        self.decoder = MultiGzDecoder::new(BufReader::new(File::open(&self.path)?));
        self.position = 0;
        self.eof = false;
        Ok(())
    }
}

fn read_isize(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() < 4 {
        return Ok(0);
    }
    file.seek(SeekFrom::End(-4))?;
    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer)?;
    Ok(u64::from(u32::from_le_bytes(trailer)))
}

impl Read for GzipStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for GzipStream {
    /// Seeks forward by decompressing and discarding; seeking backwards
    /// reopens the file. Seeking past the end stops at the end.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size) + i128::from(delta),
        };
        let target = u64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;

        if target < self.position {
            self.restart()?;
        }

        let distance = target - self.position;
        let skipped = io::copy(&mut (&mut self.decoder).take(distance), &mut io::sink())?;
        self.position += skipped;
        self.eof = false;
        Ok(self.position)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

impl VfsStream for GzipStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Gzip
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.size)
    }

    fn is_eof(&self) -> bool {
        self.eof
    }
}

impl VfsStream for DatStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Archive
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len())
    }

    fn is_eof(&self) -> bool {
        Self::is_eof(self)
    }
}

/// A resolved file, whatever its backing
///
/// Dropping the file closes it. [`VfsFile::close`] does the same but
/// reports flush errors for files opened for writing.
pub struct VfsFile {
    path: String,
    inner: Box<dyn VfsStream>,
}

impl fmt::Debug for VfsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VfsFile")
            .field("path", &self.path)
            .field("kind", &self.inner.kind())
            .finish_non_exhaustive()
    }
}

impl VfsFile {
    /// Wrap a stream resolved for `path`
    pub fn new(path: impl Into<String>, inner: Box<dyn VfsStream>) -> Self {
        Self {
            path: path.into(),
            inner,
        }
    }

    /// The logical path this file was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The stream kind selected at open time
    pub fn kind(&self) -> StreamKind {
        self.inner.kind()
    }

    /// Logical size in bytes
    pub fn size(&self) -> io::Result<u64> {
        self.inner.size()
    }

    /// Current position
    pub fn tell(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Whether a read has hit the end of the file
    pub fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }

    /// Read one line without its terminator
    ///
    /// Strips a trailing `\n` and any `\r` before it. Returns `None` at
    /// end of file.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        let mut read_any = false;

        loop {
            if self.inner.read(&mut byte)? == 0 {
                break;
            }
            read_any = true;
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }

        if !read_any {
            return Ok(None);
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Flush pending writes and close the file
    pub fn close(mut self) -> io::Result<()> {
        if let Some(writer) = self.inner.writer() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Read for VfsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for VfsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Write for VfsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.writer() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not open for writing", self.path),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.writer() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}
