//! Source list and path resolution
//!
//! The resolver keeps its sources in priority order, index 0 first. Every
//! lookup walks the list front to back and the first source that can serve
//! the path wins. Paths not found in any source get one more try relative
//! to the base directory.

use crate::native;
use crate::stream::{GZIP_MAGIC, GzipStream, PlainStream, VfsFile};
use crate::{Result, SOURCE_LIST_SEPARATOR, StorageError};
use datvfs_formats::dat::{DatArchive, OpenMode};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// What a source is backed by
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// Loose files below a directory
    Directory,
    /// An opened archive
    Archive(DatArchive),
}

/// A registered overlay point
#[derive(Debug, Clone)]
pub struct Source {
    path: String,
    location: PathBuf,
    kind: SourceKind,
}

impl Source {
    /// The path the source was registered with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Where the source lives on the host filesystem
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// What backs the source
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// The archive, for archive sources
    pub fn archive(&self) -> Option<&DatArchive> {
        match &self.kind {
            SourceKind::Archive(archive) => Some(archive),
            SourceKind::Directory => None,
        }
    }

    /// Whether this is an archive source
    pub fn is_archive(&self) -> bool {
        matches!(self.kind, SourceKind::Archive(_))
    }
}

/// Resolves logical paths across an ordered list of sources
///
/// Relative source paths and the final fallback lookup are taken relative
/// to the base directory, which defaults to the process working directory.
#[derive(Debug, Clone)]
pub struct Resolver {
    sources: Vec<Source>,
    base_dir: PathBuf,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Create a resolver with no sources, rooted at the working directory
    pub fn new() -> Self {
        Self::with_base_dir(".")
    }

    /// Create a resolver with no sources, rooted at `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            sources: Vec::new(),
            base_dir: base_dir.into(),
        }
    }

    /// The directory relative paths are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Sources in priority order, highest first
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no sources are registered
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Host path for a logical path, relative to the base directory
    pub fn native_path(&self, path: &str) -> PathBuf {
        self.base_dir.join(native::to_native(path))
    }

    /// Register `path` as the highest priority source
    ///
    /// A path already registered (compared case-insensitively) is moved to
    /// the front instead of being added twice. Otherwise the path is opened
    /// as an archive, or used as a directory, creating the directory if it
    /// does not exist.
    pub fn register_source(&mut self, path: &str) -> Result<()> {
        if let Some(index) = self
            .sources
            .iter()
            .position(|source| source.path.eq_ignore_ascii_case(path))
        {
            if index != 0 {
                let source = self.sources.remove(index);
                self.sources.insert(0, source);
                debug!(path, from = index, "Moved source to front");
            }
            return Ok(());
        }

        let location = self.native_path(path);

        match DatArchive::open(&location) {
            Ok(archive) => {
                info!(path, entries = archive.len(), "Registered archive source");
                self.push_front(path, location, SourceKind::Archive(archive));
                return Ok(());
            }
            Err(e) => debug!(path, error = %e, "Not an archive, trying directory"),
        }

        if !location.is_dir() {
            fs::create_dir_all(&location).map_err(|source| StorageError::Registration {
                path: path.to_string(),
                source,
            })?;
            info!(path, "Created directory source");
        }

        info!(path, "Registered directory source");
        self.push_front(path, location, SourceKind::Directory);
        Ok(())
    }

    fn push_front(&mut self, path: &str, location: PathBuf, kind: SourceKind) {
        self.sources.insert(
            0,
            Source {
                path: path.to_string(),
                location,
                kind,
            },
        );
    }

    /// Replace all sources with a `;`-separated list
    ///
    /// Entries are registered in order, so the last one ends up with the
    /// highest priority. Stops at the first entry that fails to register;
    /// entries before it stay registered.
    pub fn reset(&mut self, list: &str) -> Result<()> {
        self.close_all();

        for path in list
            .split(SOURCE_LIST_SEPARATOR)
            .map(str::trim)
            .filter(|path| !path.is_empty())
        {
            self.register_source(path)?;
        }

        Ok(())
    }

    /// Drop every source
    pub fn close_all(&mut self) {
        if !self.sources.is_empty() {
            debug!(count = self.sources.len(), "Closing all sources");
        }
        self.sources.clear();
    }

    /// Open the file at a logical path
    ///
    /// Rooted paths go straight to the host filesystem. Everything else is
    /// looked up in each source in priority order, then relative to the
    /// base directory. Native files starting with the gzip magic are
    /// decompressed transparently when opened for reading.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<VfsFile> {
        if native::is_rooted(path) {
            return open_native(path, &self.native_path(path), mode)
                .map_err(|e| not_found_or_io(path, e));
        }

        for source in &self.sources {
            match &source.kind {
                SourceKind::Archive(archive) => match archive.open_entry(path, mode) {
                    Ok(stream) => {
                        trace!(path, source = %source.path, "Resolved in archive");
                        return Ok(VfsFile::new(path, Box::new(stream)));
                    }
                    Err(e) if e.is_not_found() => {}
                    Err(e) => debug!(path, source = %source.path, error = %e, "Archive source skipped"),
                },
                SourceKind::Directory => {
                    let candidate = source.location.join(native::to_native(path));
                    match open_native(path, &candidate, mode) {
                        Ok(file) => {
                            trace!(path, source = %source.path, "Resolved in directory");
                            return Ok(file);
                        }
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => debug!(path, source = %source.path, error = %e, "Directory source skipped"),
                    }
                }
            }
        }

        debug!(path, "Not in any source, trying base directory");
        open_native(path, &self.native_path(path), mode)
            .map_err(|e| not_found_or_io(path, e))
    }

    /// Whether any source can open `path` for reading
    pub fn exists(&self, path: &str) -> bool {
        self.open(path, OpenMode::READ).is_ok()
    }

    /// Logical size of the file at `path`
    pub fn file_size(&self, path: &str) -> Result<u64> {
        let file = self.open(path, OpenMode::READ)?;
        Ok(file.size()?)
    }

    /// Read the whole file at `path`
    pub fn read_contents(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.open(path, OpenMode::READ)?;
        let mut data = Vec::with_capacity(file.size().unwrap_or(0) as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

fn open_native(path: &str, location: &Path, mode: OpenMode) -> io::Result<VfsFile> {
    if mode.is_write() {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(location)?;
        return Ok(VfsFile::new(path, Box::new(PlainStream::new(file, true))));
    }

    let mut file = File::open(location)?;
    if file.metadata()?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is a directory", location.display()),
        ));
    }

    let mut magic = [0u8; 2];
    if read_up_to(&mut file, &mut magic)? == magic.len() && magic == GZIP_MAGIC {
        debug!(path, "Detected gzip-wrapped file");
        return Ok(VfsFile::new(path, Box::new(GzipStream::open(location)?)));
    }

    file.rewind()?;
    Ok(VfsFile::new(path, Box::new(PlainStream::new(file, false))))
}

fn not_found_or_io(path: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(err)
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
