//! Pattern enumeration across sources and sorted name lists

use crate::native;
use crate::resolver::{Resolver, SourceKind};
use datvfs_formats::pattern::{self, Pattern};
use std::fs;
use std::path::Path;

/// What kind of thing an enumeration result is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Loose file on the host filesystem
    File,
    /// Directory on the host filesystem
    Directory,
    /// Entry inside an archive source
    ArchiveEntry,
}

/// One enumeration result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundEntry {
    /// Logical path of the result
    ///
    /// Native results keep the directory part of the pattern; archive
    /// results carry the normalized archive path.
    pub name: String,
    /// What was found
    pub kind: EntryKind,
}

impl FoundEntry {
    /// Whether this result is a directory
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl Resolver {
    /// Call `visit` for every path matching `pattern`
    ///
    /// Rooted patterns scan only the host directory they name and report
    /// files only. Relative patterns scan every source in priority order,
    /// then the base directory, and also report matching directories. The
    /// same name can be reported more than once.
    ///
    /// Enumeration stops as soon as `visit` returns `false`; the return
    /// value is `false` in that case and `true` when every result was
    /// visited.
    pub fn enumerate<F>(&self, pattern: &str, mut visit: F) -> bool
    where
        F: FnMut(&FoundEntry) -> bool,
    {
        if native::is_rooted(pattern) {
            return scan_native(self.base_dir(), pattern, &mut |found: &FoundEntry| {
                found.is_directory() || visit(found)
            });
        }

        for source in self.sources() {
            let completed = match source.kind() {
                SourceKind::Archive(archive) => archive.find_matching(pattern).all(|entry| {
                    visit(&FoundEntry {
                        name: entry.path.clone(),
                        kind: EntryKind::ArchiveEntry,
                    })
                }),
                SourceKind::Directory => scan_native(source.location(), pattern, &mut visit),
            };
            if !completed {
                return false;
            }
        }

        scan_native(self.base_dir(), pattern, &mut visit)
    }

    /// Sorted, case-insensitively unique file names matching `pattern`
    ///
    /// Directories are dropped and every name is reduced to its file name
    /// plus extension. When the pattern starts with a wildcard, results
    /// that still carry a directory component are dropped as well.
    pub fn list_files(&self, pattern: &str) -> Vec<String> {
        let leading_wildcard = pattern::starts_with_wildcard(pattern);
        let mut names = Vec::new();

        self.enumerate(pattern, |found| {
            if found.is_directory() {
                return true;
            }
            if leading_wildcard && native::has_dir(&found.name) {
                return true;
            }
            names.push(native::file_name(&found.name).to_string());
            true
        });

        names.sort_by_cached_key(|name| name.to_ascii_lowercase());
        names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        names
    }
}

/// Scan the host directory named by `pattern` below `root`
///
/// Returns `false` if `visit` asked to stop.
fn scan_native<F>(root: &Path, pattern: &str, visit: &mut F) -> bool
where
    F: FnMut(&FoundEntry) -> bool,
{
    let (dir, file_pattern) = native::split_dir(pattern);
    let Ok(matcher) = Pattern::new(file_pattern) else {
        return true;
    };
    let Ok(read_dir) = fs::read_dir(root.join(native::to_native(dir))) else {
        return true;
    };

    let mut matches: Vec<(String, bool)> = read_dir
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            matcher
                .matches(&name)
                .then(|| (name, entry.path().is_dir()))
        })
        .collect();
    matches.sort();

    matches.into_iter().all(|(name, is_dir)| {
        visit(&FoundEntry {
            name: format!("{dir}{name}"),
            kind: if is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
        })
    })
}
