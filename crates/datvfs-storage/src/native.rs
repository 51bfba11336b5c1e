//! Path helpers for the host filesystem
//!
//! Logical paths use `\` as separator. On hosts where `\` is an ordinary
//! file name character it has to be rewritten before touching the disk.

use std::path::PathBuf;

/// Whether `path` bypasses the source list
///
/// A path is rooted when it has a drive letter, or when its directory part
/// starts with a separator or a `.` (`./x`, `../x`, `/x`, `\x`).
pub fn is_rooted(path: &str) -> bool {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return true;
    }

    let (dir, _) = split_dir(path);
    matches!(dir.as_bytes().first(), Some(b'/' | b'\\' | b'.'))
}

/// Split `path` after its last separator
///
/// The directory part keeps its trailing separator so the two halves
/// concatenate back to the input.
pub fn split_dir(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\']) {
        Some(index) => path.split_at(index + 1),
        None => ("", path),
    }
}

/// File name plus extension, without any directory
pub fn file_name(path: &str) -> &str {
    split_dir(path).1
}

/// Whether `path` has a directory component
pub fn has_dir(path: &str) -> bool {
    path.contains(['/', '\\'])
}

/// Convert a logical path to a host path
pub fn to_native(path: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(path)
    } else {
        PathBuf::from(path.replace('\\', "/"))
    }
}
