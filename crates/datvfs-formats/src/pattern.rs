//! Filename pattern matching
//!
//! Patterns are matched case-insensitively (ASCII) against file names or
//! archive paths. Both `/` and `\` act as path separators and match each
//! other.
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `?` | exactly one character, never a separator |
//! | `*` | zero or more characters, never across a separator |
//! | `\x1A` | zero or more characters up to a `.` or a separator (stem wildcard) |
//! | `[abc]`, `[a-z]` | character set or range, `[!...]` negates |
//! | `!sub` | matches when `sub` does not match the rest of the name |
//! | `` `c `` | the character `c` taken literally |
//!
//! Matching is recursive backtracking. Wildcards try the longest candidate
//! first, so the worst case is exponential in the number of wildcards; file
//! names are short enough for this not to matter.
//!
//! ```rust
//! use datvfs_formats::pattern;
//!
//! assert!(pattern::matches("art\\*.FRM", "ART/hero.frm"));
//! assert!(!pattern::matches("art\\*.FRM", "art/items/hero.frm"));
//! assert!(pattern::matches("*.frm", "HERO.FRM"));
//! assert!(pattern::matches("[a-c]?.txt", "b1.txt"));
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Matches exactly one non-separator character
pub const ANY: u8 = b'?';
/// Matches zero or more non-separator characters
pub const CLOSURE: u8 = b'*';
/// Matches zero or more characters up to a `.` or a separator
pub const STEM: u8 = 0x1A;
/// Takes the next pattern character literally
pub const QUOTE: u8 = b'`';
/// Inverts the match of the remaining subpattern
pub const NOT: u8 = b'!';
/// Opens a character set
pub const SET_OPEN: u8 = b'[';
/// Closes a character set
pub const SET_CLOSE: u8 = b']';
/// Negates a character set when it directly follows [`SET_OPEN`]
pub const SET_NOT: u8 = b'!';
/// Separates the bounds of a character range inside a set
pub const SET_THRU: u8 = b'-';

const DOT: u8 = b'.';

/// Pattern validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `[` without a matching `]`
    #[error("unterminated character set starting at offset {0}")]
    UnterminatedSet(usize),

    /// A quote character at the end of the pattern
    #[error("quote at offset {0} has nothing to escape")]
    DanglingQuote(usize),

    /// A `!` at the end of the pattern
    #[error("negation at offset {0} has no subpattern")]
    DanglingNegation(usize),
}

/// Returns the byte at `index`, or 0 past the end.
///
/// The matcher treats 0 as the end of input throughout.
fn at(bytes: &[u8], index: usize) -> u8 {
    bytes.get(index).copied().unwrap_or(0)
}

fn tail(bytes: &[u8], index: usize) -> &[u8] {
    bytes.get(index..).unwrap_or(&[])
}

const fn is_separator(byte: u8) -> bool {
    byte == b'/' || byte == b'\\'
}

const fn fold(byte: u8) -> u8 {
    byte.to_ascii_lowercase()
}

/// Checks that `pattern` is well formed.
pub fn validate(pattern: &str) -> Result<(), PatternError> {
    let pat = pattern.as_bytes();
    let mut len = 0;

    while at(pat, len) != 0 {
        match pat[len] {
            SET_OPEN => {
                let start = len;
                len += 1;
                if at(pat, len) == SET_NOT {
                    len += 1;
                }

                while at(pat, len) != SET_CLOSE {
                    if at(pat, len) == QUOTE {
                        len += 1;
                    }
                    if at(pat, len) == 0 {
                        return Err(PatternError::UnterminatedSet(start));
                    }
                    len += 1;

                    if at(pat, len) == SET_THRU {
                        len += 1;
                        if at(pat, len) == QUOTE {
                            len += 1;
                        }
                        if at(pat, len) == 0 {
                            return Err(PatternError::UnterminatedSet(start));
                        }
                        len += 1;
                    }

                    if at(pat, len) == 0 {
                        return Err(PatternError::UnterminatedSet(start));
                    }
                }
            }
            QUOTE => {
                len += 1;
                if at(pat, len) == 0 {
                    return Err(PatternError::DanglingQuote(len - 1));
                }
            }
            NOT => {
                len += 1;
                if at(pat, len) == 0 {
                    return Err(PatternError::DanglingNegation(len - 1));
                }
            }
            _ => {}
        }
        len += 1;
    }

    Ok(())
}

/// Returns `true` if `pattern` is well formed.
///
/// The empty pattern is valid; it matches only the empty name.
pub fn is_valid(pattern: &str) -> bool {
    validate(pattern).is_ok()
}

/// Matches `name` against `pattern`.
///
/// Malformed patterns never match. An empty name is matched only by the
/// empty pattern.
pub fn matches(pattern: &str, name: &str) -> bool {
    if !is_valid(pattern) {
        return false;
    }

    match_valid(pattern.as_bytes(), name.as_bytes())
}

fn match_valid(pattern: &[u8], name: &[u8]) -> bool {
    if name.is_empty() {
        return pattern.is_empty();
    }

    submatch(pattern, name)
}

/// Returns the leading run of `pattern` that contains no special tokens.
///
/// Every name matched by `pattern` starts with this prefix (compared
/// case-insensitively, with either separator). Archive scans use it to skip
/// straight to the candidate range of a sorted catalogue.
pub fn literal_prefix(pattern: &str) -> &str {
    let end = pattern
        .bytes()
        .position(|b| matches!(b, ANY | CLOSURE | STEM | QUOTE | NOT | SET_OPEN))
        .unwrap_or(pattern.len());
    &pattern[..end]
}

/// Returns `true` if `pattern` begins with `*` or the stem wildcard.
pub fn starts_with_wildcard(pattern: &str) -> bool {
    matches!(pattern.as_bytes().first(), Some(&CLOSURE | &STEM))
}

fn submatch(pat: &[u8], name: &[u8]) -> bool {
    let mut p = 0;
    let mut n = 0;

    while at(pat, p) != 0 {
        let fch = at(name, n);
        let pch = pat[p];
        p += 1;

        match pch {
            ANY => {
                if fch == 0 || is_separator(fch) {
                    return false;
                }
                n += 1;
            }
            CLOSURE | STEM => {
                let mut run = 0;
                loop {
                    let ch = at(name, n + run);
                    if ch == 0 || is_separator(ch) || (pch == STEM && ch == DOT) {
                        break;
                    }
                    run += 1;
                }

                return (0..=run)
                    .rev()
                    .any(|skip| submatch(tail(pat, p), tail(name, n + skip)));
            }
            QUOTE => {
                let quoted = at(pat, p);
                if quoted == 0 || fold(fch) != fold(quoted) {
                    return false;
                }
                n += 1;
                p += 1;
            }
            SET_OPEN => {
                let mut yes = true;
                if at(pat, p) == SET_NOT {
                    p += 1;
                    yes = false;
                }

                let mut matched = !yes;
                while at(pat, p) != SET_CLOSE && at(pat, p) != 0 {
                    if at(pat, p) == QUOTE {
                        p += 1;
                    }
                    if at(pat, p) == 0 {
                        break;
                    }
                    let lo = pat[p];
                    let mut hi = lo;
                    p += 1;

                    if at(pat, p) == SET_THRU {
                        p += 1;
                        if at(pat, p) == QUOTE {
                            p += 1;
                        }
                        if at(pat, p) == 0 {
                            break;
                        }
                        hi = pat[p];
                        p += 1;
                    }

                    if at(pat, p) == 0 {
                        break;
                    }

                    if fold(fch) >= fold(lo) && fold(fch) <= fold(hi) {
                        matched = yes;
                    }
                }

                // A set consumes one character; the end of the name never
                // satisfies it, not even a negated one.
                if !matched || fch == 0 || at(pat, p) == 0 {
                    return false;
                }
                n += 1;
                p += 1;
            }
            NOT => {
                if at(pat, p) == 0 {
                    return false;
                }
                return !submatch(tail(pat, p), tail(name, n));
            }
            b'/' | b'\\' => {
                if !is_separator(fch) {
                    return false;
                }
                n += 1;
            }
            _ => {
                if fch == 0 || fold(fch) != fold(pch) {
                    return false;
                }
                n += 1;
            }
        }
    }

    at(name, n) == 0
}

/// A validated pattern
///
/// Validation happens once at construction; [`Pattern::matches`] then skips
/// it on every call. Matching semantics are identical to [`matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    source: String,
}

impl Pattern {
    /// Validate and wrap a pattern string
    pub fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
        let source = pattern.into();
        validate(&source)?;
        Ok(Self { source })
    }

    /// Match `name` against this pattern
    pub fn matches(&self, name: &str) -> bool {
        match_valid(self.source.as_bytes(), name.as_bytes())
    }

    /// The pattern text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// See [`literal_prefix`]
    pub fn literal_prefix(&self) -> &str {
        literal_prefix(&self.source)
    }

    /// See [`starts_with_wildcard`]
    pub fn starts_with_wildcard(&self) -> bool {
        starts_with_wildcard(&self.source)
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
