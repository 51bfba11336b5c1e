//! File format parsers for the game asset layer
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate provides the two leaf components of the asset layer:
//!
//! - **DAT**: the archive container holding named, optionally zlib-compressed
//!   entries, with a streaming reader per entry
//! - **Pattern**: the filename pattern matcher used to enumerate both archive
//!   catalogues and native directories
//!
//! `pattern` stands alone; the archive scan in
//! [`dat::DatArchive::find_matching`] is built on it.

#![warn(missing_docs)]

/// DAT archive container
///
/// Archives end with an 8-byte footer that locates the entry table and the
/// data section. The entry table is sorted by case-insensitive path so that
/// lookups are a binary search.
///
/// Key features:
/// - **All-or-nothing parsing**: a truncated or inconsistent table is an error
/// - **Independent streams**: every open entry owns its own file handle
/// - **Transparent decompression**: zlib payloads are inflated on the fly
/// - **Text mode**: CRLF collapsing for line-oriented assets
///
/// See the [`dat`] module for the stream and seek semantics.
pub mod dat;

/// Filename pattern matching (`?`, `*`, stem wildcard, sets, negation)
pub mod pattern;
