#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Integration tests for source registration and path resolution

use datvfs_formats::dat::DatBuilder;
use datvfs_storage::{OpenMode, Resolver, StorageError, StreamKind};
use flate2::Compression;
use flate2::write::GzEncoder;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::TempDir;

fn write_archive(dir: &Path, name: &str, files: &[(&str, &[u8])]) {
    let mut builder = DatBuilder::new();
    for (path, data) in files {
        builder.add_compressed(*path, *data);
    }
    builder.write_file(dir.join(name)).expect("write archive");
}

fn write_loose(dir: &Path, path: &str, data: &[u8]) {
    let target = dir.join(path);
    fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
    fs::write(target, data).expect("write loose file");
}

fn read_all(resolver: &Resolver, path: &str) -> Vec<u8> {
    resolver.read_contents(path).expect("read contents")
}

fn source_paths(resolver: &Resolver) -> Vec<&str> {
    resolver.sources().iter().map(|source| source.path()).collect()
}

#[test]
fn test_later_sources_take_priority() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("text/misc.msg", b"from master")]);
    write_loose(base.path(), "data/text/misc.msg", b"from overlay");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");
    assert_eq!(read_all(&resolver, "text\\misc.msg"), b"from master");

    resolver.register_source("data").expect("register");
    assert_eq!(read_all(&resolver, "text\\misc.msg"), b"from overlay");
    assert_eq!(source_paths(&resolver), ["data", "master.dat"]);
}

#[test]
fn test_reregistering_moves_to_front() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("a.txt", b"archive")]);
    write_loose(base.path(), "data/a.txt", b"loose");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.reset("master.dat;data").expect("reset");
    assert_eq!(read_all(&resolver, "a.txt"), b"loose");

    resolver.register_source("MASTER.DAT").expect("re-register");
    assert_eq!(resolver.len(), 2);
    assert_eq!(source_paths(&resolver), ["master.dat", "data"]);
    assert_eq!(read_all(&resolver, "a.txt"), b"archive");

    // Already at the front: nothing changes
    resolver.register_source("master.dat").expect("re-register");
    assert_eq!(source_paths(&resolver), ["master.dat", "data"]);
}

#[test]
fn test_reset_registers_in_order() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "one.dat", &[("x", b"1")]);
    write_archive(base.path(), "two.dat", &[("x", b"2")]);

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("stale").expect("register");

    resolver.reset(" one.dat ;; two.dat;").expect("reset");
    assert_eq!(source_paths(&resolver), ["two.dat", "one.dat"]);
    assert_eq!(read_all(&resolver, "x"), b"2");

    resolver.reset("").expect("reset");
    assert!(resolver.is_empty());
}

#[test]
fn test_reset_stops_at_first_failure() {
    let base = TempDir::new().expect("temp dir");
    fs::write(base.path().join("junk.dat"), b"no").expect("write junk");

    let mut resolver = Resolver::with_base_dir(base.path());
    let err = resolver.reset("first;junk.dat;last").unwrap_err();

    assert!(matches!(err, StorageError::Registration { ref path, .. } if path == "junk.dat"));
    assert_eq!(source_paths(&resolver), ["first"]);
    assert!(!base.path().join("last").exists());
}

#[test]
fn test_missing_source_becomes_directory() {
    let base = TempDir::new().expect("temp dir");
    let mut resolver = Resolver::with_base_dir(base.path());

    resolver.register_source("data\\patches").expect("register");

    assert!(base.path().join("data").join("patches").is_dir());
    assert!(!resolver.sources()[0].is_archive());
}

#[test]
fn test_archive_entries_resolve_case_insensitively() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("ART/Items/Sword.FRM", b"frm data")]);

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");

    let mut file = resolver
        .open("art\\items\\sword.frm", OpenMode::READ)
        .expect("open");
    assert_eq!(file.kind(), StreamKind::Archive);
    assert_eq!(file.path(), "art\\items\\sword.frm");

    let mut data = Vec::new();
    file.read_to_end(&mut data).expect("read");
    assert_eq!(data, b"frm data");

    assert!(resolver.exists("ART/ITEMS/SWORD.FRM"));
    assert!(!resolver.exists("art\\items\\axe.frm"));
}

#[test]
fn test_archive_text_mode_collapses_crlf() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("readme.txt", b"one\r\ntwo\r\n")]);

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");

    let mut file = resolver
        .open("readme.txt", OpenMode::READ_TEXT)
        .expect("open");
    let mut text = String::new();
    file.read_to_string(&mut text).expect("read");
    assert_eq!(text, "one\ntwo\n");
}

#[test]
fn test_write_skips_archive_sources() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("save.txt", b"packed")]);

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.reset("data;master.dat").expect("reset");

    let mut file = resolver.open("save.txt", OpenMode::WRITE).expect("open for write");
    assert_eq!(file.kind(), StreamKind::Plain);
    file.write_all(b"written").expect("write");
    file.close().expect("close");

    assert_eq!(
        fs::read(base.path().join("data").join("save.txt")).expect("read back"),
        b"written"
    );
    // The archive still answers reads, since it has priority
    assert_eq!(read_all(&resolver, "save.txt"), b"packed");
}

#[test]
fn test_archive_only_write_falls_back_to_base_dir() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("save.txt", b"packed")]);

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");

    let mut file = resolver.open("save.txt", OpenMode::WRITE).expect("open for write");
    file.write_all(b"loose").expect("write");
    file.close().expect("close");

    assert_eq!(fs::read(base.path().join("save.txt")).expect("read back"), b"loose");
}

#[test]
fn test_read_only_streams_reject_writes() {
    let base = TempDir::new().expect("temp dir");
    write_loose(base.path(), "data/notes.txt", b"text");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("data").expect("register");

    let mut file = resolver.open("notes.txt", OpenMode::READ).expect("open");
    let err = file.write_all(b"nope").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
}

#[test]
fn test_gzip_files_are_transparent() {
    let base = TempDir::new().expect("temp dir");
    let plain = b"uncompressed contents of a gzip-wrapped map".repeat(20);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain).expect("compress");
    write_loose(base.path(), "data/maps/desert.map", &encoder.finish().expect("finish"));

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("data").expect("register");

    let file = resolver.open("maps\\desert.map", OpenMode::READ).expect("open");
    assert_eq!(file.kind(), StreamKind::Gzip);
    assert_eq!(
        resolver.file_size("maps\\desert.map").expect("size"),
        plain.len() as u64
    );
    assert_eq!(read_all(&resolver, "maps\\desert.map"), plain);
}

#[test]
fn test_rooted_paths_bypass_sources() {
    let base = TempDir::new().expect("temp dir");
    let elsewhere = TempDir::new().expect("temp dir");
    write_loose(base.path(), "data/config.ini", b"overlay");
    write_loose(base.path(), "config.ini", b"base");
    write_loose(elsewhere.path(), "config.ini", b"absolute");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("data").expect("register");

    assert_eq!(read_all(&resolver, "config.ini"), b"overlay");
    assert_eq!(read_all(&resolver, "./config.ini"), b"base");

    let absolute = elsewhere.path().join("config.ini");
    assert_eq!(
        read_all(&resolver, absolute.to_str().expect("utf-8 path")),
        b"absolute"
    );
}

#[test]
fn test_base_directory_is_the_last_resort() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("other.txt", b"x")]);
    write_loose(base.path(), "fallout.cfg", b"cfg");

    let mut resolver = Resolver::with_base_dir(base.path());
    assert_eq!(read_all(&resolver, "fallout.cfg"), b"cfg");

    resolver.register_source("master.dat").expect("register");
    assert_eq!(read_all(&resolver, "fallout.cfg"), b"cfg");
}

#[test]
fn test_missing_path_is_not_found() {
    let base = TempDir::new().expect("temp dir");
    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("data").expect("register");

    let err = resolver.open("nowhere.txt", OpenMode::READ).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, StorageError::NotFound(ref path) if path == "nowhere.txt"));
    assert!(resolver.file_size("nowhere.txt").unwrap_err().is_not_found());
}

#[test]
fn test_directories_are_not_files() {
    let base = TempDir::new().expect("temp dir");
    fs::create_dir_all(base.path().join("data").join("art")).expect("mkdir");
    write_loose(base.path(), "art", b"base file");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("data").expect("register");

    // data/art is a directory, so the lookup moves on
    assert_eq!(read_all(&resolver, "art"), b"base file");
}

#[test]
fn test_read_line_strips_line_endings() {
    let base = TempDir::new().expect("temp dir");
    write_loose(base.path(), "data/list.txt", b"first\r\nsecond\nthird");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("data").expect("register");

    let mut file = resolver.open("list.txt", OpenMode::READ_TEXT).expect("open");
    let mut lines = Vec::new();
    while let Some(line) = file.read_line().expect("read line") {
        lines.push(line);
    }
    assert_eq!(lines, ["first", "second", "third"]);
    assert!(file.is_eof());
}

#[test]
fn test_close_all_drops_sources() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &[("a", b"a")]);

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");
    assert!(resolver.exists("a"));

    resolver.close_all();
    assert!(resolver.is_empty());
    assert!(!resolver.exists("a"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn registration_keeps_sources_unique(
        picks in prop::collection::vec((0usize..4, any::<bool>()), 1..12)
    ) {
        let base = TempDir::new().expect("temp dir");
        let names = ["alpha", "beta", "gamma", "delta"];
        let mut resolver = Resolver::with_base_dir(base.path());

        for (index, upper) in &picks {
            let name = if *upper {
                names[*index].to_ascii_uppercase()
            } else {
                names[*index].to_string()
            };
            resolver.register_source(&name).expect("register");
            prop_assert!(resolver.sources()[0].path().eq_ignore_ascii_case(&name));
        }

        let mut seen: Vec<String> = resolver
            .sources()
            .iter()
            .map(|source| source.path().to_ascii_lowercase())
            .collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), total);

        let mut distinct: Vec<usize> = picks.iter().map(|(index, _)| *index).collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(resolver.len(), distinct.len());
    }
}
