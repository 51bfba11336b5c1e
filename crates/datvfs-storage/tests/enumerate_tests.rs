#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Integration tests for pattern enumeration and name lists

use datvfs_formats::dat::DatBuilder;
use datvfs_storage::{EntryKind, FoundEntry, Resolver};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_archive(dir: &Path, name: &str, files: &[&str]) {
    let mut builder = DatBuilder::new();
    for path in files {
        builder.add_file(*path, b"payload".to_vec());
    }
    builder.write_file(dir.join(name)).expect("write archive");
}

fn touch(dir: &Path, path: &str) {
    let target = dir.join(path);
    fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
    fs::write(target, b"x").expect("write");
}

fn collect(resolver: &Resolver, pattern: &str) -> Vec<FoundEntry> {
    let mut found = Vec::new();
    let completed = resolver.enumerate(pattern, |entry| {
        found.push(entry.clone());
        true
    });
    assert!(completed);
    found
}

#[test]
fn test_list_files_in_base_directory() {
    let base = TempDir::new().expect("temp dir");
    touch(base.path(), "a.frm");
    touch(base.path(), "b.FRM");
    touch(base.path(), "c.txt");

    let resolver = Resolver::with_base_dir(base.path());
    assert_eq!(resolver.list_files("*.frm"), ["a.frm", "b.FRM"]);
}

#[test]
fn test_enumerate_visits_sources_in_priority_order() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &["ART/Critters/HMJMPS.FRM"]);
    touch(base.path(), "data/art/critters/hfjmps.frm");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.reset("master.dat;data").expect("reset");

    let found = collect(&resolver, "art\\critters\\*.frm");
    assert_eq!(
        found,
        vec![
            FoundEntry {
                name: "art\\critters\\hfjmps.frm".to_string(),
                kind: EntryKind::File,
            },
            FoundEntry {
                name: "art\\critters\\hmjmps.frm".to_string(),
                kind: EntryKind::ArchiveEntry,
            },
        ]
    );
}

#[test]
fn test_enumerate_reports_duplicates_across_sources() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &["maps/arroyo.map"]);
    touch(base.path(), "data/maps/ARROYO.MAP");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.reset("master.dat;data").expect("reset");

    assert_eq!(collect(&resolver, "maps\\*.map").len(), 2);
    assert_eq!(resolver.list_files("maps\\*.map"), ["ARROYO.MAP"]);
}

#[test]
fn test_enumerate_stops_when_visitor_declines() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &["a.txt", "b.txt"]);
    touch(base.path(), "c.txt");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");

    let mut seen = Vec::new();
    let completed = resolver.enumerate("*.txt", |entry| {
        seen.push(entry.name.clone());
        false
    });

    assert!(!completed);
    assert_eq!(seen, ["a.txt"]);
}

#[test]
fn test_list_files_sorts_and_dedups_case_insensitively() {
    let base = TempDir::new().expect("temp dir");
    write_archive(
        base.path(),
        "master.dat",
        &["text/english/dialog/zeke.msg", "text/english/dialog/abe.msg"],
    );
    touch(base.path(), "data/text/english/dialog/Abe.MSG");
    touch(base.path(), "data/text/english/dialog/moe.msg");
    fs::create_dir_all(base.path().join("data/text/english/dialog/dir.msg")).expect("mkdir");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.reset("master.dat;data").expect("reset");

    // data has priority, so its spelling of the duplicate wins
    assert_eq!(
        resolver.list_files("text\\english\\dialog\\*.msg"),
        ["Abe.MSG", "moe.msg", "zeke.msg"]
    );
}

#[test]
fn test_leading_wildcard_drops_nested_archive_entries() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &["art/knife.frm", "splash.frm"]);

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");

    let found = collect(&resolver, "*\\*.frm");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "art\\knife.frm");
    assert!(resolver.list_files("*\\*.frm").is_empty());

    // `*` never crosses a separator
    assert_eq!(resolver.list_files("*.frm"), ["splash.frm"]);
    // `?` is not a leading wildcard for this purpose
    assert_eq!(resolver.list_files("?rt\\*.frm"), ["knife.frm"]);
}

#[test]
fn test_rooted_pattern_scans_only_that_directory() {
    let base = TempDir::new().expect("temp dir");
    let elsewhere = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &["save.dat"]);
    touch(elsewhere.path(), "slot01.sav");
    touch(elsewhere.path(), "slot02.sav");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");

    let pattern = format!("{}/*.sav", elsewhere.path().display());
    assert_eq!(resolver.list_files(&pattern), ["slot01.sav", "slot02.sav"]);
    assert!(resolver.list_files("./*.dat").contains(&"master.dat".to_string()));
}

#[test]
fn test_rooted_pattern_skips_directories() {
    let base = TempDir::new().expect("temp dir");
    let elsewhere = TempDir::new().expect("temp dir");
    touch(elsewhere.path(), "slot01.sav");
    fs::create_dir_all(elsewhere.path().join("backup.sav")).expect("mkdir");
    touch(base.path(), "data/nested.sav/keep.txt");

    let resolver = Resolver::with_base_dir(base.path());

    let pattern = format!("{}/*.sav", elsewhere.path().display());
    let found = collect(&resolver, &pattern);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, EntryKind::File);
    assert!(found[0].name.ends_with("slot01.sav"));

    // Relative scans still report matching directories
    let found = collect(&resolver, "data\\*.sav");
    assert_eq!(
        found,
        vec![FoundEntry {
            name: "data\\nested.sav".to_string(),
            kind: EntryKind::Directory,
        }]
    );
}

#[test]
fn test_malformed_pattern_finds_nothing() {
    let base = TempDir::new().expect("temp dir");
    write_archive(base.path(), "master.dat", &["a.txt"]);
    touch(base.path(), "b.txt");

    let mut resolver = Resolver::with_base_dir(base.path());
    resolver.register_source("master.dat").expect("register");

    assert!(resolver.list_files("[a-").is_empty());
    assert!(resolver.list_files("*.txt`").is_empty());
}

#[test]
fn test_no_sources_and_no_matches() {
    let base = TempDir::new().expect("temp dir");
    let resolver = Resolver::with_base_dir(base.path());
    assert!(resolver.list_files("*.frm").is_empty());
}
