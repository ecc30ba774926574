// ABOUTME: Integration tests for artifact packaging and integrity self-tests.
// ABOUTME: Checks archive layout, checksum sidecars, and corruption detection.

use chrono::{TimeZone, Utc};
use shipline::package::{
    Artifact, ArtifactPackager, PACKAGE_INFO_FILENAME, PackageError, PackageInfo,
    VERSION_FILENAME, extract_tar_gz, read_sidecar, sha256_file,
};
use shipline::types::{AppName, CommitId, Version};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn info() -> PackageInfo {
    PackageInfo {
        app: AppName::new("myapp").unwrap(),
        version: Version::parse("1.2.3").unwrap(),
        build_date: Utc.with_ymd_and_hms(2025, 1, 27, 0, 0, 0).unwrap(),
        arch: "x64".to_string(),
        commit: Some(CommitId::new("abc123").unwrap()),
    }
}

fn build_output(root: &Path) -> std::path::PathBuf {
    let bundle = root.join("build/bundle");
    fs::create_dir_all(bundle.join("lib")).unwrap();
    fs::write(bundle.join("myapp"), b"#!/bin/sh\necho hi\n").unwrap();
    fs::write(bundle.join("lib/libapp.so"), vec![7u8; 4096]).unwrap();
    bundle
}

fn packager(root: &Path) -> ArtifactPackager {
    ArtifactPackager::new(info(), "myapp", root.join("dist"))
}

#[test]
fn package_writes_archive_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let bundle = build_output(dir.path());
    let packager = packager(dir.path());

    let artifact = packager.package(&bundle).unwrap();

    assert_eq!(artifact.name, "myapp-1.2.3-x64.tar.gz");
    assert_eq!(artifact.path, dir.path().join("dist/myapp-1.2.3-x64.tar.gz"));
    assert_eq!(artifact.size_bytes, fs::metadata(&artifact.path).unwrap().len());

    let (digest, filename) = read_sidecar(&artifact.sidecar_path()).unwrap();
    assert_eq!(digest, artifact.sha256);
    assert_eq!(filename, artifact.name);
    let sidecar = fs::read_to_string(artifact.sidecar_path()).unwrap();
    assert_eq!(sidecar, format!("{}  {}\n", artifact.sha256, artifact.name));

    assert!(packager.verify_integrity(&artifact).unwrap());
}

#[test]
fn archive_contains_bundle_and_metadata_files() {
    let dir = TempDir::new().unwrap();
    let bundle = build_output(dir.path());
    let artifact = packager(dir.path()).package(&bundle).unwrap();

    let out = TempDir::new().unwrap();
    extract_tar_gz(&artifact.path, out.path()).unwrap();

    assert!(out.path().join("myapp").is_file());
    assert_eq!(fs::read(out.path().join("lib/libapp.so")).unwrap().len(), 4096);
    assert_eq!(
        fs::read_to_string(out.path().join(VERSION_FILENAME)).unwrap(),
        "1.2.3\n"
    );
    let package_info = fs::read_to_string(out.path().join(PACKAGE_INFO_FILENAME)).unwrap();
    assert!(package_info.contains("Version: 1.2.3"));
    assert!(package_info.contains("Build-Date: 2025-01-27T00:00:00Z"));
    assert!(package_info.contains("Architecture: x64"));
}

/// Test: build output without the primary executable fails and creates no archive.
#[test]
fn missing_primary_executable_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let bundle = build_output(dir.path());
    fs::remove_file(bundle.join("myapp")).unwrap();
    let packager = packager(dir.path());

    let err = packager.package(&bundle).unwrap_err();

    assert!(matches!(err, PackageError::MissingBuildOutput { .. }));
    assert!(!packager.archive_path().exists());
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn missing_build_directory_is_a_precondition_failure() {
    let dir = TempDir::new().unwrap();
    let err = packager(dir.path())
        .package(&dir.path().join("does-not-exist"))
        .unwrap_err();
    assert!(matches!(err, PackageError::MissingBuildOutput { .. }));
    assert_eq!(err.kind(), shipline::error::ErrorClass::Precondition);
}

/// Test: the digest is recomputed from disk and matches what was recorded.
#[test]
fn recomputed_checksum_matches_recorded() {
    let dir = TempDir::new().unwrap();
    let bundle = build_output(dir.path());
    let artifact = packager(dir.path()).package(&bundle).unwrap();

    assert_eq!(sha256_file(&artifact.path).unwrap(), artifact.sha256);
    let reloaded = Artifact::from_archive(&artifact.path).unwrap();
    assert_eq!(reloaded, artifact);
}

/// Test: flipping one byte of the archive makes verification fail.
#[test]
fn single_byte_mutation_fails_verification() {
    let dir = TempDir::new().unwrap();
    let bundle = build_output(dir.path());
    let packager = packager(dir.path());
    let artifact = packager.package(&bundle).unwrap();

    let mut bytes = fs::read(&artifact.path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    fs::write(&artifact.path, &bytes).unwrap();

    assert!(!packager.verify_integrity(&artifact).unwrap());

    let reloaded = Artifact::from_archive(&artifact.path).unwrap();
    assert!(!packager.verify_integrity(&reloaded).unwrap());
}

#[test]
fn discard_removes_archive_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let bundle = build_output(dir.path());
    let artifact = packager(dir.path()).package(&bundle).unwrap();

    artifact.discard().unwrap();
    assert!(!artifact.path.exists());
    assert!(!artifact.sidecar_path().exists());
    artifact.discard().unwrap();
}
