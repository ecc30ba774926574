// ABOUTME: SHA-256 digests of archives and their `<hex>  <filename>` sidecar files.
// ABOUTME: Digests are always recomputed from the file on disk.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::PackageError;

pub const SIDECAR_EXTENSION: &str = "sha256";

/// Hex-encoded SHA-256 of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<String, PackageError> {
    let file = File::open(path)
        .map_err(|e| PackageError::packaging(format!("opening {}", path.display()), e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)
        .map_err(|e| PackageError::packaging(format!("hashing {}", path.display()), e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Path of the sidecar for `archive`: `<archive>.sha256`.
pub fn sidecar_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

pub fn sidecar_line(digest: &str, filename: &str) -> String {
    format!("{digest}  {filename}\n")
}

pub fn write_sidecar(archive: &Path, digest: &str) -> Result<PathBuf, PackageError> {
    let path = sidecar_path(archive);
    let filename = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    std::fs::write(&path, sidecar_line(digest, &filename))
        .map_err(|e| PackageError::packaging(format!("writing {}", path.display()), e))?;
    Ok(path)
}

/// Parse a sidecar, returning `(digest, filename)`.
pub fn read_sidecar(path: &Path) -> Result<(String, String), PackageError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PackageError::packaging(format!("reading {}", path.display()), e))?;
    let invalid = |reason: &str| PackageError::InvalidSidecar {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let line = content.lines().next().ok_or_else(|| invalid("empty file"))?;
    let (digest, filename) = line
        .split_once("  ")
        .ok_or_else(|| invalid("expected '<digest>  <filename>'"))?;
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("digest is not 64 hex characters"));
    }
    Ok((digest.to_ascii_lowercase(), filename.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello\n").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn sidecar_format_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("app-1.0.0-x64.tar.gz");
        let digest = "a".repeat(64);
        let sidecar = write_sidecar(&archive, &digest).unwrap();

        assert_eq!(sidecar, dir.path().join("app-1.0.0-x64.tar.gz.sha256"));
        assert_eq!(
            std::fs::read_to_string(&sidecar).unwrap(),
            format!("{digest}  app-1.0.0-x64.tar.gz\n")
        );
        let (parsed, filename) = read_sidecar(&sidecar).unwrap();
        assert_eq!(parsed, digest);
        assert_eq!(filename, "app-1.0.0-x64.tar.gz");
    }

    #[test]
    fn single_space_sidecar_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("x.sha256");
        std::fs::write(&sidecar, format!("{} x\n", "b".repeat(64))).unwrap();
        assert!(matches!(
            read_sidecar(&sidecar),
            Err(PackageError::InvalidSidecar { .. })
        ));
    }
}
