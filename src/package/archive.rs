// ABOUTME: Staging-tree copy and gzip-compressed tar creation/extraction.
// ABOUTME: On unix symlinks are kept as links; elsewhere their targets are copied.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;

use super::PackageError;

/// Recursively copy `src` into `dst`, creating `dst` if needed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), PackageError> {
    let err = |what: &str, path: &Path, e| {
        PackageError::packaging(format!("{what} {}", path.display()), e)
    };

    std::fs::create_dir_all(dst).map_err(|e| err("creating", dst, e))?;

    for entry in std::fs::read_dir(src).map_err(|e| err("reading", src, e))? {
        let entry = entry.map_err(|e| err("reading", src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| err("inspecting", &src_path, e))?;

        if file_type.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            copy_link(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(|e| err("copying", &src_path, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> Result<(), PackageError> {
    let target = std::fs::read_link(src)
        .map_err(|e| PackageError::packaging(format!("reading link {}", src.display()), e))?;
    std::os::unix::fs::symlink(&target, dst)
        .map_err(|e| PackageError::packaging(format!("linking {}", dst.display()), e))
}

#[cfg(not(unix))]
fn copy_link(src: &Path, dst: &Path) -> Result<(), PackageError> {
    let meta = std::fs::metadata(src)
        .map_err(|e| PackageError::packaging(format!("following link {}", src.display()), e))?;
    if meta.is_dir() {
        return copy_tree(src, dst);
    }
    std::fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| PackageError::packaging(format!("copying {}", src.display()), e))
}

/// Compress the contents of `src_dir` into a `.tar.gz` at `dest`, with
/// entries rooted at the archive top level.
pub fn create_tar_gz(src_dir: &Path, dest: &Path) -> Result<(), PackageError> {
    let file = File::create(dest)
        .map_err(|e| PackageError::packaging(format!("creating {}", dest.display()), e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    builder
        .append_dir_all(".", src_dir)
        .map_err(|e| PackageError::packaging("adding files to archive", e))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| PackageError::packaging("finishing tar stream", e))?;
    encoder
        .finish()
        .map_err(|e| PackageError::packaging("finishing gzip stream", e))?;
    Ok(())
}

/// Extract a `.tar.gz` into `dest`.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), PackageError> {
    let file = File::open(archive)
        .map_err(|e| PackageError::packaging(format!("opening {}", archive.display()), e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest)
        .map_err(|e| PackageError::packaging(format!("extracting {}", archive.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_preserves_nested_layout() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("lib/plugins")).unwrap();
        std::fs::write(src.path().join("app"), "bin").unwrap();
        std::fs::write(src.path().join("lib/plugins/a.so"), "so").unwrap();

        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("staging");
        copy_tree(src.path(), &target).unwrap();

        assert_eq!(std::fs::read_to_string(target.join("app")).unwrap(), "bin");
        assert_eq!(std::fs::read_to_string(target.join("lib/plugins/a.so")).unwrap(), "so");
    }

    #[cfg(unix)]
    #[test]
    fn copy_keeps_symlinks_as_links() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("lib")).unwrap();
        std::fs::write(src.path().join("lib/a.so.1"), "so").unwrap();
        std::os::unix::fs::symlink("lib/a.so.1", src.path().join("a.so")).unwrap();

        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("staging");
        copy_tree(src.path(), &target).unwrap();

        assert!(target.join("a.so").is_symlink());
        assert_eq!(
            std::fs::read_link(target.join("a.so")).unwrap(),
            Path::new("lib/a.so.1")
        );
    }

    #[cfg(not(unix))]
    #[test]
    fn link_fallback_copies_the_target() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.dll"), "dll").unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_link(&src.path().join("a.dll"), &dst.path().join("a.dll")).unwrap();

        assert_eq!(std::fs::read_to_string(dst.path().join("a.dll")).unwrap(), "dll");
    }

    #[test]
    fn archive_then_extract() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir(src.path().join("data")).unwrap();
        std::fs::write(src.path().join("data/x.txt"), "x").unwrap();

        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("a.tar.gz");
        create_tar_gz(src.path(), &archive).unwrap();

        let unpacked = tempfile::tempdir().unwrap();
        extract_tar_gz(&archive, unpacked.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(unpacked.path().join("data/x.txt")).unwrap(),
            "x"
        );
    }

    #[test]
    fn truncated_archive_fails_to_extract() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("big.bin"), vec![7u8; 64 * 1024]).unwrap();
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("a.tar.gz");
        create_tar_gz(src.path(), &archive).unwrap();

        let bytes = std::fs::read(&archive).unwrap();
        std::fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

        let unpacked = tempfile::tempdir().unwrap();
        assert!(extract_tar_gz(&archive, unpacked.path()).is_err());
    }
}
