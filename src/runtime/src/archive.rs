//! Tar archive utilities.
//!
//! Handles unpacking image tarballs (docker save output, OCI layout
//! archives), sniffing their top-level entries, extracting layers
//! (tar or tar.gz) and verifying blob digests.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;
use imgscope_core::error::{Result, ScopeError};
use sha2::{Digest, Sha256};
use tar::Archive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a possibly gzip-compressed tar stream.
fn open_tar(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut file = File::open(path).map_err(|e| {
        ScopeError::Other(format!("Failed to open archive {}: {}", path.display(), e))
    })?;

    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if read == 2 && magic == GZIP_MAGIC {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(Archive::new(reader))
}

/// Whether `path` starts with the gzip magic bytes.
pub fn is_gzip(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    Ok(read == 2 && magic == GZIP_MAGIC)
}

/// Whether `path` is a readable tar archive (plain or gzip).
pub fn is_tar_archive(path: &Path) -> bool {
    let Ok(mut archive) = open_tar(path) else {
        return false;
    };
    let Ok(mut entries) = archive.entries() else {
        return false;
    };
    matches!(entries.next(), Some(Ok(_)))
}

/// Top-level entry names of a tar archive, without any leading `./`.
pub fn top_level_entries(path: &Path) -> Result<BTreeSet<String>> {
    let mut archive = open_tar(path)?;
    let mut names = BTreeSet::new();

    for entry in archive.entries().map_err(|e| {
        ScopeError::Other(format!("Failed to read archive {}: {}", path.display(), e))
    })? {
        let entry = entry.map_err(|e| {
            ScopeError::Other(format!("Failed to read archive {}: {}", path.display(), e))
        })?;
        let entry_path = entry.path()?.to_string_lossy().to_string();
        let trimmed = entry_path.trim_start_matches("./");
        if let Some(first) = trimmed.split('/').find(|s| !s.is_empty()) {
            names.insert(first.to_string());
        }
    }

    Ok(names)
}

/// Unpack an entire image tarball into `target_dir`.
pub fn unpack_archive(archive_path: &Path, target_dir: &Path) -> Result<()> {
    if !archive_path.is_file() {
        return Err(ScopeError::Other(format!(
            "Archive not found: {}",
            archive_path.display()
        )));
    }

    let mut archive = open_tar(archive_path)?;
    archive.unpack(target_dir).map_err(|e| {
        ScopeError::Other(format!(
            "Failed to unpack {} to {}: {}",
            archive_path.display(),
            target_dir.display(),
            e
        ))
    })?;

    tracing::debug!(
        archive = %archive_path.display(),
        target = %target_dir.display(),
        "Unpacked image archive"
    );

    Ok(())
}

/// Extract a single layer (tar or tar.gz) to `target_dir`.
///
/// Returns the number of regular files written.
///
/// # Errors
///
/// Returns error if:
/// - Layer file doesn't exist
/// - The media type names a compression we cannot decode
/// - Decompression or extraction fails
pub fn extract_layer(layer_path: &Path, media_type: &str, target_dir: &Path) -> Result<usize> {
    if !layer_path.exists() {
        return Err(ScopeError::Other(format!(
            "Layer file not found: {}",
            layer_path.display()
        )));
    }

    if media_type.contains("zstd") {
        return Err(ScopeError::UnsupportedMediaType(media_type.to_string()));
    }

    std::fs::create_dir_all(target_dir).map_err(|e| {
        ScopeError::Other(format!(
            "Failed to create target directory {}: {}",
            target_dir.display(),
            e
        ))
    })?;

    let mut archive = open_tar(layer_path)?;
    let extract_err = |e: std::io::Error| {
        ScopeError::Other(format!(
            "Failed to extract layer {} to {}: {}",
            layer_path.display(),
            target_dir.display(),
            e
        ))
    };

    let mut files = 0;
    for entry in archive.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        let is_file = entry.header().entry_type().is_file();
        // unpack_in refuses paths escaping target_dir
        if entry.unpack_in(target_dir).map_err(extract_err)? && is_file {
            files += 1;
        }
    }

    tracing::debug!(
        layer = %layer_path.display(),
        target = %target_dir.display(),
        files,
        "Extracted layer"
    );

    Ok(files)
}

/// Compute the `sha256:<hex>` digest of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = BufReader::new(File::open(path).map_err(|e| {
        ScopeError::Other(format!("Failed to open {}: {}", path.display(), e))
    })?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Verify a blob against its expected digest.
///
/// Only sha256 digests are checked; other algorithms are accepted as-is.
pub fn verify_digest(path: &Path, expected: &str) -> Result<()> {
    if !expected.starts_with("sha256:") {
        tracing::debug!(path = %path.display(), digest = expected, "Skipping digest verification");
        return Ok(());
    }

    let actual = sha256_file(path)?;
    if actual != expected {
        return Err(ScopeError::DigestMismatch {
            path: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extract_layer_gzip() {
        let temp_dir = TempDir::new().unwrap();
        let layer_path = temp_dir.path().join("layer.tar.gz");
        let target_dir = temp_dir.path().join("extracted");

        create_test_layer(
            &layer_path,
            &[("file1.txt", b"content1"), ("dir/file2.txt", b"content2")],
            true,
        );

        let files = extract_layer(
            &layer_path,
            "application/vnd.oci.image.layer.v1.tar+gzip",
            &target_dir,
        )
        .unwrap();

        assert_eq!(files, 2);
        assert_eq!(fs::read_to_string(target_dir.join("file1.txt")).unwrap(), "content1");
        assert_eq!(
            fs::read_to_string(target_dir.join("dir/file2.txt")).unwrap(),
            "content2"
        );
    }

    #[test]
    fn test_extract_layer_plain_tar() {
        let temp_dir = TempDir::new().unwrap();
        let layer_path = temp_dir.path().join("layer.tar");
        let target_dir = temp_dir.path().join("extracted");

        create_test_layer(&layer_path, &[("etc/os-release", b"ID=test")], false);

        let files = extract_layer(
            &layer_path,
            "application/vnd.docker.image.rootfs.diff.tar",
            &target_dir,
        )
        .unwrap();

        assert_eq!(files, 1);
        assert!(target_dir.join("etc/os-release").exists());
    }

    #[test]
    fn test_extract_layer_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = extract_layer(
            &temp_dir.path().join("missing.tar.gz"),
            "application/vnd.oci.image.layer.v1.tar+gzip",
            &temp_dir.path().join("out"),
        );

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Layer file not found"));
    }

    #[test]
    fn test_extract_layer_rejects_zstd() {
        let temp_dir = TempDir::new().unwrap();
        let layer_path = temp_dir.path().join("layer");
        create_test_layer(&layer_path, &[("a", b"a")], false);

        let err = extract_layer(
            &layer_path,
            "application/vnd.oci.image.layer.v1.tar+zstd",
            &temp_dir.path().join("out"),
        )
        .unwrap_err();

        assert!(matches!(err, ScopeError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_extract_layer_corrupt_data() {
        let temp_dir = TempDir::new().unwrap();
        let layer_path = temp_dir.path().join("layer.tar.gz");
        fs::write(&layer_path, [0x1f, 0x8b, 0x00, 0x01, 0x02, 0x03]).unwrap();

        let result = extract_layer(
            &layer_path,
            "application/vnd.oci.image.layer.v1.tar+gzip",
            &temp_dir.path().join("out"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_top_level_entries() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("image.tar");
        create_test_layer(
            &archive,
            &[
                ("./manifest.json", b"[]"),
                ("abc/layer.tar", b"x"),
                ("abc/json", b"{}"),
            ],
            false,
        );

        let names = top_level_entries(&archive).unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["abc".to_string(), "manifest.json".to_string()]
        );
    }

    #[test]
    fn test_is_tar_archive() {
        let temp_dir = TempDir::new().unwrap();
        let tar = temp_dir.path().join("a.tar");
        create_test_layer(&tar, &[("x", b"y")], false);
        let not_tar = temp_dir.path().join("b.txt");
        fs::write(&not_tar, "hello, this is not a tarball").unwrap();

        assert!(is_tar_archive(&tar));
        assert!(!is_tar_archive(&not_tar));
        assert!(!is_tar_archive(&temp_dir.path().join("missing")));
    }

    #[test]
    fn test_is_gzip() {
        let temp_dir = TempDir::new().unwrap();
        let plain = temp_dir.path().join("a.tar");
        let gz = temp_dir.path().join("a.tar.gz");
        create_test_layer(&plain, &[("x", b"y")], false);
        create_test_layer(&gz, &[("x", b"y")], true);

        assert!(!is_gzip(&plain).unwrap());
        assert!(is_gzip(&gz).unwrap());
        assert!(is_gzip(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_unpack_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("image.tar");
        create_test_layer(&archive, &[("index.json", b"{}"), ("blobs/sha256/aa", b"1")], false);

        let target = temp_dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        unpack_archive(&archive, &target).unwrap();

        assert!(target.join("index.json").exists());
        assert!(target.join("blobs/sha256/aa").exists());
    }

    #[test]
    fn test_sha256_and_verify_digest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blob");
        fs::write(&path, b"hello").unwrap();

        let digest = sha256_file(&path).unwrap();
        assert_eq!(
            digest,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(verify_digest(&path, &digest).is_ok());
        assert!(verify_digest(&path, "sha512:whatever").is_ok());

        let err = verify_digest(&path, "sha256:0000").unwrap_err();
        assert!(matches!(err, ScopeError::DigestMismatch { .. }));
    }

    fn create_test_layer(path: &Path, files: &[(&str, &[u8])], gzip: bool) {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use tar::Builder;

        fn write_entries<W: std::io::Write>(builder: &mut Builder<W>, files: &[(&str, &[u8])]) {
            for (name, content) in files {
                let mut header = tar::Header::new_gnu();
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, *content).unwrap();
            }
        }

        let file = File::create(path).unwrap();
        if gzip {
            let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
            write_entries(&mut builder, files);
            builder.into_inner().unwrap().finish().unwrap();
        } else {
            let mut builder = Builder::new(file);
            write_entries(&mut builder, files);
            builder.finish().unwrap();
        }
    }
}
