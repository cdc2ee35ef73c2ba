//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Enumerating directory trees into file snapshots
//! - Scanning a volume for media files
//! - Streaming file copies with live byte counters
//! - Creating directories

use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::classify::MediaClassifier;
use crate::error::EngineError;
use crate::model::{MediaCategory, MediaFile};
use crate::progress::TransferProgress;

/// Size of the buffer used for each read/write step of a copy.
pub const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Enumerate every regular file under `root`, recursively.
///
/// Symlinks are not followed. Any error reading a directory or an entry fails
/// the whole enumeration.
///
/// # Errors
/// Returns `EngineError::EnumerationFailed` naming the directory that could not be read.
pub fn enumerate_files(root: &Path) -> Result<Vec<MediaFile>, EngineError> {
    let mut files = Vec::new();

    fn recurse(path: &Path, files: &mut Vec<MediaFile>) -> Result<(), EngineError> {
        let enumeration_failed = |e: io::Error| EngineError::EnumerationFailed {
            path: path.to_path_buf(),
            source: e,
        };

        for entry in fs::read_dir(path).map_err(enumeration_failed)? {
            let entry = entry.map_err(enumeration_failed)?;
            let file_type = entry.file_type().map_err(enumeration_failed)?;
            let entry_path = entry.path();

            if file_type.is_dir() {
                recurse(&entry_path, files)?;
            } else if file_type.is_file() {
                let metadata = entry.metadata().map_err(enumeration_failed)?;
                let modified: DateTime<Local> = metadata
                    .modified()
                    .map_err(enumeration_failed)?
                    .into();
                files.push(MediaFile::new(entry_path, metadata.len(), modified));
            }
        }
        Ok(())
    }

    recurse(root, &mut files)?;
    Ok(files)
}

/// List the media files under `root` whose category is enabled in `classifier`.
///
/// # Errors
/// Propagates enumeration failures; callers decide whether they are fatal.
pub fn scan_media(root: &Path, classifier: &MediaClassifier) -> Result<Vec<MediaFile>, EngineError> {
    let mut files = enumerate_files(root)?;
    files.retain(|f| classifier.category_of(f) != MediaCategory::None);
    Ok(files)
}

/// Result of one successful copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Copy `src` to `dst` through a fixed-size buffer, adding each written chunk
/// to `progress` as it goes.
///
/// The destination must not exist yet. It is synced before it is closed and stamped with the source
/// modification time. On failure the partially written destination is removed.
///
/// # Errors
/// `ReadError` for source failures, `WriteError` for destination failures.
pub fn copy_file_streaming(
    src: &Path,
    dst: &Path,
    expected_len: u64,
    progress: &TransferProgress,
) -> Result<CopyStats, EngineError> {
    let started = Instant::now();

    let mut src_file = File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;
    let src_mtime = src_file.metadata().and_then(|m| m.modified()).ok();

    // Never replace an existing archive file.
    let dst_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .map_err(|e| EngineError::WriteError {
            path: dst.to_path_buf(),
            source: e,
        })?;

    let bytes = match stream(&mut src_file, dst_file, src, dst, progress) {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(dst) {
                tracing::warn!(
                    "Could not remove partial file {}: {}",
                    dst.display(),
                    cleanup
                );
            }
            return Err(e);
        }
    };

    if bytes != expected_len {
        tracing::warn!(
            "{} changed size while copying: expected {} bytes, copied {}",
            src.display(),
            expected_len,
            bytes
        );
    }

    if let Some(mtime) = src_mtime {
        if let Err(e) = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime)) {
            tracing::debug!("Could not preserve mtime on {}: {}", dst.display(), e);
        }
    }

    Ok(CopyStats {
        bytes,
        elapsed: started.elapsed(),
    })
}

fn stream(
    src_file: &mut File,
    mut dst_file: File,
    src: &Path,
    dst: &Path,
    progress: &TransferProgress,
) -> Result<u64, EngineError> {
    let write_error = |e: io::Error| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    };

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let read = match src_file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(EngineError::ReadError {
                    path: src.to_path_buf(),
                    source: e,
                })
            }
        };
        dst_file.write_all(&buffer[..read]).map_err(write_error)?;
        copied += read as u64;
        progress.add_file_bytes(read as u64);
    }

    dst_file.sync_all().map_err(write_error)?;
    Ok(copied)
}

/// Create `path` and any missing parents.
///
/// # Errors
/// Returns `DirectoryCreationFailed` if the directory cannot be created or a
/// non-directory is in the way.
pub fn ensure_dir(path: &Path) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ExtensionSet;
    use crate::model::EnabledCategories;
    use std::time::SystemTime;

    fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        let mut file = File::create(path).expect("Failed to create file");
        file.write_all(contents).expect("Failed to write file");
    }

    #[test]
    fn test_enumerate_nested_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write_file(&root.join("a.mp4"), b"data1");
        write_file(&root.join("DCIM/100CANON/b.jpg"), b"data22");
        fs::create_dir_all(root.join("empty")).expect("Failed to create dir");

        let mut files = enumerate_files(root).expect("Failed to enumerate");
        files.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.mp4");
        assert_eq!(files[0].len, 5);
        assert_eq!(files[1].name, "b.jpg");
        assert_eq!(files[1].extension, "jpg");
        assert_eq!(files[1].len, 6);
    }

    #[test]
    fn test_enumerate_nonexistent_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = enumerate_files(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(EngineError::EnumerationFailed { .. })));
    }

    #[test]
    fn test_scan_media_filters_by_enabled_category() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write_file(&root.join("clip.MP4"), b"v");
        write_file(&root.join("DCIM/photo.jpg"), b"p");
        write_file(&root.join("DCIM/notes.txt"), b"t");

        let videos = ExtensionSet::parse("mp4");
        let photos = ExtensionSet::parse("jpg");

        let all = MediaClassifier::new(videos.clone(), photos.clone(), EnabledCategories::all());
        let mut names: Vec<String> = scan_media(root, &all)
            .expect("Failed to scan")
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["clip.MP4", "photo.jpg"]);

        let photos_only = MediaClassifier::new(
            videos,
            photos,
            EnabledCategories {
                videos: false,
                photos: true,
            },
        );
        let files = scan_media(root, &photos_only).expect("Failed to scan");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "photo.jpg");
    }

    #[test]
    fn test_copy_streams_in_chunks() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("big.mov");
        let dst = temp_dir.path().join("out.mov");
        let contents: Vec<u8> = (0..(COPY_BUFFER_SIZE * 2 + 12345))
            .map(|i| (i % 251) as u8)
            .collect();
        write_file(&src, &contents);

        let progress = TransferProgress::new();
        progress.begin_run(1, contents.len() as u64);
        progress.begin_file(0, "big.mov", contents.len() as u64);

        let stats = copy_file_streaming(&src, &dst, contents.len() as u64, &progress)
            .expect("Failed to copy");

        assert_eq!(stats.bytes, contents.len() as u64);
        assert_eq!(progress.current_file_bytes(), contents.len() as u64);
        assert_eq!(fs::read(&dst).expect("Failed to read dest"), contents);
    }

    #[test]
    fn test_copy_preserves_modification_time() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a.jpg");
        let dst = temp_dir.path().join("b.jpg");
        write_file(&src, b"jpeg bytes");

        let mtime = filetime::FileTime::from_unix_time(1_704_103_200, 0);
        filetime::set_file_mtime(&src, mtime).expect("Failed to set mtime");

        copy_file_streaming(&src, &dst, 10, &TransferProgress::new()).expect("Failed to copy");

        let copied: SystemTime = fs::metadata(&dst)
            .and_then(|m| m.modified())
            .expect("Failed to read mtime");
        assert_eq!(filetime::FileTime::from_system_time(copied).unix_seconds(), 1_704_103_200);
    }

    #[test]
    fn test_copy_missing_source_is_read_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("out.mp4");
        let result = copy_file_streaming(
            &temp_dir.path().join("gone.mp4"),
            &dst,
            0,
            &TransferProgress::new(),
        );
        assert!(matches!(result, Err(EngineError::ReadError { .. })));
        assert!(!dst.exists());
    }

    #[test]
    fn test_copy_into_missing_directory_is_write_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a.mp4");
        write_file(&src, b"abc");
        let result = copy_file_streaming(
            &src,
            &temp_dir.path().join("nope/a.mp4"),
            3,
            &TransferProgress::new(),
        );
        assert!(matches!(result, Err(EngineError::WriteError { .. })));
    }

    #[test]
    fn test_copy_never_overwrites_existing_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("DSC_0001.JPG");
        let dst = temp_dir.path().join("archived.JPG");
        write_file(&src, b"new shot, different size");
        write_file(&dst, b"earlier shot");

        let result = copy_file_streaming(&src, &dst, 25, &TransferProgress::new());

        assert!(matches!(result, Err(EngineError::WriteError { .. })));
        assert_eq!(fs::read(&dst).expect("Failed to read dest"), b"earlier shot");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_copy_removes_partial_output() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        // Opening a directory succeeds on unix but reading it fails.
        let src = temp_dir.path().join("not_a_file");
        fs::create_dir(&src).expect("Failed to create dir");
        let dst = temp_dir.path().join("out.mp4");

        let result = copy_file_streaming(&src, &dst, 0, &TransferProgress::new());
        assert!(matches!(result, Err(EngineError::ReadError { .. })));
        assert!(!dst.exists(), "partial output should be removed");
    }

    #[test]
    fn test_ensure_dir() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let nested = temp_dir.path().join("a/b/c");
        ensure_dir(&nested).expect("Failed to create dirs");
        assert!(nested.is_dir());
        ensure_dir(&nested).expect("Existing dir should be fine");

        let file = temp_dir.path().join("file");
        write_file(&file, b"x");
        assert!(matches!(
            ensure_dir(&file),
            Err(EngineError::DirectoryCreationFailed { .. })
        ));
    }
}
