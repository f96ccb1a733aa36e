// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ArtifactError;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Where the tracker puts its artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Removes `dir` with everything below it, if it exists, then creates it again empty.
    fn recreate_dir(&self, dir: &Path) -> io::Result<()>;

    /// Creates or truncates `path`, writes `bytes` to it and returns how many bytes reached the
    /// file. A count lower than `bytes.len()` is a failed write.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<usize>;

    /// Deletes `path`. Used to discard artifacts that were only partially written.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Stores artifacts on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifactStore;

impl ArtifactStore for FsArtifactStore {
    fn recreate_dir(&self, dir: &Path) -> io::Result<()> {
        match fs::remove_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            // Stale artifacts are not worth failing over, creating the directory decides.
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Failed to clear dump directory")
            }
        }
        fs::create_dir_all(dir)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<usize> {
        let mut file = File::create(path)?;
        let mut written = 0;
        while written < bytes.len() {
            match file.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        file.flush()?;
        Ok(written)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Writes `bytes` to `path` through `store`, treating a short write like any other I/O failure.
/// A failed write leaves no file behind: a truncated artifact would pass for a complete one.
pub(crate) fn write_artifact(
    store: &dyn ArtifactStore,
    path: &Path,
    bytes: &[u8],
) -> Result<(), ArtifactError> {
    let result = match store.write(path, bytes) {
        Ok(written) if written == bytes.len() => Ok(()),
        Ok(written) => Err(ArtifactError::ShortWrite {
            path: path.to_path_buf(),
            expected: bytes.len(),
            written,
        }),
        Err(source) => Err(ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }),
    };
    match &result {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = bytes.len(),
            "Wrote GPU crash artifact"
        ),
        Err(_) => discard(store, path),
    }
    result
}

fn discard(store: &dyn ArtifactStore, path: &Path) {
    match store.remove(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!(
            path = %path.display(),
            error = %e,
            "Failed to remove partial GPU crash artifact"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes only the first half of every artifact to disk.
    struct HalfStore;

    impl ArtifactStore for HalfStore {
        fn recreate_dir(&self, dir: &Path) -> io::Result<()> {
            FsArtifactStore.recreate_dir(dir)
        }

        fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<usize> {
            FsArtifactStore.write(path, &bytes[..bytes.len() / 2])
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            FsArtifactStore.remove(path)
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn recreate_dir_clears_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("gpucrash");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("crash.nv-gpudmp"), b"stale").unwrap();

        FsArtifactStore.recreate_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn recreate_dir_creates_missing_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs").join("gpucrash");
        FsArtifactStore.recreate_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn write_overwrites_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("source_0000000000000001.spv");
        fs::write(&path, b"a much longer previous content").unwrap();

        write_artifact(&FsArtifactStore, &path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn short_write_is_an_error_and_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("crash.nv-gpudmp");
        let err = write_artifact(&HalfStore, &path, b"0123").unwrap_err();
        assert!(!path.exists());
        match err {
            ArtifactError::ShortWrite {
                expected, written, ..
            } => {
                assert_eq!(expected, 4);
                assert_eq!(written, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn write_into_missing_directory_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing").join("crash.nv-gpudmp");
        let err = write_artifact(&FsArtifactStore, &path, b"dump").unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
