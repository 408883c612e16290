//! Filename-addressed local image cache.
//!
//! One flat directory per namespace under a common root. The directory may be
//! partially or fully empty at any time; absence of a file is a miss, never an
//! error.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::domain::assets::{FilenameError, Namespace, validate_filename};

#[derive(Debug, Error)]
pub enum DiskCacheError {
    #[error(transparent)]
    InvalidFilename(#[from] FilenameError),
    #[error("failed to read cached image `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to persist cached image `{path}`")]
    CachePersistFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem-backed image cache rooted at a single directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Namespace directories are created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn directory(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.as_str())
    }

    /// Absolute path of a cached asset, after filename validation.
    pub fn path_for(&self, namespace: Namespace, filename: &str) -> Result<PathBuf, FilenameError> {
        validate_filename(filename)?;
        Ok(self.directory(namespace).join(filename))
    }

    /// Read a cached asset. `Ok(None)` is a cache miss.
    pub async fn read(
        &self,
        namespace: Namespace,
        filename: &str,
    ) -> Result<Option<Bytes>, DiskCacheError> {
        let path = self.path_for(namespace, filename)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if is_missing(&err) => Ok(None),
            Err(source) => Err(DiskCacheError::Read { path, source }),
        }
    }

    /// Replace the cached asset atomically.
    ///
    /// The payload is written to a hidden sibling file first and renamed into
    /// place, so readers never observe a partially written image.
    pub async fn write(
        &self,
        namespace: Namespace,
        filename: &str,
        payload: &[u8],
    ) -> Result<PathBuf, DiskCacheError> {
        let path = self.path_for(namespace, filename)?;
        let directory = self.directory(namespace);
        let staging = directory.join(format!(".{filename}.{}.tmp", Uuid::new_v4().simple()));

        let persist = |source| DiskCacheError::CachePersistFailure {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&directory).await.map_err(persist)?;

        if let Err(err) = write_file(&staging, payload).await {
            let _ = fs::remove_file(&staging).await;
            return Err(persist(err));
        }

        if let Err(err) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(persist(err));
        }

        Ok(path)
    }

    /// Remove a cached asset. Missing files are treated as success.
    pub async fn remove(&self, namespace: Namespace, filename: &str) -> Result<(), DiskCacheError> {
        let path = self.path_for(namespace, filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if is_missing(&err) => Ok(()),
            Err(source) => Err(DiskCacheError::CachePersistFailure { path, source }),
        }
    }
}

async fn write_file(path: &Path, payload: &[u8]) -> Result<(), std::io::Error> {
    let mut file = fs::File::create(path).await?;
    file.write_all(payload).await?;
    file.flush().await?;
    file.sync_all().await
}

fn is_missing(err: &std::io::Error) -> bool {
    // A namespace path that is not a directory cannot hold the file either.
    matches!(
        err.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_write_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        assert_eq!(
            cache.read(Namespace::Games, "game-1.jpg").await.unwrap(),
            None
        );

        let path = cache
            .write(Namespace::Games, "game-1.jpg", b"jpeg")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("games").join("game-1.jpg"));

        let hit = cache.read(Namespace::Games, "game-1.jpg").await.unwrap();
        assert_eq!(hit.as_deref(), Some(&b"jpeg"[..]));

        // Namespaces are isolated.
        assert_eq!(
            cache.read(Namespace::Books, "game-1.jpg").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn write_replaces_whole_file_and_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        cache
            .write(Namespace::Books, "book-1.jpg", b"a much longer first payload")
            .await
            .unwrap();
        cache
            .write(Namespace::Books, "book-1.jpg", b"short")
            .await
            .unwrap();

        let hit = cache.read(Namespace::Books, "book-1.jpg").await.unwrap();
        assert_eq!(hit.as_deref(), Some(&b"short"[..]));

        let mut entries = std::fs::read_dir(cache.directory(Namespace::Books))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries, vec!["book-1.jpg".to_string()]);
    }

    #[tokio::test]
    async fn traversal_filenames_are_rejected_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("images"));

        let err = cache
            .read(Namespace::Books, "../secret.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, DiskCacheError::InvalidFilename(_)));

        let err = cache
            .write(Namespace::Books, "../escape.jpg", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, DiskCacheError::InvalidFilename(_)));
        assert!(!dir.path().join("escape.jpg").exists());
    }

    #[tokio::test]
    async fn write_failure_reports_cache_persist_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"file").unwrap();
        let cache = DiskCache::new(&blocker);

        let err = cache
            .write(Namespace::Games, "game-1.jpg", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, DiskCacheError::CachePersistFailure { .. }));

        // Reads under the same broken root are plain misses.
        assert_eq!(
            cache.read(Namespace::Games, "game-1.jpg").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .write(Namespace::Games, "game-2.jpg", b"x")
            .await
            .unwrap();

        cache.remove(Namespace::Games, "game-2.jpg").await.unwrap();
        cache.remove(Namespace::Games, "game-2.jpg").await.unwrap();
        assert_eq!(
            cache.read(Namespace::Games, "game-2.jpg").await.unwrap(),
            None
        );
    }
}
