//! Write path: transcode an upload and stage it in the disk cache.
//!
//! The durable copy is written by the owning entity's repository together
//! with the rest of the record; this type only prepares the asset for it.

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use crate::domain::assets::{ImageAsset, Namespace};
use crate::infra::disk_cache::DiskCache;

use super::{IdentifierClock, ImageConfig, METRIC_CACHE_WRITE_FAILED, TranscodeError, Transcoder};

const SOURCE: &str = "curio::images::writer";

#[derive(Debug)]
pub struct ImageWriter {
    transcoder: Transcoder,
    cache: DiskCache,
    clock: IdentifierClock,
}

impl ImageWriter {
    pub fn new(config: &ImageConfig, cache: DiskCache) -> Self {
        Self {
            transcoder: config.transcoder(),
            cache,
            clock: IdentifierClock::new(),
        }
    }

    /// Transcode `upload` under a fresh identifier and write it to the cache.
    ///
    /// Only transcoding failures are returned. A cache write failure is
    /// logged and ignored because the caller still persists the durable copy.
    pub async fn prepare(
        &self,
        namespace: Namespace,
        upload: Bytes,
    ) -> Result<ImageAsset, TranscodeError> {
        let identifier = self.clock.next(namespace);
        let transcoded = self.transcoder.transcode_blocking(upload).await?;
        let filename = identifier.filename();

        match self
            .cache
            .write(namespace, &filename, &transcoded.payload)
            .await
        {
            Ok(path) => debug!(
                target = SOURCE,
                namespace = %namespace,
                path = %path.display(),
                width = transcoded.width,
                height = transcoded.height,
                bytes = transcoded.payload.len(),
                "cached transcoded image"
            ),
            Err(err) => {
                counter!(METRIC_CACHE_WRITE_FAILED, "namespace" => namespace.as_str())
                    .increment(1);
                warn!(
                    target = SOURCE,
                    namespace = %namespace,
                    filename = %filename,
                    error = %err,
                    "could not persist image to disk cache"
                );
            }
        }

        Ok(ImageAsset {
            public_path: identifier.public_path(),
            filename,
            content_type: transcoded.content_type.to_string(),
            payload: transcoded.payload,
        })
    }

    /// Best-effort removal of a cached asset whose durable write failed.
    pub async fn discard(&self, namespace: Namespace, asset: &ImageAsset) {
        if let Err(err) = self.cache.remove(namespace, &asset.filename).await {
            warn!(
                target = SOURCE,
                namespace = %namespace,
                filename = %asset.filename,
                error = %err,
                "could not remove orphaned cache file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::application::images::testing::{jpeg_bytes, png_bytes};

    fn config(root: &std::path::Path) -> ImageConfig {
        ImageConfig {
            cache_root: root.to_path_buf(),
            target_height: NonZeroU32::new(300).unwrap(),
            quality: 80,
        }
    }

    #[tokio::test]
    async fn prepare_transcodes_and_caches_under_new_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let writer = ImageWriter::new(&cfg, DiskCache::new(&cfg.cache_root));

        let asset = writer
            .prepare(Namespace::Games, Bytes::from(jpeg_bytes(1200, 800)))
            .await
            .unwrap();

        assert!(asset.filename.starts_with("game-"));
        assert!(asset.filename.ends_with(".jpg"));
        assert_eq!(
            asset.public_path.as_str(),
            format!("/images/games/{}", asset.filename)
        );
        assert_eq!(asset.content_type, "image/jpeg");

        let cached = std::fs::read(dir.path().join("games").join(&asset.filename)).unwrap();
        assert_eq!(cached, asset.payload.as_ref());

        let decoded = image::load_from_memory(&asset.payload).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (450, 300));
    }

    #[tokio::test]
    async fn consecutive_uploads_never_share_an_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let writer = ImageWriter::new(&cfg, DiskCache::new(&cfg.cache_root));

        let first = writer
            .prepare(Namespace::Books, Bytes::from(png_bytes(20, 30)))
            .await
            .unwrap();
        let second = writer
            .prepare(Namespace::Books, Bytes::from(png_bytes(20, 30)))
            .await
            .unwrap();
        assert_ne!(first.filename, second.filename);
    }

    #[tokio::test]
    async fn cache_failure_does_not_fail_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"file").unwrap();
        let writer = ImageWriter::new(&config(&blocker), DiskCache::new(&blocker));

        let asset = writer
            .prepare(Namespace::Games, Bytes::from(png_bytes(10, 10)))
            .await
            .expect("durable copy can still be written");
        assert!(!asset.payload.is_empty());
    }

    #[tokio::test]
    async fn corrupt_upload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let writer = ImageWriter::new(&cfg, DiskCache::new(&cfg.cache_root));

        let err = writer
            .prepare(Namespace::Games, Bytes::from_static(b"<html>nope</html>"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::UnsupportedOrCorruptImage(_)));
        assert!(!dir.path().join("games").exists());
    }

    #[tokio::test]
    async fn discard_removes_cached_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let writer = ImageWriter::new(&cfg, DiskCache::new(&cfg.cache_root));
        let asset = writer
            .prepare(Namespace::Books, Bytes::from(png_bytes(10, 10)))
            .await
            .unwrap();

        writer.discard(Namespace::Books, &asset).await;
        assert!(!dir.path().join("books").join(&asset.filename).exists());
    }
}
