//! Read path: disk cache first, durable store on miss, repair on the way out.

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::application::repos::{ImageBlobStore, RepoError};
use crate::domain::assets::{IMAGE_JPEG, Namespace, validate_filename};
use crate::infra::disk_cache::DiskCache;

use super::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_REPAIR, METRIC_CACHE_WRITE_FAILED,
    METRIC_NOT_FOUND,
};

const SOURCE: &str = "curio::images::resolver";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("durable image lookup failed")]
    Lookup(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    /// Served straight from the disk cache.
    Cache,
    /// Read from the durable store after a cache miss.
    Durable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub payload: Bytes,
    pub content_type: String,
    pub source: AssetSource,
}

/// Resolves requested filenames to image payloads.
///
/// The disk cache is never the source of truth: a miss falls back to the
/// durable store and rewrites the cache entry in a background task, so the
/// response never waits on the disk.
#[derive(Clone)]
pub struct AssetResolver {
    cache: DiskCache,
    blobs: Arc<dyn ImageBlobStore>,
    repairs: Arc<Mutex<JoinSet<()>>>,
}

impl AssetResolver {
    pub fn new(cache: DiskCache, blobs: Arc<dyn ImageBlobStore>) -> Self {
        Self {
            cache,
            blobs,
            repairs: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Wait for every cache repair spawned so far.
    pub async fn wait_for_repairs(&self) {
        let mut pending = {
            let mut repairs = self.repairs.lock().unwrap_or_else(PoisonError::into_inner);
            mem::take(&mut *repairs)
        };
        while let Some(joined) = pending.join_next().await {
            if let Err(err) = joined {
                warn!(target = SOURCE, error = %err, "cache repair task failed");
            }
        }
    }

    fn spawn_repair(&self, namespace: Namespace, filename: &str, payload: Bytes) {
        let cache = self.cache.clone();
        let filename = filename.to_string();
        let mut repairs = self.repairs.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished repairs so the set only holds in-flight writes.
        while repairs.try_join_next().is_some() {}
        repairs.spawn(async move { repair_cache(&cache, namespace, &filename, &payload).await });
    }

    /// `Ok(None)` means neither the cache nor the durable store knows the
    /// filename; callers delegate to their not-found handling.
    pub async fn resolve(
        &self,
        namespace: Namespace,
        filename: &str,
    ) -> Result<Option<ResolvedAsset>, ResolveError> {
        if let Err(err) = validate_filename(filename) {
            debug!(target = SOURCE, namespace = %namespace, error = %err, "rejected image filename");
            return Ok(None);
        }

        match self.cache.read(namespace, filename).await {
            Ok(Some(payload)) => {
                counter!(METRIC_CACHE_HIT, "namespace" => namespace.as_str()).increment(1);
                let content_type = mime_guess::from_path(filename)
                    .first_raw()
                    .unwrap_or(IMAGE_JPEG);
                return Ok(Some(ResolvedAsset {
                    payload,
                    content_type: content_type.to_string(),
                    source: AssetSource::Cache,
                }));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target = SOURCE,
                    namespace = %namespace,
                    filename,
                    error = %err,
                    "disk cache read failed, falling back to durable store"
                );
            }
        }

        counter!(METRIC_CACHE_MISS, "namespace" => namespace.as_str()).increment(1);

        let stored = match self.blobs.find_image(namespace, filename).await? {
            Some(stored) if !stored.payload.is_empty() => stored,
            _ => {
                counter!(METRIC_NOT_FOUND, "namespace" => namespace.as_str()).increment(1);
                return Ok(None);
            }
        };

        self.spawn_repair(namespace, filename, stored.payload.clone());

        Ok(Some(ResolvedAsset {
            content_type: stored.effective_content_type().to_string(),
            payload: stored.payload,
            source: AssetSource::Durable,
        }))
    }
}

async fn repair_cache(cache: &DiskCache, namespace: Namespace, filename: &str, payload: &[u8]) {
    match cache.write(namespace, filename, payload).await {
        Ok(path) => {
            counter!(METRIC_CACHE_REPAIR, "namespace" => namespace.as_str()).increment(1);
            debug!(
                target = SOURCE,
                namespace = %namespace,
                path = %path.display(),
                "repaired disk cache from durable store"
            );
        }
        Err(err) => {
            counter!(METRIC_CACHE_WRITE_FAILED, "namespace" => namespace.as_str())
                .increment(1);
            warn!(
                target = SOURCE,
                namespace = %namespace,
                filename,
                error = %err,
                "could not persist image to disk cache"
            );
        }
    }
}
