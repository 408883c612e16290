//! Cover image pipeline: transcoding, write-through caching and read-repair.

mod identifiers;
mod resolver;
mod transcoder;
mod writer;

pub use identifiers::IdentifierClock;
pub use resolver::{AssetResolver, AssetSource, ResolveError, ResolvedAsset};
pub use transcoder::{TranscodeError, TranscodedImage, Transcoder};
pub use writer::ImageWriter;

use std::num::NonZeroU32;
use std::path::PathBuf;

pub const METRIC_CACHE_HIT: &str = "curio_image_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "curio_image_cache_miss_total";
pub const METRIC_CACHE_REPAIR: &str = "curio_image_cache_repair_total";
pub const METRIC_CACHE_WRITE_FAILED: &str = "curio_image_cache_write_failed_total";
pub const METRIC_NOT_FOUND: &str = "curio_image_not_found_total";
pub const METRIC_TRANSCODE_MS: &str = "curio_image_transcode_ms";

/// Explicit configuration handed to the resolver and writer at construction.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Root of the disk cache; each namespace is a subdirectory.
    pub cache_root: PathBuf,
    pub target_height: NonZeroU32,
    pub quality: u8,
}

impl ImageConfig {
    pub fn transcoder(&self) -> Transcoder {
        Transcoder::new(self.target_height, self.quality)
    }
}
