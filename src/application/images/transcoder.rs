//! Normalizes arbitrary uploads into bounded-height JPEGs.

use std::io::Cursor;
use std::num::NonZeroU32;
use std::time::Instant;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, GenericImageView, ImageError, ImageReader, Limits};
use metrics::histogram;
use thiserror::Error;

use crate::domain::assets::IMAGE_JPEG;

use super::METRIC_TRANSCODE_MS;

/// Largest accepted source edge, checked from the header before decoding.
pub const MAX_SOURCE_EDGE: u32 = 16_384;
/// Decoder allocation ceiling.
pub const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;
/// Widest output the transcoder will produce at the target height.
pub const MAX_OUTPUT_WIDTH: u32 = 8_192;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("uploaded image is empty")]
    EmptyPayload,
    #[error("unsupported or corrupt image")]
    UnsupportedOrCorruptImage(#[source] ImageError),
    #[error("image of {width}x{height} would scale to {target_width} px wide, above the output limit")]
    AspectRatioTooWide {
        width: u32,
        height: u32,
        target_width: u32,
    },
    #[error("failed to encode jpeg: {0}")]
    Encode(#[source] ImageError),
    #[error("transcode task failed: {0}")]
    Join(String),
}

impl TranscodeError {
    /// Whether the failure is attributable to the uploaded bytes.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranscodeError::EmptyPayload
                | TranscodeError::UnsupportedOrCorruptImage(_)
                | TranscodeError::AspectRatioTooWide { .. }
        )
    }
}

/// Transcoded payload plus the metadata consumers rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodedImage {
    pub payload: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Height-normalizing JPEG transcoder.
#[derive(Debug, Clone, Copy)]
pub struct Transcoder {
    target_height: NonZeroU32,
    quality: u8,
}

impl Transcoder {
    pub fn new(target_height: NonZeroU32, quality: u8) -> Self {
        Self {
            target_height,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn target_height(&self) -> u32 {
        self.target_height.get()
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decode, resize to the target height and re-encode as JPEG.
    ///
    /// Width follows the source aspect ratio; nothing is cropped or padded.
    pub fn transcode(&self, input: &[u8]) -> Result<TranscodedImage, TranscodeError> {
        if input.is_empty() {
            return Err(TranscodeError::EmptyPayload);
        }

        // Dimensions come from the header so oversized outputs fail before any pixel work.
        let (src_w, src_h) = limited_reader(input)?
            .into_dimensions()
            .map_err(TranscodeError::UnsupportedOrCorruptImage)?;
        let target_h = self.target_height.get();
        let target_w = scaled_width(src_w, src_h, target_h);
        if target_w > MAX_OUTPUT_WIDTH {
            return Err(TranscodeError::AspectRatioTooWide {
                width: src_w,
                height: src_h,
                target_width: target_w,
            });
        }

        let decoded = limited_reader(input)?
            .decode()
            .map_err(TranscodeError::UnsupportedOrCorruptImage)?;

        // JPEG has no alpha channel.
        let rgb = decoded.to_rgb8();
        let resized = if src_w == target_w && src_h == target_h {
            rgb
        } else {
            image::imageops::resize(&rgb, target_w, target_h, FilterType::Lanczos3)
        };

        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(resized.as_raw(), target_w, target_h, ColorType::Rgb8.into())
            .map_err(TranscodeError::Encode)?;

        Ok(TranscodedImage {
            payload: Bytes::from(out.into_inner()),
            content_type: IMAGE_JPEG,
            width: target_w,
            height: target_h,
        })
    }

    /// Run [`Transcoder::transcode`] on the blocking pool.
    pub async fn transcode_blocking(&self, input: Bytes) -> Result<TranscodedImage, TranscodeError> {
        let transcoder = *self;
        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || transcoder.transcode(&input))
            .await
            .map_err(|err| TranscodeError::Join(err.to_string()))?;
        histogram!(METRIC_TRANSCODE_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }
}

fn limited_reader(input: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, TranscodeError> {
    let mut reader = ImageReader::new(Cursor::new(input))
        .with_guessed_format()
        .map_err(|err| TranscodeError::UnsupportedOrCorruptImage(ImageError::IoError(err)))?;
    reader.limits(decode_limits());
    Ok(reader)
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_EDGE);
    limits.max_image_height = Some(MAX_SOURCE_EDGE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

fn scaled_width(src_w: u32, src_h: u32, target_h: u32) -> u32 {
    let scaled = (src_w as f64) * (target_h as f64) / (src_h.max(1) as f64);
    // `as` saturates, so absurd ratios still compare above the output cap.
    (scaled.round() as u32).max(1)
}
