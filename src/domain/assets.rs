//! Image asset identity and addressing.
//!
//! An asset is a transcoded cover image owned by exactly one book or game.
//! Its identifier doubles as the on-disk filename inside the namespace's
//! cache directory and as the last segment of its public URL path.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content type of every asset the transcoder produces.
pub const IMAGE_JPEG: &str = "image/jpeg";

/// File extension paired with [`IMAGE_JPEG`].
pub const ASSET_EXTENSION: &str = "jpg";

/// URL prefix under which all namespaces are served.
pub const PUBLIC_PREFIX: &str = "/images";

/// Asset category; each namespace has its own cache directory and prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Books,
    Games,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Books, Namespace::Games];

    /// Plural path segment, e.g. `games`.
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Books => "books",
            Namespace::Games => "games",
        }
    }

    /// Identifier prefix, e.g. `game`.
    pub fn singular(self) -> &'static str {
        match self {
            Namespace::Books => "book",
            Namespace::Games => "game",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown image namespace `{0}`")]
pub struct UnknownNamespace(pub String);

impl FromStr for Namespace {
    type Err = UnknownNamespace;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "books" => Ok(Namespace::Books),
            "games" => Ok(Namespace::Games),
            other => Err(UnknownNamespace(other.to_string())),
        }
    }
}

/// Errors raised when a requested filename cannot address a cached asset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("filename is empty")]
    Empty,
    #[error("filename `{0}` contains path components")]
    PathComponent(String),
}

/// Validate a filename taken from a request path.
///
/// Only a single plain path segment is accepted; anything that could escape
/// the namespace directory is rejected before touching the filesystem.
pub fn validate_filename(filename: &str) -> Result<(), FilenameError> {
    if filename.is_empty() {
        return Err(FilenameError::Empty);
    }
    if filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0'])
        || filename.starts_with('.')
    {
        return Err(FilenameError::PathComponent(filename.to_string()));
    }
    Ok(())
}

/// Time-derived asset identifier of the form `<singular>-<millis>.jpg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetIdentifier {
    namespace: Namespace,
    millis: i64,
}

impl AssetIdentifier {
    pub fn new(namespace: Namespace, millis: i64) -> Self {
        Self { namespace, millis }
    }

    /// Filename used both on disk and in the durable record.
    pub fn filename(&self) -> String {
        format!(
            "{}-{}.{ASSET_EXTENSION}",
            self.namespace.singular(),
            self.millis
        )
    }

    pub fn public_path(&self) -> PublicPath {
        PublicPath::new(self.namespace, &self.filename())
    }
}

impl fmt::Display for AssetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename())
    }
}

/// Stable URL path persisted on the owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicPath(String);

impl PublicPath {
    pub fn new(namespace: Namespace, filename: &str) -> Self {
        Self(format!("{PUBLIC_PREFIX}/{namespace}/{filename}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment, i.e. the filename the resolver will be asked for.
    pub fn filename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for PublicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transcoded image ready to be written to the cache and durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub filename: String,
    pub public_path: PublicPath,
    pub content_type: String,
    pub payload: Bytes,
}

/// Image columns as read back from an owning record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub payload: Bytes,
    pub content_type: Option<String>,
}

impl StoredImage {
    /// Content type to serve, falling back to the transcoder's type for legacy rows.
    pub fn effective_content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(IMAGE_JPEG)
    }
}
