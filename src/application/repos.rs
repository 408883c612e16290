//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::assets::{ImageAsset, Namespace, StoredImage};
use crate::domain::books::BookInput;
use crate::domain::entities::{BookRecord, GameRecord};
use crate::domain::games::GameInput;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Durable copy of every asset, co-located with its owning record.
///
/// Writes happen through the owning entity's repository so the blob and its
/// reference columns land in one statement; this port only covers lookup.
#[async_trait]
pub trait ImageBlobStore: Send + Sync {
    /// Find the stored image whose filename matches exactly, or whose public
    /// path ends in `/<filename>` for records that predate the filename column.
    ///
    /// `Ok(None)` is the expected result for unknown filenames.
    async fn find_image(
        &self,
        namespace: Namespace,
        filename: &str,
    ) -> Result<Option<StoredImage>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateBookParams {
    pub input: BookInput,
    pub image: Option<ImageAsset>,
}

#[derive(Debug, Clone)]
pub struct UpdateBookParams {
    pub id: Uuid,
    pub input: BookInput,
    /// `None` keeps the current image columns untouched.
    pub image: Option<ImageAsset>,
}

#[async_trait]
pub trait BooksRepo: Send + Sync {
    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError>;
    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError>;
    /// Fails with [`RepoError::NotFound`] when no book has the given id.
    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError>;
    /// Fails with [`RepoError::NotFound`] when no book has the given id.
    async fn delete_book(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateGameParams {
    pub input: GameInput,
    pub image: Option<ImageAsset>,
}

#[derive(Debug, Clone)]
pub struct UpdateGameParams {
    pub id: Uuid,
    pub input: GameInput,
    /// `None` keeps the current image columns untouched.
    pub image: Option<ImageAsset>,
}

#[async_trait]
pub trait GamesRepo: Send + Sync {
    async fn find_game(&self, id: Uuid) -> Result<Option<GameRecord>, RepoError>;
    async fn create_game(&self, params: CreateGameParams) -> Result<GameRecord, RepoError>;
    /// Fails with [`RepoError::NotFound`] when no game has the given id.
    async fn update_game(&self, params: UpdateGameParams) -> Result<GameRecord, RepoError>;
    /// Fails with [`RepoError::NotFound`] when no game has the given id.
    async fn delete_game(&self, id: Uuid) -> Result<(), RepoError>;
}
