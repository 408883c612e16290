//! Errors shared by the owning-entity services.

use thiserror::Error;

use crate::application::images::TranscodeError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Image(#[from] TranscodeError),
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for CatalogError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => CatalogError::NotFound,
            other => CatalogError::Repo(other),
        }
    }
}
