use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::application::catalog::CatalogError;
use crate::application::images::ImageWriter;
use crate::application::repos::{BooksRepo, CreateBookParams, RepoError, UpdateBookParams};
use crate::domain::assets::{ImageAsset, Namespace};
use crate::domain::books::{BookForm, BookInput};
use crate::domain::entities::BookRecord;

const SOURCE: &str = "curio::books";

#[derive(Clone)]
pub struct BookService {
    repo: Arc<dyn BooksRepo>,
    images: Arc<ImageWriter>,
}

impl BookService {
    pub fn new(repo: Arc<dyn BooksRepo>, images: Arc<ImageWriter>) -> Self {
        Self { repo, images }
    }

    pub async fn find(&self, id: Uuid) -> Result<BookRecord, CatalogError> {
        self.repo.find_book(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Validate, run the image write path when an upload is attached, then
    /// persist the record and its image in one write.
    pub async fn create(
        &self,
        form: BookForm,
        upload: Option<Bytes>,
    ) -> Result<BookRecord, CatalogError> {
        let input = BookInput::try_from(form)?;
        let image = self.prepare_image(upload).await?;

        let result = self
            .repo
            .create_book(CreateBookParams {
                input,
                image: image.clone(),
            })
            .await;
        let record = self.settle(result, image.as_ref()).await?;

        info!(
            target = SOURCE,
            id = %record.id,
            slug = %record.slug,
            image = record.image.image_url.as_deref().unwrap_or(""),
            "book created"
        );
        Ok(record)
    }

    /// Without an upload the existing image reference is kept as is.
    pub async fn update(
        &self,
        id: Uuid,
        form: BookForm,
        upload: Option<Bytes>,
    ) -> Result<BookRecord, CatalogError> {
        let input = BookInput::try_from(form)?;
        self.find(id).await?;
        let image = self.prepare_image(upload).await?;

        let result = self
            .repo
            .update_book(UpdateBookParams {
                id,
                input,
                image: image.clone(),
            })
            .await;
        let record = self.settle(result, image.as_ref()).await?;

        info!(
            target = SOURCE,
            id = %record.id,
            slug = %record.slug,
            image_replaced = image.is_some(),
            "book updated"
        );
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        self.repo.delete_book(id).await?;
        info!(target = SOURCE, id = %id, "book deleted");
        Ok(())
    }

    async fn prepare_image(&self, upload: Option<Bytes>) -> Result<Option<ImageAsset>, CatalogError> {
        match upload {
            Some(bytes) => Ok(Some(self.images.prepare(Namespace::Books, bytes).await?)),
            None => Ok(None),
        }
    }

    async fn settle(
        &self,
        result: Result<BookRecord, RepoError>,
        image: Option<&ImageAsset>,
    ) -> Result<BookRecord, CatalogError> {
        match result {
            Ok(record) => Ok(record),
            Err(err) => {
                if let Some(asset) = image {
                    self.images.discard(Namespace::Books, asset).await;
                }
                Err(err.into())
            }
        }
    }
}
