use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::application::catalog::CatalogError;
use crate::application::images::ImageWriter;
use crate::application::repos::{GamesRepo, CreateGameParams, RepoError, UpdateGameParams};
use crate::domain::assets::{ImageAsset, Namespace};
use crate::domain::games::{GameForm, GameInput};
use crate::domain::entities::GameRecord;

const SOURCE: &str = "curio::games";

#[derive(Clone)]
pub struct GameService {
    repo: Arc<dyn GamesRepo>,
    images: Arc<ImageWriter>,
}

impl GameService {
    pub fn new(repo: Arc<dyn GamesRepo>, images: Arc<ImageWriter>) -> Self {
        Self { repo, images }
    }

    pub async fn find(&self, id: Uuid) -> Result<GameRecord, CatalogError> {
        self.repo.find_game(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Validate, run the image write path when an upload is attached, then
    /// persist the record and its image in one write.
    pub async fn create(
        &self,
        form: GameForm,
        upload: Option<Bytes>,
    ) -> Result<GameRecord, CatalogError> {
        let input = GameInput::try_from(form)?;
        let image = self.prepare_image(upload).await?;

        let result = self
            .repo
            .create_game(CreateGameParams {
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
            "game created"
        );
        Ok(record)
    }

    /// Without an upload the existing image reference is kept as is.
    pub async fn update(
        &self,
        id: Uuid,
        form: GameForm,
        upload: Option<Bytes>,
    ) -> Result<GameRecord, CatalogError> {
        let input = GameInput::try_from(form)?;
        self.find(id).await?;
        let image = self.prepare_image(upload).await?;

        let result = self
            .repo
            .update_game(UpdateGameParams {
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
            "game updated"
        );
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        self.repo.delete_game(id).await?;
        info!(target = SOURCE, id = %id, "game deleted");
        Ok(())
    }

    async fn prepare_image(&self, upload: Option<Bytes>) -> Result<Option<ImageAsset>, CatalogError> {
        match upload {
            Some(bytes) => Ok(Some(self.images.prepare(Namespace::Games, bytes).await?)),
            None => Ok(None),
        }
    }

    async fn settle(
        &self,
        result: Result<GameRecord, RepoError>,
        image: Option<&ImageAsset>,
    ) -> Result<GameRecord, CatalogError> {
        match result {
            Ok(record) => Ok(record),
            Err(err) => {
                if let Some(asset) = image {
                    self.images.discard(Namespace::Games, asset).await;
                }
                Err(err.into())
            }
        }
    }
}
