use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    application::repos::{ImageBlobStore, RepoError},
    domain::assets::{ImageAsset, Namespace, StoredImage},
};

use super::{PostgresRepositories, escape_like, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ImageRow {
    image_data: Vec<u8>,
    image_content_type: Option<String>,
}

/// Owning table per namespace. Only these literals are ever interpolated.
fn table_for(namespace: Namespace) -> &'static str {
    match namespace {
        Namespace::Books => "books",
        Namespace::Games => "games",
    }
}

/// `LIKE` pattern matching public paths that end in `/<filename>`.
fn legacy_suffix_pattern(filename: &str) -> String {
    format!("%/{}", escape_like(filename))
}

/// Image column binds; all `None` when no new image accompanies the write.
pub(super) struct ImageBinds {
    pub(super) url: Option<String>,
    pub(super) filename: Option<String>,
    pub(super) content_type: Option<String>,
    pub(super) data: Option<Vec<u8>>,
}

impl From<Option<ImageAsset>> for ImageBinds {
    fn from(image: Option<ImageAsset>) -> Self {
        match image {
            Some(asset) => Self {
                url: Some(asset.public_path.to_string()),
                filename: Some(asset.filename),
                content_type: Some(asset.content_type),
                data: Some(asset.payload.to_vec()),
            },
            None => Self {
                url: None,
                filename: None,
                content_type: None,
                data: None,
            },
        }
    }
}

#[async_trait]
impl ImageBlobStore for PostgresRepositories {
    async fn find_image(
        &self,
        namespace: Namespace,
        filename: &str,
    ) -> Result<Option<StoredImage>, RepoError> {
        let table = table_for(namespace);
        // Exact filename matches win over the legacy public-path suffix match.
        let sql = format!(
            "SELECT image_data, image_content_type FROM {table} \
             WHERE image_data IS NOT NULL \
               AND (image_filename = $1 OR image_url LIKE $2 ESCAPE '\\') \
             ORDER BY (image_filename IS NOT DISTINCT FROM $1) DESC, updated_at DESC \
             LIMIT 1"
        );

        let row = sqlx::query_as::<_, ImageRow>(&sql)
            .bind(filename)
            .bind(legacy_suffix_pattern(filename))
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|row| StoredImage {
            payload: Bytes::from(row.image_data),
            content_type: row.image_content_type,
        }))
    }
}
