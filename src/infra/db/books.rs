use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{BooksRepo, CreateBookParams, RepoError, UpdateBookParams},
    domain::entities::{BookRecord, ImageReference},
};

use super::{PostgresRepositories, images::ImageBinds, map_sqlx_error};

const BOOK_COLUMNS: &str = "id, slug, title, author, summary, notes, link, \
    image_url, image_filename, image_content_type, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    slug: String,
    title: String,
    author: String,
    summary: Option<String>,
    notes: Option<String>,
    link: Option<String>,
    image_url: Option<String>,
    image_filename: Option<String>,
    image_content_type: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            author: row.author,
            summary: row.summary,
            notes: row.notes,
            link: row.link,
            image: ImageReference {
                image_url: row.image_url,
                image_filename: row.image_filename,
                image_content_type: row.image_content_type,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }

    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        let CreateBookParams { input, image } = params;
        let image = ImageBinds::from(image);

        let sql = format!(
            "INSERT INTO books (id, slug, title, author, summary, notes, link, \
                 image_url, image_filename, image_content_type, image_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {BOOK_COLUMNS}"
        );

        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.slug)
            .bind(input.title)
            .bind(input.author)
            .bind(input.summary)
            .bind(input.notes)
            .bind(input.link)
            .bind(image.url)
            .bind(image.filename)
            .bind(image.content_type)
            .bind(image.data)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError> {
        let UpdateBookParams { id, input, image } = params;
        let replace_image = image.is_some();
        let image = ImageBinds::from(image);

        let sql = format!(
            "UPDATE books SET slug = $2, title = $3, author = $4, summary = $5, notes = $6, \
                 link = $7, \
                 image_url = CASE WHEN $8 THEN $9 ELSE image_url END, \
                 image_filename = CASE WHEN $8 THEN $10 ELSE image_filename END, \
                 image_content_type = CASE WHEN $8 THEN $11 ELSE image_content_type END, \
                 image_data = CASE WHEN $8 THEN $12 ELSE image_data END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {BOOK_COLUMNS}"
        );

        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .bind(input.slug)
            .bind(input.title)
            .bind(input.author)
            .bind(input.summary)
            .bind(input.notes)
            .bind(input.link)
            .bind(replace_image)
            .bind(image.url)
            .bind(image.filename)
            .bind(image.content_type)
            .bind(image.data)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(BookRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_book(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
