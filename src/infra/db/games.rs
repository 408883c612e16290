use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateGameParams, GamesRepo, RepoError, UpdateGameParams},
    domain::{
        entities::{GameRecord, ImageReference},
        games::GameInput,
    },
};

use super::{PostgresRepositories, images::ImageBinds, map_sqlx_error};

const GAME_COLUMNS: &str = "id, slug, title, tagline, best_for, players, play_time, teach_time, \
    energy, brain_space, spice_level, why, when_to_skip, how_to_pitch, additional_notes, \
    conversation_spark, notes, link, image_url, image_filename, image_content_type, \
    created_at, updated_at";

#[derive(sqlx::FromRow)]
struct GameRow {
    id: Uuid,
    slug: String,
    title: String,
    tagline: Option<String>,
    best_for: Option<String>,
    players: Option<String>,
    play_time: Option<String>,
    teach_time: Option<String>,
    energy: Option<String>,
    brain_space: Option<String>,
    spice_level: Option<String>,
    why: Option<String>,
    when_to_skip: Option<String>,
    how_to_pitch: Option<String>,
    additional_notes: Option<String>,
    conversation_spark: Option<String>,
    notes: Option<String>,
    link: Option<String>,
    image_url: Option<String>,
    image_filename: Option<String>,
    image_content_type: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<GameRow> for GameRecord {
    fn from(row: GameRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            tagline: row.tagline,
            best_for: row.best_for,
            players: row.players,
            play_time: row.play_time,
            teach_time: row.teach_time,
            energy: row.energy,
            brain_space: row.brain_space,
            spice_level: row.spice_level,
            why: row.why,
            when_to_skip: row.when_to_skip,
            how_to_pitch: row.how_to_pitch,
            additional_notes: row.additional_notes,
            conversation_spark: row.conversation_spark,
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

/// Binds `$2..=$18` in column order of the game attribute list.
fn bind_game_fields<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, GameRow, sqlx::postgres::PgArguments>,
    input: GameInput,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, GameRow, sqlx::postgres::PgArguments> {
    query
        .bind(input.slug)
        .bind(input.title)
        .bind(input.tagline)
        .bind(input.best_for)
        .bind(input.players)
        .bind(input.play_time)
        .bind(input.teach_time)
        .bind(input.energy)
        .bind(input.brain_space)
        .bind(input.spice_level)
        .bind(input.why)
        .bind(input.when_to_skip)
        .bind(input.how_to_pitch)
        .bind(input.additional_notes)
        .bind(input.conversation_spark)
        .bind(input.notes)
        .bind(input.link)
}

#[async_trait]
impl GamesRepo for PostgresRepositories {
    async fn find_game(&self, id: Uuid) -> Result<Option<GameRecord>, RepoError> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1");
        let row = sqlx::query_as::<_, GameRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(GameRecord::from))
    }

    async fn create_game(&self, params: CreateGameParams) -> Result<GameRecord, RepoError> {
        let CreateGameParams { input, image } = params;
        let image = ImageBinds::from(image);

        let sql = format!(
            "INSERT INTO games (id, slug, title, tagline, best_for, players, play_time, \
                 teach_time, energy, brain_space, spice_level, why, when_to_skip, how_to_pitch, \
                 additional_notes, conversation_spark, notes, link, \
                 image_url, image_filename, image_content_type, image_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 $17, $18, $19, $20, $21, $22) \
             RETURNING {GAME_COLUMNS}"
        );

        let query = sqlx::query_as::<_, GameRow>(&sql).bind(Uuid::new_v4());
        let row = bind_game_fields(query, input)
            .bind(image.url)
            .bind(image.filename)
            .bind(image.content_type)
            .bind(image.data)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_game(&self, params: UpdateGameParams) -> Result<GameRecord, RepoError> {
        let UpdateGameParams { id, input, image } = params;
        let replace_image = image.is_some();
        let image = ImageBinds::from(image);

        let sql = format!(
            "UPDATE games SET slug = $2, title = $3, tagline = $4, best_for = $5, \
                 players = $6, play_time = $7, teach_time = $8, energy = $9, \
                 brain_space = $10, spice_level = $11, why = $12, when_to_skip = $13, \
                 how_to_pitch = $14, additional_notes = $15, conversation_spark = $16, \
                 notes = $17, link = $18, \
                 image_url = CASE WHEN $19 THEN $20 ELSE image_url END, \
                 image_filename = CASE WHEN $19 THEN $21 ELSE image_filename END, \
                 image_content_type = CASE WHEN $19 THEN $22 ELSE image_content_type END, \
                 image_data = CASE WHEN $19 THEN $23 ELSE image_data END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {GAME_COLUMNS}"
        );

        let query = sqlx::query_as::<_, GameRow>(&sql).bind(id);
        let row = bind_game_fields(query, input)
            .bind(replace_image)
            .bind(image.url)
            .bind(image.filename)
            .bind(image.content_type)
            .bind(image.data)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(GameRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_game(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM games WHERE id = $1")
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
