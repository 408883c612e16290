//! Owning-entity endpoints. Every write accepts a multipart body whose text
//! parts are the entity fields and whose optional `image` part is the upload.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Multipart;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    application::error::HttpError,
    domain::{
        books::BookForm,
        entities::{BookRecord, GameRecord},
        games::GameForm,
    },
};

use super::{
    HttpState,
    multipart::{EntityPayload, read_entity_payload},
};

/// Write response body: enough to link to the record and its cover.
#[derive(Debug, Serialize)]
pub(super) struct EntitySummary {
    id: Uuid,
    slug: String,
    title: String,
    image_url: Option<String>,
}

impl From<BookRecord> for EntitySummary {
    fn from(record: BookRecord) -> Self {
        Self {
            id: record.id,
            slug: record.slug,
            title: record.title,
            image_url: record.image.image_url,
        }
    }
}

impl From<GameRecord> for EntitySummary {
    fn from(record: GameRecord) -> Self {
        Self {
            id: record.id,
            slug: record.slug,
            title: record.title,
            image_url: record.image.image_url,
        }
    }
}

pub(super) async fn create_book(
    State(state): State<HttpState>,
    mut multipart: Multipart,
) -> Response {
    let EntityPayload { form, image } = match read_entity_payload::<BookForm>(&mut multipart).await
    {
        Ok(payload) => payload,
        Err(err) => return err.into_http(state.upload_limit).into_response(),
    };

    match state.books.create(form, image).await {
        Ok(record) => (StatusCode::CREATED, Json(EntitySummary::from(record))).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn show_book(State(state): State<HttpState>, Path(id): Path<Uuid>) -> Response {
    match state.books.find(id).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn update_book(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Response {
    let EntityPayload { form, image } = match read_entity_payload::<BookForm>(&mut multipart).await
    {
        Ok(payload) => payload,
        Err(err) => return err.into_http(state.upload_limit).into_response(),
    };

    match state.books.update(id, form, image).await {
        Ok(record) => Json(EntitySummary::from(record)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn delete_book(State(state): State<HttpState>, Path(id): Path<Uuid>) -> Response {
    match state.books.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn create_game(
    State(state): State<HttpState>,
    mut multipart: Multipart,
) -> Response {
    let EntityPayload { form, image } = match read_entity_payload::<GameForm>(&mut multipart).await
    {
        Ok(payload) => payload,
        Err(err) => return err.into_http(state.upload_limit).into_response(),
    };

    match state.games.create(form, image).await {
        Ok(record) => (StatusCode::CREATED, Json(EntitySummary::from(record))).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn show_game(State(state): State<HttpState>, Path(id): Path<Uuid>) -> Response {
    match state.games.find(id).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn update_game(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Response {
    let EntityPayload { form, image } = match read_entity_payload::<GameForm>(&mut multipart).await
    {
        Ok(payload) => payload,
        Err(err) => return err.into_http(state.upload_limit).into_response(),
    };

    match state.games.update(id, form, image).await {
        Ok(record) => Json(EntitySummary::from(record)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn delete_game(State(state): State<HttpState>, Path(id): Path<Uuid>) -> Response {
    match state.games.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
