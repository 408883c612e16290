//! Multipart entity form parsing.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::error;

use crate::application::error::HttpError;

const SOURCE: &str = "infra::http::multipart";

/// Name of the file field carrying the raw image upload.
pub(super) const IMAGE_FIELD: &str = "image";

#[derive(Debug)]
pub(super) enum FormPayloadError {
    PayloadTooLarge,
    InvalidFormData,
    Read { detail: String },
}

impl FormPayloadError {
    pub(super) fn into_http(self, limit_bytes: u64) -> HttpError {
        match self {
            FormPayloadError::PayloadTooLarge => HttpError::new(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Upload is too large",
                format!("request body exceeds {limit_bytes} bytes"),
            ),
            FormPayloadError::InvalidFormData => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Form data was invalid",
                "multipart body could not be decoded",
            ),
            FormPayloadError::Read { detail } => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Form data was invalid",
                detail,
            ),
        }
    }
}

/// Entity form fields plus the optional image upload.
#[derive(Debug)]
pub(super) struct EntityPayload<F> {
    pub(super) form: F,
    /// `None` when no file was attached or the file part was empty.
    pub(super) image: Option<Bytes>,
}

/// Read every part of `multipart`: text parts become form fields, the
/// `image` part becomes the upload. Later duplicates of a field win.
pub(super) async fn read_entity_payload<F: DeserializeOwned>(
    multipart: &mut Multipart,
) -> Result<EntityPayload<F>, FormPayloadError> {
    let mut fields = Map::new();
    let mut image = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };

                if name == IMAGE_FIELD {
                    let bytes = field.bytes().await.map_err(read_error)?;
                    image = (!bytes.is_empty()).then_some(bytes);
                    continue;
                }

                let value = field.text().await.map_err(read_error)?;
                fields.insert(name, Value::String(value));
            }
            Ok(None) => break,
            Err(err) => return Err(read_error(err)),
        }
    }

    let form = serde_json::from_value(Value::Object(fields))
        .map_err(|_| FormPayloadError::InvalidFormData)?;

    Ok(EntityPayload { form, image })
}

fn read_error(err: axum_extra::extract::multipart::MultipartError) -> FormPayloadError {
    let status = err.status();
    error!(
        target = SOURCE,
        status = status.as_u16(),
        error = %err,
        "failed to read multipart payload"
    );
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => FormPayloadError::PayloadTooLarge,
        StatusCode::BAD_REQUEST => FormPayloadError::InvalidFormData,
        _ => FormPayloadError::Read {
            detail: err.to_string(),
        },
    }
}
