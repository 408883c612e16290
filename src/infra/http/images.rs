use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::{
    application::{error::HttpError, images::ResolvedAsset},
    domain::assets::Namespace,
};

use super::{HttpState, not_found};

/// `GET /images/{namespace}/{filename}`.
pub(super) async fn serve_image(
    State(state): State<HttpState>,
    Path((namespace, filename)): Path<(String, String)>,
) -> Response {
    let Ok(namespace) = namespace.parse::<Namespace>() else {
        return not_found().await;
    };

    match state.resolver.resolve(namespace, &filename).await {
        Ok(Some(asset)) => build_image_response(asset),
        Ok(None) => not_found().await,
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn build_image_response(asset: ResolvedAsset) -> Response {
    let length = asset.payload.len();
    let mut response = Response::new(Body::from(asset.payload));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&asset.content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
