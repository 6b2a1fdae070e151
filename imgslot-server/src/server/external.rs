use super::{
    HealthResponse, MessageResponse, ServerState, response_error, status_for, unauthorized,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use imgslot_core::{bearer_token, is_image_content_type};
use std::sync::Arc;

const FILE_FIELD: &str = "file";

struct Upload {
    data: Bytes,
    content_type: String,
}

pub(crate) async fn health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        image_present: state.store.has_image().await,
    })
}

pub(crate) async fn update_image(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    if let Err(error) = state.gate.authorize(presented) {
        tracing::warn!("Rejected upload: {}", error);
        return unauthorized(error.to_string());
    }

    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return response_error(rejection.status(), rejection.body_text()),
    };

    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    let size_bytes = upload.data.len();
    match state.store.put(upload.data, &upload.content_type).await {
        Ok(()) => {
            tracing::info!(
                "Stored new image: {} bytes, content type {}",
                size_bytes,
                upload.content_type
            );
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "image uploaded".to_string(),
                }),
            )
                .into_response()
        }
        Err(error) => {
            let status = status_for(&error);
            if status.is_server_error() {
                tracing::error!("Failed to store uploaded image: {}", error);
            }
            response_error(status, error.to_string())
        }
    }
}

/// Pull the file part out of the multipart body. The part named `file` wins;
/// otherwise the first part carrying a filename is taken.
async fn read_upload(mut multipart: Multipart) -> std::result::Result<Upload, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return Err(response_error(
                    StatusCode::BAD_REQUEST,
                    format!("missing multipart file field '{}'", FILE_FIELD),
                ));
            }
            Err(error) => return Err(response_error(error.status(), error.body_text())),
        };

        if field.name() != Some(FILE_FIELD) && field.file_name().is_none() {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_image_content_type(&content_type) {
            return Err(response_error(
                StatusCode::BAD_REQUEST,
                format!("File must be an image, got content type: {}", content_type),
            ));
        }

        return match field.bytes().await {
            Ok(data) => Ok(Upload { data, content_type }),
            Err(error) => Err(response_error(error.status(), error.body_text())),
        };
    }
}

pub(crate) async fn get_image(State(state): State<Arc<ServerState>>) -> Response {
    let blob = match state.store.get().await {
        Ok(blob) => blob,
        Err(error) => {
            let status = status_for(&error);
            if status.is_server_error() {
                tracing::error!("Failed to read image: {}", error);
            }
            return response_error(status, error.to_string());
        }
    };

    let etag = format!("\"{}\"", blob.sha256());

    let mut response = Response::new(Body::from(blob.bytes));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(blob.content_type),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(value) = HeaderValue::from_str(&etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response.headers_mut().insert(
        "x-imgslot-source",
        HeaderValue::from_static(blob.source.as_str()),
    );

    response
}
