use crate::config::Config;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use imgslot_core::{AccessGate, ImageStore, ImgSlotError, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

mod external;
mod types;

use external::{get_image, health, update_image};
pub(crate) use types::*;

pub struct ServerState {
    pub(crate) store: Arc<ImageStore>,
    pub(crate) gate: AccessGate,
}

pub async fn run_server(config: Config) -> Result<()> {
    let gate = AccessGate::from_configured(config.api_key.clone());

    let store = Arc::new(
        ImageStore::open(
            config.storage.image_path.clone(),
            config.storage.placeholder_path.clone(),
            config.placeholder.enabled,
        )
        .await?,
    );

    tracing::info!(
        "Image slot at {:?}, placeholder at {:?}",
        store.image_path(),
        store.placeholder_path()
    );

    let state = Arc::new(ServerState { store, gate });
    let app = build_router(state.clone(), config.max_upload_bytes);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("imgslot listening on {}", config.bind_addr);
    if state.gate.uses_insecure_default() {
        tracing::error!("Uploads are accepted with the insecure development API key");
    }

    axum::serve(listener, app)
        .await
        .map_err(|error| ImgSlotError::Http(error.to_string()))?;

    Ok(())
}

pub(crate) fn build_router(state: Arc<ServerState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/update_image", post(update_image))
        .route("/get_image", get(get_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub(crate) fn status_for(error: &ImgSlotError) -> StatusCode {
    match error {
        ImgSlotError::Unauthorized => StatusCode::UNAUTHORIZED,
        ImgSlotError::InvalidContentType(_) | ImgSlotError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        ImgSlotError::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn response_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub(crate) fn unauthorized(message: impl Into<String>) -> Response {
    let mut response = response_error(StatusCode::UNAUTHORIZED, message);
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}
