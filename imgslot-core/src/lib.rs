//! imgslot core - single-slot image storage guarded by a bearer-token gate

pub mod auth;
pub mod error;
pub mod storage;

pub use auth::{AccessGate, DEFAULT_API_KEY, bearer_token};
pub use error::{ImgSlotError, Result};
pub use storage::{
    BlobSource, DEFAULT_CONTENT_TYPE, ImageBlob, ImageStore, compute_hash, guess_content_type,
    is_image_content_type, render_placeholder_png,
};
