mod image_store;
mod placeholder;

pub use image_store::{
    BlobSource, DEFAULT_CONTENT_TYPE, ImageBlob, ImageStore, compute_hash, guess_content_type,
    is_image_content_type,
};
pub use placeholder::render_placeholder_png;
