use crate::error::{ImgSlotError, Result};
use crate::storage::placeholder::render_placeholder_png;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

/// Content type reported when a stored blob's format cannot be detected.
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobSource {
    Stored,
    Placeholder,
}

impl BlobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobSource::Stored => "stored",
            BlobSource::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub bytes: Bytes,
    /// Sniffed from the stored bytes on every read; the type declared at
    /// upload time is not persisted. Unrecognized formats (SVG included)
    /// report [`DEFAULT_CONTENT_TYPE`].
    pub content_type: &'static str,
    pub source: BlobSource,
}

impl ImageBlob {
    fn new(bytes: Bytes, source: BlobSource) -> Self {
        let content_type = detect_content_type(&bytes);
        Self {
            bytes,
            content_type,
            source,
        }
    }

    pub fn sha256(&self) -> String {
        compute_hash(&self.bytes)
    }
}

/// ImageStore owns the single image slot on disk plus the placeholder served
/// while the slot is empty.
///
/// Every read and write of either file goes through `lock`. Writers take it
/// exclusively and land the new bytes with write-to-temp + rename, so a reader
/// only ever sees a fully committed file.
///
/// Writes run on the blocking pool with an owned guard. Dropping the caller's
/// future does not abort them: the write finishes (or fails and cleans up)
/// before the lock is released.
pub struct ImageStore {
    image_path: PathBuf,
    placeholder_path: PathBuf,
    lock: Arc<RwLock<()>>,
}

impl ImageStore {
    pub fn new(image_path: PathBuf, placeholder_path: PathBuf) -> Result<Self> {
        for path in [&image_path, &placeholder_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            image_path,
            placeholder_path,
            lock: Arc::new(RwLock::new(())),
        })
    }

    /// Construct the store and, when `synthesize_placeholder` is set, make sure
    /// a placeholder exists. Placeholder failures are logged, never returned.
    pub async fn open(
        image_path: PathBuf,
        placeholder_path: PathBuf,
        synthesize_placeholder: bool,
    ) -> Result<Self> {
        let store = Self::new(image_path, placeholder_path)?;

        if synthesize_placeholder {
            match store.ensure_placeholder().await {
                Ok(true) => tracing::info!(
                    "Created placeholder image at {:?}",
                    store.placeholder_path
                ),
                Ok(false) => {}
                Err(error) => tracing::warn!(
                    "Failed to create placeholder image, continuing without one: {}",
                    error
                ),
            }
        }

        Ok(store)
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn placeholder_path(&self) -> &Path {
        &self.placeholder_path
    }

    /// Replace the slot contents with `data`.
    pub async fn put(&self, data: Bytes, content_type: &str) -> Result<()> {
        if !is_image_content_type(content_type) {
            return Err(ImgSlotError::InvalidContentType(content_type.to_string()));
        }

        let size_bytes = data.len();
        let path = self.image_path.clone();
        let guard = self.lock.clone().write_owned().await;
        run_locked(guard, move || write_atomically(&path, &data))
            .await
            .map_err(|error| ImgSlotError::WriteFailure(error.to_string()))?
            .map_err(|error| ImgSlotError::WriteFailure(error.to_string()))?;

        tracing::debug!("Committed {} bytes to {:?}", size_bytes, self.image_path);
        Ok(())
    }

    /// Read the current image, falling back to the placeholder.
    pub async fn get(&self) -> Result<ImageBlob> {
        let _guard = self.lock.read().await;

        if let Some(bytes) = read_if_exists(&self.image_path).await? {
            return Ok(ImageBlob::new(bytes, BlobSource::Stored));
        }

        if let Some(bytes) = read_if_exists(&self.placeholder_path).await? {
            return Ok(ImageBlob::new(bytes, BlobSource::Placeholder));
        }

        Err(ImgSlotError::NotFound)
    }

    pub async fn has_image(&self) -> bool {
        let _guard = self.lock.read().await;
        fs::try_exists(&self.image_path).await.unwrap_or(false)
    }

    /// Render and persist the placeholder unless one is already on disk.
    /// Returns whether a new file was written.
    pub async fn ensure_placeholder(&self) -> Result<bool> {
        let path = self.placeholder_path.clone();
        let guard = self.lock.clone().write_owned().await;
        run_locked(guard, move || synthesize_placeholder(&path))
            .await
            .map_err(|error| ImgSlotError::PlaceholderSynthesis(error.to_string()))?
    }
}

/// Run `work` on the blocking pool while holding `guard`, so the lock is
/// released only once the work is done, even if the awaiting future is
/// dropped.
async fn run_locked<T, F>(
    guard: OwnedRwLockWriteGuard<()>,
    work: F,
) -> std::result::Result<T, tokio::task::JoinError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        work()
    })
    .await
}

fn synthesize_placeholder(path: &Path) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => return Ok(false),
        Ok(_) => {}
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => return Err(ImgSlotError::PlaceholderSynthesis(error.to_string())),
    }

    let png = render_placeholder_png()?;
    write_atomically(path, &png)
        .map_err(|error| ImgSlotError::PlaceholderSynthesis(error.to_string()))?;

    Ok(true)
}

/// A temp file that is removed on drop unless it has been persisted.
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn beside(path: &Path) -> Self {
        Self {
            path: path.with_extension(format!("{}.tmp", ulid::Ulid::new())),
            persisted: false,
        }
    }

    fn persist(mut self, target: &Path) -> std::io::Result<()> {
        std::fs::rename(&self.path, target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }

        if let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to remove temp file {:?}: {}", self.path, error);
            }
        }
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = TempFile::beside(path);

    let mut file = std::fs::File::create(&tmp.path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    tmp.persist(path)
}

async fn read_if_exists(path: &Path) -> Result<Option<Bytes>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(Bytes::from(bytes))),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(ImgSlotError::ReadFailure(error.to_string())),
    }
}

fn detect_content_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .ok()
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Pick the MIME type to declare for an upload read from `path`: by
/// extension first, then by sniffing the bytes.
pub fn guess_content_type(path: &Path, bytes: &[u8]) -> &'static str {
    image::ImageFormat::from_path(path)
        .or_else(|_| image::guess_format(bytes))
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Whether a declared MIME type names an image, ignoring case and parameters.
pub fn is_image_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.strip_prefix("image/") {
        Some(subtype) => !subtype.is_empty() && !subtype.contains('/'),
        None => false,
    }
}

/// Compute SHA256 hash of data.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
