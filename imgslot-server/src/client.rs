use crate::server::{ErrorResponse, MessageResponse};
use imgslot_core::{ImgSlotError, Result, guess_content_type};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Upload `image_path` to `server` as the new current image.
pub async fn push_image(server: &str, api_key: &str, image_path: &Path) -> Result<String> {
    let data = tokio::fs::read(image_path).await?;
    let mime = guess_content_type(image_path, &data);
    let file_name = image_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());

    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str(mime)
        .map_err(|e| ImgSlotError::Http(e.to_string()))?;

    let response = reqwest::Client::new()
        .post(endpoint(server, "update_image"))
        .bearer_auth(api_key)
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .map_err(|e| ImgSlotError::Http(e.to_string()))?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body: MessageResponse = response
        .json()
        .await
        .map_err(|e| ImgSlotError::Http(e.to_string()))?;
    Ok(body.message)
}

/// Stream the current image from `server` into `out_path`, chunk by chunk.
/// The download lands in a `.part` sibling and is renamed into place only once
/// complete, so a failed transfer leaves `out_path` untouched.
/// Returns the number of bytes written.
pub async fn pull_image(server: &str, out_path: &Path) -> Result<u64> {
    let mut response = reqwest::get(endpoint(server, "get_image"))
        .await
        .map_err(|e| ImgSlotError::Http(e.to_string()))?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let partial = PartialDownload::beside(out_path);
    let mut file = tokio::fs::File::create(&partial.path).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        ImgSlotError::Http(format!(
            "transfer interrupted after {} bytes: {}",
            written, e
        ))
    })? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.sync_all().await?;
    drop(file);

    partial.persist(out_path).await?;
    Ok(written)
}

/// Download target that is deleted on drop unless renamed into place.
struct PartialDownload {
    path: PathBuf,
    persisted: bool,
}

impl PartialDownload {
    fn beside(out_path: &Path) -> Self {
        Self {
            path: out_path.with_extension(format!("{}.part", ulid::Ulid::new())),
            persisted: false,
        }
    }

    async fn persist(mut self, out_path: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, out_path).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn endpoint(server: &str, route: &str) -> String {
    format!("{}/{}", server.trim_end_matches('/'), route)
}

async fn error_from_response(response: reqwest::Response) -> ImgSlotError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    ImgSlotError::Http(format!("HTTP {}: {}", status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::{TEST_API_KEY, spawn_server};
    use imgslot_core::render_placeholder_png;

    #[tokio::test]
    async fn test_push_then_pull() {
        let dir = tempfile::tempdir().unwrap();
        let (base, _state) = spawn_server(&dir.path().join("server"), true).await;

        let source = dir.path().join("test.png");
        let upload: Vec<u8> = [&b"\x89PNG\r\n\x1a\n"[..], &[3u8; 100 * 1024][..]].concat();
        std::fs::write(&source, &upload).unwrap();

        let message = push_image(&format!("{}/", base), TEST_API_KEY, &source)
            .await
            .unwrap();
        assert_eq!(message, "image uploaded");

        let out = dir.path().join("downloaded.png");
        let written = pull_image(&base, &out).await.unwrap();
        assert_eq!(written, upload.len() as u64);
        assert_eq!(std::fs::read(&out).unwrap(), upload);
    }

    #[tokio::test]
    async fn test_pull_placeholder_before_any_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (base, _state) = spawn_server(&dir.path().join("server"), true).await;

        let out = dir.path().join("downloaded.png");
        pull_image(&base, &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), render_placeholder_png().unwrap());
    }

    #[tokio::test]
    async fn test_interrupted_pull_leaves_no_file_behind() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: image/png\r\ncontent-length: 4096\r\n\r\n0123456789",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("downloaded.png");
        std::fs::write(&out, b"previous download").unwrap();

        let error = pull_image(&format!("http://{}", addr), &out)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("interrupted"));

        assert_eq!(std::fs::read(&out).unwrap(), b"previous download");
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_push_errors_surface_status_and_message() {
        let dir = tempfile::tempdir().unwrap();
        let (base, _state) = spawn_server(&dir.path().join("server"), false).await;

        let source = dir.path().join("test.png");
        std::fs::write(&source, b"pixels").unwrap();
        let error = push_image(&base, "nope", &source).await.unwrap_err();
        assert!(error.to_string().contains("HTTP 401"));

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"hello").unwrap();
        let error = push_image(&base, TEST_API_KEY, &notes).await.unwrap_err();
        assert!(error.to_string().contains("HTTP 400"));

        let error = pull_image(&base, &dir.path().join("out.png"))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("HTTP 404"));
    }
}
