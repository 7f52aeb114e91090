// src/core/fs_ops.rs
//! File system operations for uploaded screenshots

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;


pub struct FsOps;

impl FsOps {
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            app_log!(info, "Created directory: {}", path.display());
        }
        Ok(())
    }

    /// Store an uploaded image under a fresh name and return its path
    pub async fn store_upload(upload_dir: &Path, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        Self::ensure_dir_exists(upload_dir).await?;

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        let path = upload_dir.join(file_name);

        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;

        app_log!(debug, "Stored upload: {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
        fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    /// Remove files, logging rather than failing on the ones already gone
    pub async fn remove_files(paths: &[String]) {
        for path in paths {
            if let Err(e) = fs::remove_file(path).await {
                app_log!(warn, "Failed to remove {}: {}", path, e);
            }
        }
    }
}

/// File extension for a supported image media type
pub fn image_extension(media_type: &str) -> Option<&'static str> {
    match media_type.to_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Media type for an image file name
pub fn media_type_for(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".png") {
        Some("image/png")
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        Some("image/jpeg")
    } else if lower.ends_with(".webp") {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/PNG"), Some("png"));
        assert_eq!(image_extension("image/jpg"), Some("jpg"));
        assert_eq!(image_extension("application/pdf"), None);
        assert_eq!(image_extension("image/gif"), None);
    }

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("post.JPEG"), Some("image/jpeg"));
        assert_eq!(media_type_for("shot.webp"), Some("image/webp"));
        assert_eq!(media_type_for("notes.txt"), None);
        assert_eq!(media_type_for("reaction.gif"), None);
    }

    #[tokio::test]
    async fn test_store_and_read_upload() {
        let dir = std::env::temp_dir().join(format!("fs-ops-{}", uuid::Uuid::new_v4()));
        let path = FsOps::store_upload(&dir, b"png-bytes", "png").await.unwrap();
        assert!(path.starts_with(&dir));
        assert_eq!(FsOps::read_bytes(&path).await.unwrap(), b"png-bytes");

        FsOps::remove_files(&[path.display().to_string()]).await;
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
