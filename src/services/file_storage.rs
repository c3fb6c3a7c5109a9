//! Stores uploaded images on disk under random names.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// A file written by [`FileStorage::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

/// Lower-cased extension of `original_filename` if it is an allowed image type.
pub fn allowed_extension(original_filename: &str) -> Option<String> {
    let extension = Path::new(original_filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_IMAGE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Drops any directory components a client put into the file name.
pub fn sanitize_filename(original_filename: &str) -> String {
    let name = original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Writes `bytes` under a fresh UUID name keeping `extension`.
    pub async fn save(&self, extension: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        self.ensure_root().await?;
        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.root.join(&filename);
        fs::write(&path, bytes).await?;

        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        debug!(filename = %filename, size = bytes.len(), "Stored upload.");
        Ok(StoredFile {
            filename,
            path,
            size: bytes.len() as u64,
            mime_type,
        })
    }

    /// Removes a stored file by its generated name.
    pub async fn remove(&self, filename: &str) -> std::io::Result<()> {
        let name = sanitize_filename(filename);
        fs::remove_file(self.root.join(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("cat.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("photo.final.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("script.sh"), None);
        assert_eq!(allowed_extension("noextension"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\pic.png"), "pic.png");
        assert_eq!(sanitize_filename("dir/"), "upload");
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("uploads"));

        let stored = storage.save("png", b"\x89PNG fake").await.unwrap();
        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.size, 9);
        assert_eq!(stored.mime_type, "image/png");
        assert!(stored.path.exists());

        storage.remove(&stored.filename).await.unwrap();
        assert!(!stored.path.exists());
        assert!(storage.remove(&stored.filename).await.is_err());
    }
}
