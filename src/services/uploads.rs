use chrono::Local;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

// Distinguishes uploads stored within the same millisecond.
static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);
const MAX_NAME_ATTEMPTS: usize = 8;

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub original_name: String,
    /// Filesystem path, relative to the working directory when the upload root is.
    /// The same file is served at `/public/<category>/<name>`.
    pub path: PathBuf,
}

impl StoredFile {
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Writes uploads to `<root>/<category>/<timestamp>_<seq>_<field>.<ext>`. An existing
/// file is never overwritten.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UploadStore { root: root.into() }
    }

    pub async fn save(
        &self,
        category: &str,
        field: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> AppResult<StoredFile> {
        let dir = self.root.join(category);
        create_dir_all(&dir).await?;

        let ext = extension(original_name);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(unique_name(field, ext.as_deref()));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(bytes).await?;
            file.flush().await?;

            tracing::info!(path = %path.display(), size = bytes.len(), "upload stored");
            return Ok(StoredFile {
                original_name: original_name.to_string(),
                path,
            });
        }
        Err(AppError::Internal {
            message: "Failed to store upload".to_string(),
            detail: format!("no free file name in {}", dir.display()),
        })
    }

    /// Deletes `path` when it names an existing file under the upload root. Anything else
    /// is left alone. Failures are logged, never returned.
    pub async fn remove_if_inside(&self, path: &str) {
        let (root, target) = match (
            tokio::fs::canonicalize(&self.root).await,
            tokio::fs::canonicalize(path).await,
        ) {
            (Ok(root), Ok(target)) => (root, target),
            _ => return,
        };
        let is_file = tokio::fs::metadata(&target).await.map(|m| m.is_file()).unwrap_or(false);
        if !target.starts_with(&root) || !is_file {
            tracing::warn!(path, "refusing to delete file outside the upload directory");
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&target).await {
            tracing::warn!(path, error = %e, "failed to delete uploaded file");
        }
    }
}

fn unique_name(field: &str, ext: Option<&str>) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S%3f");
    let seq = UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
    match ext {
        Some(ext) => format!("{}_{}_{}.{}", stamp, seq, field, ext),
        None => format!("{}_{}_{}", stamp, seq, field),
    }
}

/// Lowercased extension of a client-supplied file name, if it has a sane one.
pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_remove_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let stored = store.save("carbon", "csvFile", "data.CSV", b"a,b\n").await.unwrap();
        assert!(stored.path.starts_with(dir.path().join("carbon")));
        assert!(stored.path.to_string_lossy().ends_with("_csvFile.csv"));
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), b"a,b\n");

        store.remove_if_inside(&stored.path_string()).await;
        assert!(!stored.path.exists());
    }

    #[tokio::test]
    async fn never_removes_outside_root() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let victim = other.path().join("keep.txt");
        tokio::fs::write(&victim, b"x").await.unwrap();

        let store = UploadStore::new(root.path());
        store.remove_if_inside(&victim.to_string_lossy()).await;
        let escaped = root.path().join("..").join(other.path().file_name().unwrap()).join("keep.txt");
        store.remove_if_inside(&escaped.to_string_lossy()).await;
        assert!(victim.exists());
    }

    #[tokio::test]
    async fn back_to_back_saves_keep_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        for _ in 0..50 {
            let a = store.save("carbon", "csvFile", "a.csv", b"company_id\nPT-A\n").await.unwrap();
            let b = store.save("carbon", "csvFile", "b.csv", b"company_id\nPT-B\n").await.unwrap();
            assert_ne!(a.path, b.path);
            assert_eq!(tokio::fs::read(&a.path).await.unwrap(), b"company_id\nPT-A\n");
            assert_eq!(tokio::fs::read(&b.path).await.unwrap(), b"company_id\nPT-B\n");
        }
    }

    #[tokio::test]
    async fn concurrent_saves_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let handles: Vec<_> = (0..20u8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.save("csr", "proposal", "p.pdf", &[i]).await.unwrap() })
            })
            .collect();
        let mut paths = Vec::new();
        for (i, h) in handles.into_iter().enumerate() {
            let stored = h.await.unwrap();
            assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), vec![i as u8]);
            paths.push(stored.path);
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 20);
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension("laporan.XLSX").as_deref(), Some("xlsx"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("evil.c$v"), None);
    }
}
