use crate::domain::ports::Workspace;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Default)]
pub struct LocalWorkspace;

impl LocalWorkspace {
    pub fn new() -> Self {
        Self
    }
}

impl Workspace for LocalWorkspace {
    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(path).await?;

        while let Some(entry) = entries.next_entry().await? {
            // 跟隨符號連結，與 shell 的 */ 展開一致
            if fs::metadata(entry.path()).await.map(|m| m.is_dir()).unwrap_or(false) {
                dirs.push(entry.path());
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    async fn has_entries(&self, path: &Path) -> Result<bool> {
        match fs::read_dir(path).await {
            Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }
}
