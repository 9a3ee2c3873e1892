use crate::domain::model::Invocation;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 執行外部程式並回傳其退出碼
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, invocation: &Invocation) -> Result<i32>;
}

pub trait Workspace: Send + Sync {
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = bool> + Send;

    /// Immediate child directories, sorted by name.
    fn list_dirs(&self, path: &Path)
        -> impl std::future::Future<Output = Result<Vec<PathBuf>>> + Send;

    /// True when `path` is a directory holding at least one entry.
    fn has_entries(&self, path: &Path) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn ensure_dir(&self, path: &Path) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait RunnerSettings: Send + Sync {
    fn python(&self) -> &str;
    fn python3(&self) -> &str;
    fn scripts_dir(&self) -> &Path;
}
