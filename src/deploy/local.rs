//! Local app server backend
//!
//! Artifacts are materialized in place by the build tasks, so copy is a
//! no-op; clean removes the local exploded bundle directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::ExecutionError;

use super::DeployBackend;

/// 本地应用服务器后端
pub struct LocalBackend {
    /// 本地 exploded bundle 目录
    bundle_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(bundle_dir: PathBuf) -> Self {
        Self { bundle_dir }
    }

    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }
}

#[async_trait]
impl DeployBackend for LocalBackend {
    async fn clean(&self) -> Result<(), ExecutionError> {
        match tokio::fs::remove_dir_all(&self.bundle_dir).await {
            Ok(()) => {
                tracing::info!(dir = %self.bundle_dir.display(), "Removed local bundle dir");
                Ok(())
            }
            // A bundle dir that was never materialized is already clean
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExecutionError::io(
                format!("remove {}", self.bundle_dir.display()),
                e,
            )),
        }
    }

    async fn copy(&self, _source_dir: &Path) -> Result<(), ExecutionError> {
        // Build tasks already write into the bundle dir directly
        Ok(())
    }
}
