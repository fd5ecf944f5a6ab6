//! Docker container backend
//!
//! Shells out to the docker CLI: clean runs a recursive remove inside the
//! container, copy streams the local bundle tree into the container.

use async_trait::async_trait;
use std::path::Path;

use crate::config::settings::EXPLODED_BUILD_DIR_NAME;
use crate::error::ExecutionError;
use crate::infra::command::{CommandRunner, DEFAULT_COMMAND_TIMEOUT};

use super::DeployBackend;

/// 远程容器后端
pub struct DockerBackend {
    /// 容器名
    container: String,
    /// 容器内的 bundle 目录
    remote_base_path: String,
}

impl DockerBackend {
    /// 从容器名和插件名构造
    ///
    /// 远程路径固定为 /tmp/<plugin>/<bundle-dir-name>
    pub fn new(container: impl Into<String>, plugin_name: &str) -> Self {
        Self {
            container: container.into(),
            remote_base_path: format!("/tmp/{}/{}", plugin_name, EXPLODED_BUILD_DIR_NAME),
        }
    }

    /// 容器内的 bundle 路径
    pub fn remote_base_path(&self) -> &str {
        &self.remote_base_path
    }

    async fn exec(&self, command: &str) -> Result<(), ExecutionError> {
        CommandRunner::run_checked(
            "docker",
            &["exec", self.container.as_str(), "sh", "-c", command],
            Path::new("."),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DeployBackend for DockerBackend {
    async fn clean(&self) -> Result<(), ExecutionError> {
        tracing::info!(
            container = %self.container,
            path = %self.remote_base_path,
            "Cleaning remote bundle dir"
        );
        self.exec(&format!("rm -rf {}", self.remote_base_path)).await
    }

    async fn copy(&self, source_dir: &Path) -> Result<(), ExecutionError> {
        tracing::info!(
            container = %self.container,
            source = %source_dir.display(),
            dest = %self.remote_base_path,
            "Copying bundle into container"
        );

        self.exec(&format!("mkdir -p {}", self.remote_base_path)).await?;

        // Trailing /. copies directory contents rather than the directory itself
        let source = format!("{}/.", source_dir.display());
        let dest = format!("{}:{}", self.container, self.remote_base_path);
        CommandRunner::run_checked(
            "docker",
            &["cp", source.as_str(), dest.as_str()],
            Path::new("."),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_path_layout() {
        let backend = DockerBackend::new("c1", "my-theme");
        assert_eq!(backend.remote_base_path(), "/tmp/my-theme/.web_bundle_build");
    }

    #[tokio::test]
    async fn test_clean_surfaces_execution_error() {
        // docker is either absent or has no such container; both must
        // surface as ExecutionError, never panic
        let backend = DockerBackend::new("theme-watch-test-no-such-container", "my-theme");
        let err = backend.clean().await.unwrap_err();
        assert!(!err.command.is_empty());
    }
}
