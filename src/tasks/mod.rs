//! 任务执行者
//!
//! 流水线里的步骤分两类：绑定到部署后端的会话任务
//! （clean-local-bundle / clean-remote-bundle / copy-to-remote /
//! materialize-local-bundle），以及委托给外部构建工具的不透明任务，
//! 后者以 `<buildTool> <task-name>` 方式执行。

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::deploy::{DeployBackend, DockerBackend, LocalBackend};
use crate::domain::task::Task;
use crate::error::{ExecutionError, TaskError};
use crate::infra::command::{CommandRunner, DEFAULT_COMMAND_TIMEOUT};

/// 任务执行者契约
///
/// 每个任务返回成功或失败，执行器不关心其内部行为
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: Task) -> Result<(), TaskError>;
}

/// 默认任务执行者
///
/// 会话任务走部署后端，其余任务外包给项目构建工具
pub struct SessionTaskRunner {
    /// 外部构建工具
    build_tool: String,
    /// 项目根目录（构建工具的工作目录）
    project_root: PathBuf,
    /// 构建输出目录
    path_build: PathBuf,
    /// 本地后端
    local: LocalBackend,
    /// 远程容器后端（dockerContainer 策略时存在）
    docker: Option<DockerBackend>,
}

impl SessionTaskRunner {
    pub fn new(
        build_tool: String,
        project_root: PathBuf,
        path_build: PathBuf,
        local: LocalBackend,
        docker: Option<DockerBackend>,
    ) -> Self {
        Self {
            build_tool,
            project_root,
            path_build,
            local,
            docker,
        }
    }

    fn docker(&self, task: Task) -> Result<&DockerBackend, TaskError> {
        self.docker.as_ref().ok_or_else(|| {
            TaskError::new(
                task,
                ExecutionError::io(
                    task.name(),
                    std::io::Error::other("no docker backend configured for this session"),
                ),
            )
        })
    }

    /// 将构建输出物化到本地 bundle 目录
    async fn materialize_local_bundle(&self) -> Result<(), ExecutionError> {
        let source = self.project_root.join(&self.path_build);
        let dest = self.local.bundle_dir().to_path_buf();

        tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            "Materializing local bundle"
        );

        tokio::task::spawn_blocking(move || copy_dir_recursive(&source, &dest))
            .await
            .map_err(|e| ExecutionError::io("materialize-local-bundle", std::io::Error::other(e)))?
            .map_err(|e| ExecutionError::io("materialize-local-bundle", e))
    }
}

#[async_trait]
impl TaskRunner for SessionTaskRunner {
    async fn run(&self, task: Task) -> Result<(), TaskError> {
        match task {
            Task::CleanLocalBundle => self
                .local
                .clean()
                .await
                .map_err(|e| TaskError::new(task, e)),
            Task::CleanRemoteBundle => {
                let docker = self.docker(task)?;
                docker.clean().await.map_err(|e| TaskError::new(task, e))
            }
            Task::CopyToRemote => {
                let docker = self.docker(task)?;
                docker
                    .copy(self.local.bundle_dir())
                    .await
                    .map_err(|e| TaskError::new(task, e))
            }
            Task::MaterializeLocalBundle => self
                .materialize_local_bundle()
                .await
                .map_err(|e| TaskError::new(task, e)),
            // Opaque build/deploy steps are owned by the external build tool
            _ => {
                CommandRunner::run_checked(
                    &self.build_tool,
                    &[task.name()],
                    &self.project_root,
                    DEFAULT_COMMAND_TIMEOUT,
                )
                .await
                .map(|_| ())
                .map_err(|e| TaskError::new(task, e))
            }
        }
    }
}

/// 递归复制目录树
fn copy_dir_recursive(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
