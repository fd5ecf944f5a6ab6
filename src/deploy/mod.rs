//! 部署后端
//!
//! 对 {本地文件系统, 远程容器} 的统一 clean/copy 能力

pub mod docker;
pub mod local;

use async_trait::async_trait;
use std::path::Path;

use crate::error::ExecutionError;

pub use docker::DockerBackend;
pub use local::LocalBackend;

/// 部署目标的能力契约
///
/// 任何操作失败都以 `ExecutionError` 上浮，由执行器视为任务失败
#[async_trait]
pub trait DeployBackend: Send + Sync {
    /// 清除目标上的 exploded bundle 目录
    async fn clean(&self) -> Result<(), ExecutionError>;

    /// 将本地目录树同步到目标
    async fn copy(&self, source_dir: &Path) -> Result<(), ExecutionError>;
}
