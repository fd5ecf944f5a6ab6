//! 统一错误处理
//!
//! 区分两类失败：流水线步骤失败（会话存活，回到 Watching）
//! 和启动期失败（致命，终止会话启动）

use thiserror::Error;

use crate::domain::task::Task;

/// 外部进程以非零状态退出
///
/// 携带捕获的错误输出和退出状态，由执行器统一视为任务失败
#[derive(Debug, Clone)]
pub struct ExecutionError {
    /// 执行的命令（用于日志）
    pub command: String,
    /// 退出状态码（进程被信号终止或未能启动时为 None）
    pub status: Option<i32>,
    /// 捕获的错误输出
    pub stderr: String,
}

impl ExecutionError {
    /// 从命令输出构造
    pub fn from_output(command: impl Into<String>, output: &std::process::Output) -> Self {
        Self {
            command: command.into(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// 从 IO 错误构造（进程未能启动、文件系统操作失败等）
    pub fn io(command: impl Into<String>, error: std::io::Error) -> Self {
        Self {
            command: command.into(),
            status: None,
            stderr: error.to_string(),
        }
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "`{}` exited with status {}: {}", self.command, code, self.stderr),
            None => write!(f, "`{}` failed: {}", self.command, self.stderr),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// 流水线步骤失败
///
/// 执行器在首个失败处短路，剩余步骤全部跳过
#[derive(Debug, Clone)]
pub struct TaskError {
    /// 失败的任务
    pub task: Task,
    /// 底层执行错误
    pub error: ExecutionError,
}

impl TaskError {
    pub fn new(task: Task, error: ExecutionError) -> Self {
        Self { task, error }
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task `{}` failed: {}", self.task, self.error)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// 会话启动期的致命错误
///
/// 只有这些错误会终止进程；变更触发的流水线失败只记录日志
#[derive(Debug, Error)]
pub enum WatchError {
    /// 项目配置缺失或无效
    #[error("invalid project settings: {0}")]
    Settings(String),

    /// 打包器配置缺失或结构无效
    #[error("failed to load bundler configuration: {0}")]
    ConfigLoad(String),

    /// 候选端口区间内没有可用端口
    #[error("no free port found probing {span} ports from {base}")]
    PortAllocation { base: u16, span: u16 },

    /// setup 流水线失败
    #[error("setup pipeline failed: {0}")]
    Setup(TaskError),

    /// teardown 流水线失败
    #[error("teardown pipeline failed: {0}")]
    Teardown(TaskError),

    /// 开发代理服务器绑定失败
    #[error("failed to bind dev proxy server: {0}")]
    Bind(#[from] std::io::Error),

    /// 文件 watcher 初始化失败
    #[error("failed to start file watcher: {0}")]
    Watcher(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display_with_status() {
        let err = ExecutionError {
            command: "docker exec c1 rm -rf /tmp/x".to_string(),
            status: Some(1),
            stderr: "no such container".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status 1"));
        assert!(msg.contains("no such container"));
    }

    #[test]
    fn test_task_error_names_failed_task() {
        let err = TaskError::new(
            Task::Reinstall,
            ExecutionError::io("gulp reinstall", std::io::Error::other("spawn failed")),
        );
        assert!(err.to_string().contains("reinstall"));
    }
}
