//! 命令执行器
//!
//! 提供统一的命令执行接口，支持：
//! - 超时控制
//! - stdout/stderr 捕获
//! - 非零退出状态到 `ExecutionError` 的统一映射

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use crate::error::ExecutionError;

/// 单个外部命令的默认超时
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// 命令执行器
pub struct CommandRunner;

impl CommandRunner {
    /// 执行命令并捕获输出
    ///
    /// 命令未能启动或超时都映射为 `ExecutionError`
    pub async fn run(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<std::process::Output, ExecutionError> {
        let cmd_display = display_command(program, args);

        let child = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .kill_on_drop(true)
            .output();

        tokio::select! {
            result = child => {
                result.map_err(|e| ExecutionError::io(&cmd_display, e))
            }
            _ = tokio::time::sleep(timeout) => {
                tracing::error!(command = %cmd_display, "Command timed out after {:?}", timeout);
                Err(ExecutionError {
                    command: cmd_display,
                    status: None,
                    stderr: format!("timed out after {:?}", timeout),
                })
            }
        }
    }

    /// 执行命令并要求成功退出
    ///
    /// 非零退出状态映射为携带捕获错误输出的 `ExecutionError`
    pub async fn run_checked(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<std::process::Output, ExecutionError> {
        let output = Self::run(program, args, work_dir, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(ExecutionError::from_output(
                display_command(program, args),
                &output,
            ))
        }
    }
}

/// 拼出用于日志的完整命令行
fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
