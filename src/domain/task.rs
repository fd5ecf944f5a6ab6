//! 构建/部署任务领域模型
//!
//! 任务集合是封闭的：所有可调度的步骤都在 `Task` 枚举里，
//! 流水线由 (变更子目录, 部署策略) 静态决定，缺失的分支是编译期问题。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 部署策略
///
/// 会话启动时从配置加载，整个会话期间不变
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentStrategy {
    /// 未配置部署目标
    None,
    /// 本地应用服务器目录
    LocalAppServer,
    /// 远程 Docker 容器
    DockerContainer,
}

impl DeploymentStrategy {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStrategy::None => "none",
            DeploymentStrategy::LocalAppServer => "localAppServer",
            DeploymentStrategy::DockerContainer => "dockerContainer",
        }
    }
}

impl Default for DeploymentStrategy {
    fn default() -> Self {
        DeploymentStrategy::None
    }
}

/// 可调度的构建/部署步骤
///
/// 名称与外部构建工具的任务名一一对应（见 `Task::name`）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    // ---- 变更触发的构建步骤 ----
    Clean,
    BuildSrc,
    BuildWebInf,
    BuildBase,
    BuildThemeletSrc,
    BuildThemeletJsInject,
    BuildThemeletCssInject,
    RenameCssDir,
    CompileCss,
    MoveCompiledCss,
    RemoveOldCssDir,
    Reinstall,
    DeployFolder,
    DeployFile,
    DeployCssFiles,
    // ---- 会话 setup / teardown 步骤 ----
    Build,
    OsgiClean,
    CleanLocalBundle,
    CleanRemoteBundle,
    MaterializeLocalBundle,
    CopyToRemote,
}

impl Task {
    /// 任务标识符，同时也是外部构建工具的任务名
    pub fn name(&self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::BuildSrc => "build-src",
            Task::BuildWebInf => "build-web-inf",
            Task::BuildBase => "build-base",
            Task::BuildThemeletSrc => "build-themelet-src",
            Task::BuildThemeletJsInject => "build-themelet-js-inject",
            Task::BuildThemeletCssInject => "build-themelet-css-inject",
            Task::RenameCssDir => "rename-css-dir",
            Task::CompileCss => "compile-css",
            Task::MoveCompiledCss => "move-compiled-css",
            Task::RemoveOldCssDir => "remove-old-css-dir",
            Task::Reinstall => "reinstall",
            Task::DeployFolder => "deploy-folder",
            Task::DeployFile => "deploy-file",
            Task::DeployCssFiles => "deploy-css-files",
            Task::Build => "build",
            Task::OsgiClean => "osgi-clean",
            Task::CleanLocalBundle => "clean-local-bundle",
            Task::CleanRemoteBundle => "clean-remote-bundle",
            Task::MaterializeLocalBundle => "materialize-local-bundle",
            Task::CopyToRemote => "copy-to-remote",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次触发计算出的有序任务列表
pub type Pipeline = Vec<Task>;

/// 任务执行状态
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 单个任务的执行记录
#[derive(Clone, Debug, Serialize)]
pub struct TaskReport {
    /// 任务标识
    pub task: Task,
    /// 开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    /// 执行状态
    pub status: TaskStatus,
    /// 附加信息
    pub message: Option<String>,
}

impl TaskReport {
    /// 创建待执行记录
    pub fn new(task: Task) -> Self {
        Self {
            task,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: TaskStatus::Pending,
            message: None,
        }
    }

    /// 标记开始执行
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = TaskStatus::Running;
    }

    /// 标记执行结束
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            TaskStatus::Success
        } else {
            TaskStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 标记跳过
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = TaskStatus::Skipped;
        self.message = reason;
    }
}
