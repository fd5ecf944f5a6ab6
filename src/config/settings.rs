//! 项目设置加载
//!
//! 从项目根目录的 `theme-watch.json` 加载会话设置，
//! 支持少量环境变量覆盖

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::domain::task::DeploymentStrategy;
use crate::error::WatchError;

/// 本地 exploded bundle 目录名
pub const EXPLODED_BUILD_DIR_NAME: &str = ".web_bundle_build";

/// 默认设置文件名
pub const SETTINGS_FILE_NAME: &str = "theme-watch.json";

/// 样式预处理器选项
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SassOptions {
    /// 注入到样式 loader 的 include 路径
    #[serde(default)]
    pub include_paths: Vec<String>,
}

/// 样式后处理选项
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCssOptions {
    /// 是否启用后处理 loader
    #[serde(default)]
    pub enabled: bool,
    /// 后处理插件列表
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// 会话设置
///
/// 会话启动时加载一次，之后不可变
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 真实应用服务器 URL，未匹配的请求全部代理到这里
    #[serde(default = "default_url")]
    pub url: String,
    /// 本地应用服务器路径
    #[serde(default)]
    pub app_server_path: Option<PathBuf>,
    /// 部署策略
    #[serde(default)]
    pub deployment_strategy: DeploymentStrategy,
    /// Docker 容器名（dockerContainer 策略必填）
    #[serde(default)]
    pub docker_container_name: Option<String>,
    /// 插件名，决定远程 bundle 路径
    #[serde(default)]
    pub plugin_name: String,
    /// 样式预处理器选项
    #[serde(default)]
    pub sass_options: Option<SassOptions>,
    /// 样式后处理选项
    #[serde(default, rename = "postCSSOptions")]
    pub post_css_options: Option<PostCssOptions>,
    /// 源码目录（相对项目根）
    #[serde(default = "default_path_src")]
    pub path_src: PathBuf,
    /// 构建输出目录（相对项目根）
    #[serde(default = "default_path_build")]
    pub path_build: PathBuf,
    /// 外部构建工具，每个流水线任务以 `<buildTool> <task-name>` 方式执行
    #[serde(default = "default_build_tool")]
    pub build_tool: String,
    /// 打包器配置文件路径（相对项目根）
    #[serde(default = "default_bundler_config")]
    pub bundler_config: PathBuf,
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_path_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_path_build() -> PathBuf {
    PathBuf::from("build")
}

fn default_build_tool() -> String {
    "gulp".to_string()
}

fn default_bundler_config() -> PathBuf {
    PathBuf::from("webpack.config.json")
}

impl Settings {
    /// 从设置文件加载
    pub fn load(path: &Path) -> Result<Self, WatchError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WatchError::Settings(format!("{}: {}", path.display(), e)))?;
        let mut settings: Settings = serde_json::from_str(&raw)
            .map_err(|e| WatchError::Settings(format!("{}: {}", path.display(), e)))?;

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("THEME_WATCH_URL") {
            self.url = url;
        }
        if let Ok(tool) = env::var("THEME_WATCH_BUILD_TOOL") {
            self.build_tool = tool;
        }
    }

    /// 校验设置
    ///
    /// dockerContainer 策略要求非空的容器名和插件名
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.deployment_strategy == DeploymentStrategy::DockerContainer {
            if self
                .docker_container_name
                .as_deref()
                .map_or(true, str::is_empty)
            {
                return Err(WatchError::Settings(
                    "dockerContainer strategy requires dockerContainerName".to_string(),
                ));
            }
            if self.plugin_name.is_empty() {
                return Err(WatchError::Settings(
                    "dockerContainer strategy requires pluginName".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 本地 exploded bundle 目录
    pub fn exploded_bundle_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(EXPLODED_BUILD_DIR_NAME)
    }
}
