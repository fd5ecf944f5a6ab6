//! theme-watch - 增量构建部署 watch 代理
//!
//! 观察主题源码树，按 (变更子目录, 部署策略) 解析出有序的
//! 构建/部署流水线并串行执行，同时提供一个带 live-reload 的
//! 开发代理服务器，把未匹配的请求转发给真实应用服务器。

pub mod config;
pub mod deploy;
pub mod domain;
pub mod error;
pub mod infra;
pub mod pipeline;
pub mod proxy;
pub mod state;
pub mod tasks;
pub mod watch;

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::config::settings::SETTINGS_FILE_NAME;
use crate::config::Settings;
use crate::error::WatchError;
use crate::watch::WatchSession;

/// 命令行运行时选项
#[derive(Debug, Default)]
pub struct RuntimeOptions {
    /// 覆盖设置文件中的应用服务器 URL
    pub url_override: Option<String>,
    /// 设置文件路径（默认项目根下的 theme-watch.json）
    pub settings_path: Option<PathBuf>,
}

/// 加载设置并运行一个完整的 watch 会话
///
/// Ctrl-C 触发 teardown；只有启动期错误会以 Err 返回
pub async fn init_and_run_session(options: RuntimeOptions) -> Result<(), WatchError> {
    let project_root = std::env::current_dir()
        .map_err(|e| WatchError::Settings(format!("cannot resolve project root: {}", e)))?;

    let settings_path = options
        .settings_path
        .unwrap_or_else(|| project_root.join(SETTINGS_FILE_NAME));
    let mut settings = Settings::load(&settings_path)?;

    if let Some(url) = options.url_override {
        settings.url = url;
    }

    tracing::info!(
        settings = %settings_path.display(),
        strategy = %settings.deployment_strategy.as_str(),
        url = %settings.url,
        "Loaded project settings"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, tearing down watch session");
            shutdown.cancel();
        }
    });

    WatchSession::new(settings, project_root, cancel).run().await
}
