//! Watch 会话编排
//!
//! 会话状态机：
//! `Idle → Cleaning → Setup → Watching ⇄ Deploying → … → Teardown → Idle`
//!
//! 文件变更从 watcher 异步到达，经过去抖后串行进入执行器：
//! 同一时刻最多一条流水线在跑，执行期间到达的触发最多保留一个
//! （单槽 pending），多余的直接丢弃。部署失败只记录日志，
//! 会话回到 Watching 继续存活。

use notify::{RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::bundler::{BundlerConfig, ProxyConfig};
use crate::config::settings::Settings;
use crate::deploy::{DockerBackend, LocalBackend};
use crate::domain::change::ChangeEvent;
use crate::domain::task::DeploymentStrategy;
use crate::error::WatchError;
use crate::pipeline::{resolve_change, setup_pipeline, teardown_pipeline, PipelineExecutor};
use crate::proxy::{self, LiveReloadHub, ProxyState};
use crate::state::{SessionPhase, SessionStore};
use crate::tasks::{SessionTaskRunner, TaskRunner};

/// 变更去抖窗口，同一窗口内的一串事件合并为最后一个
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// 一个 watch 会话
pub struct WatchSession {
    settings: Settings,
    project_root: PathBuf,
    store: Arc<SessionStore>,
    hub: Arc<LiveReloadHub>,
    executor: PipelineExecutor,
    cancel: CancellationToken,
}

impl WatchSession {
    /// 创建会话，任务执行者按设置装配
    pub fn new(settings: Settings, project_root: PathBuf, cancel: CancellationToken) -> Self {
        let bundle_dir = settings.exploded_bundle_dir(&project_root);
        let local = LocalBackend::new(bundle_dir);

        let docker = match settings.deployment_strategy {
            DeploymentStrategy::DockerContainer => settings
                .docker_container_name
                .as_deref()
                .map(|container| DockerBackend::new(container, &settings.plugin_name)),
            _ => None,
        };

        let runner = Arc::new(SessionTaskRunner::new(
            settings.build_tool.clone(),
            project_root.clone(),
            settings.path_build.clone(),
            local,
            docker,
        ));

        Self::with_runner(settings, project_root, runner, cancel)
    }

    /// 使用自定义任务执行者创建会话
    pub fn with_runner(
        settings: Settings,
        project_root: PathBuf,
        runner: Arc<dyn TaskRunner>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            project_root,
            store: Arc::new(SessionStore::new()),
            hub: Arc::new(LiveReloadHub::new()),
            executor: PipelineExecutor::new(runner),
            cancel,
        }
    }

    /// 会话状态（只读共享）
    pub fn store(&self) -> Arc<SessionStore> {
        self.store.clone()
    }

    /// live-reload 中心
    pub fn hub(&self) -> Arc<LiveReloadHub> {
        self.hub.clone()
    }

    /// 运行整个会话，直到取消令牌触发 teardown
    pub async fn run(&self) -> Result<(), WatchError> {
        self.setup().await?;

        // 端口和代理服务器，失败对启动是致命的
        let port = proxy::port::global().allocate()?;
        let bundler = BundlerConfig::load(&self.project_root.join(&self.settings.bundler_config))?;
        let config = ProxyConfig::build(
            bundler,
            self.settings.sass_options.as_ref(),
            self.settings.post_css_options.as_ref(),
            &self.settings.url,
            port,
        );
        let proxy_state = Arc::new(ProxyState::new(
            config,
            self.hub.clone(),
            self.store.clone(),
        ));
        proxy::serve(proxy_state, self.cancel.child_token()).await?;

        // 进入 Watching
        self.store.set_watching(true).await;
        self.store.set_phase(SessionPhase::Watching).await;

        let src_root = self.project_root.join(&self.settings.path_src);
        let (trigger_tx, trigger_rx) = mpsc::channel::<ChangeEvent>(1);
        // watcher 随会话存活，drop 即停止观察
        let _watcher = spawn_watcher(src_root, trigger_tx)?;

        tracing::info!(
            url = %self.settings.url,
            port,
            strategy = %self.settings.deployment_strategy.as_str(),
            "Watch session started"
        );

        self.event_loop(trigger_rx).await;

        let result = self.teardown().await;
        proxy::port::global().release(port);
        result
    }

    /// setup 流水线，任何失败终止会话启动
    async fn setup(&self) -> Result<(), WatchError> {
        self.store.set_phase(SessionPhase::Cleaning).await;
        let pipeline = setup_pipeline(self.settings.deployment_strategy);
        let run = self.executor.execute(&pipeline).await;
        if let Err(err) = run.result {
            return Err(WatchError::Setup(err));
        }

        self.store.set_phase(SessionPhase::Setup).await;
        self.store
            .set_bundle_dir(self.settings.exploded_bundle_dir(&self.project_root))
            .await;
        Ok(())
    }

    /// 串行消费触发，直到会话取消
    async fn event_loop(&self, mut trigger_rx: mpsc::Receiver<ChangeEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                maybe = trigger_rx.recv() => {
                    match maybe {
                        Some(event) => self.handle_change(event).await,
                        None => break,
                    }
                }
            }
        }
    }

    /// 处理一次变更：解析流水线、执行、回到 Watching
    pub async fn handle_change(&self, event: ChangeEvent) {
        let Some(pipeline) = resolve_change(&event) else {
            // 样式源文件由独立的编译 watch 处理
            tracing::debug!(path = %event.path.display(), "Style source change suppressed");
            return;
        };

        self.store.set_changed_file(event.path.clone()).await;
        self.store.set_phase(SessionPhase::Deploying).await;

        tracing::info!(
            path = %event.path.display(),
            tasks = pipeline.len(),
            "Change detected, deploying"
        );

        let run = self.executor.execute(&pipeline).await;
        match run.result {
            Ok(()) => {
                self.hub.notify(Some(event.path.display().to_string()));
            }
            Err(err) => {
                // 部署失败不终止会话
                tracing::error!(error = %err, "Deploy pipeline failed, session continues");
            }
        }

        self.store.clear_changed_file().await;
        self.store.set_phase(SessionPhase::Watching).await;
    }

    /// teardown 流水线，结束后回到 Idle
    pub async fn teardown(&self) -> Result<(), WatchError> {
        self.store.set_phase(SessionPhase::Teardown).await;
        let pipeline = teardown_pipeline(self.settings.deployment_strategy);
        let run = self.executor.execute(&pipeline).await;

        self.store.set_watching(false).await;
        self.store.clear_changed_file().await;
        self.store.set_phase(SessionPhase::Idle).await;

        match run.result {
            Ok(()) => {
                tracing::info!("Watch session torn down");
                Ok(())
            }
            Err(err) => Err(WatchError::Teardown(err)),
        }
    }
}

/// 启动文件 watcher 并桥接到触发通道
///
/// 原始事件先在去抖窗口内合并，然后以 `try_send` 投递：
/// 流水线在跑时最多保留一个 pending 触发，更多的触发被丢弃
fn spawn_watcher(
    src_root: PathBuf,
    trigger_tx: mpsc::Sender<ChangeEvent>,
) -> Result<notify::RecommendedWatcher, WatchError> {
    let (raw_tx, raw_rx) = mpsc::channel::<PathBuf>(256);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                if event.kind.is_access() {
                    return;
                }
                for path in event.paths {
                    // 通道满说明下游积压严重，丢弃是安全的
                    let _ = raw_tx.try_send(path);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Watcher error"),
        }
    })
    .map_err(|e| WatchError::Watcher(e.to_string()))?;

    watcher
        .watch(&src_root, RecursiveMode::Recursive)
        .map_err(|e| WatchError::Watcher(e.to_string()))?;

    tracing::info!(src = %src_root.display(), "Watching source tree");

    tokio::spawn(debounce_loop(src_root, raw_rx, trigger_tx));

    Ok(watcher)
}

/// 合并一个去抖窗口内的原始事件，投递最后一个
async fn debounce_loop(
    src_root: PathBuf,
    mut raw_rx: mpsc::Receiver<PathBuf>,
    trigger_tx: mpsc::Sender<ChangeEvent>,
) {
    while let Some(first) = raw_rx.recv().await {
        let mut latest = first;
        loop {
            match tokio::time::timeout(DEBOUNCE_WINDOW, raw_rx.recv()).await {
                Ok(Some(path)) => latest = path,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        if let Some(event) = ChangeEvent::relative_to(&src_root, &latest) {
            if trigger_tx.try_send(event).is_err() {
                tracing::debug!("Trigger dropped, a run is in flight with one pending");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::Task;
    use crate::error::{ExecutionError, TaskError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingRunner {
        fail_on: Option<Task>,
        invoked: Mutex<Vec<Task>>,
    }

    impl RecordingRunner {
        fn new(fail_on: Option<Task>) -> Self {
            Self {
                fail_on,
                invoked: Mutex::new(Vec::new()),
            }
        }

        fn invocations(&self) -> Vec<Task> {
            self.invoked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskRunner for RecordingRunner {
        async fn run(&self, task: Task) -> Result<(), TaskError> {
            self.invoked.lock().unwrap().push(task);
            if self.fail_on == Some(task) {
                Err(TaskError::new(
                    task,
                    ExecutionError {
                        command: task.name().to_string(),
                        status: Some(1),
                        stderr: "scripted failure".to_string(),
                    },
                ))
            } else {
                Ok(())
            }
        }
    }

    fn local_settings() -> Settings {
        serde_json::from_str(
            r#"{ "deploymentStrategy": "localAppServer", "pluginName": "my-theme" }"#,
        )
        .unwrap()
    }

    fn session(runner: Arc<RecordingRunner>) -> WatchSession {
        WatchSession::with_runner(
            local_settings(),
            PathBuf::from("/tmp/theme-watch-test"),
            runner,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_change_runs_pipeline_and_clears_changed_file() {
        let runner = Arc::new(RecordingRunner::new(None));
        let session = session(runner.clone());

        session.handle_change(ChangeEvent::new("js/app.js")).await;

        assert_eq!(runner.invocations(), vec![Task::Reinstall, Task::DeployFile]);
        assert!(session.store().changed_file().await.is_none());
        assert_eq!(session.store().phase().await, SessionPhase::Watching);
    }

    #[tokio::test]
    async fn test_style_source_change_triggers_nothing() {
        let runner = Arc::new(RecordingRunner::new(None));
        let session = session(runner.clone());

        session.handle_change(ChangeEvent::new("css/main.scss")).await;

        assert!(runner.invocations().is_empty());
        assert!(session.store().changed_file().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_deploy_returns_to_watching() {
        let runner = Arc::new(RecordingRunner::new(Some(Task::Reinstall)));
        let session = session(runner.clone());

        session.handle_change(ChangeEvent::new("js/app.js")).await;

        // DeployFile is never invoked after the failure
        assert_eq!(runner.invocations(), vec![Task::Reinstall]);
        assert_eq!(session.store().phase().await, SessionPhase::Watching);
        assert!(session.store().changed_file().await.is_none());
    }

    #[tokio::test]
    async fn test_successful_deploy_publishes_live_reload() {
        let runner = Arc::new(RecordingRunner::new(None));
        let session = session(runner);
        let mut rx = session.hub().subscribe();

        session.handle_change(ChangeEvent::new("js/app.js")).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.changed.as_deref(), Some("js/app.js"));
    }

    #[tokio::test]
    async fn test_setup_failure_is_fatal() {
        let runner = Arc::new(RecordingRunner::new(Some(Task::CleanLocalBundle)));
        let session = session(runner);

        let err = session.setup().await.unwrap_err();
        assert!(matches!(err, WatchError::Setup(_)));
    }

    #[tokio::test]
    async fn test_teardown_local_runs_only_local_clean_then_idle() {
        let runner = Arc::new(RecordingRunner::new(None));
        let session = session(runner.clone());

        session.teardown().await.unwrap();

        assert_eq!(runner.invocations(), vec![Task::CleanLocalBundle]);
        assert_eq!(session.store().phase().await, SessionPhase::Idle);
        assert!(!session.store().is_watching().await);
    }

    #[tokio::test]
    async fn test_teardown_docker_cleans_remote_too() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "deploymentStrategy": "dockerContainer",
                "dockerContainerName": "c1",
                "pluginName": "my-theme"
            }"#,
        )
        .unwrap();
        let runner = Arc::new(RecordingRunner::new(None));
        let session = WatchSession::with_runner(
            settings,
            PathBuf::from("/tmp/theme-watch-test"),
            runner.clone(),
            CancellationToken::new(),
        );

        session.teardown().await.unwrap();

        assert_eq!(
            runner.invocations(),
            vec![Task::CleanLocalBundle, Task::CleanRemoteBundle]
        );
    }
}
