//! 流水线解析
//!
//! 纯函数：由 (变更子目录, 部署策略) 映射到有序任务列表，
//! 无任何副作用。执行在 `executor` 模块。

pub mod executor;

use crate::domain::change::ChangeEvent;
use crate::domain::task::{DeploymentStrategy, Pipeline, Task};

pub use executor::{PipelineExecutor, PipelineRun};

/// 解析一次变更触发的流水线
///
/// 样式源文件的变更被显式抑制（由独立的样式编译 watch 处理），
/// 返回 None 表示不产生任何流水线
pub fn resolve_change(event: &ChangeEvent) -> Option<Pipeline> {
    if event.is_style_source() {
        return None;
    }
    Some(change_pipeline(event.subtree()))
}

/// 变更子目录到任务列表的静态映射
pub fn change_pipeline(subtree: Option<&str>) -> Pipeline {
    match subtree {
        Some("WEB-INF") => vec![
            Task::Clean,
            Task::BuildSrc,
            Task::BuildWebInf,
            Task::Reinstall,
            Task::DeployFolder,
        ],
        Some("templates") => vec![
            Task::BuildSrc,
            Task::BuildThemeletSrc,
            Task::BuildThemeletJsInject,
            Task::Reinstall,
            Task::DeployFolder,
        ],
        Some("css") => vec![
            Task::Clean,
            Task::BuildBase,
            Task::BuildSrc,
            Task::BuildThemeletSrc,
            Task::BuildThemeletCssInject,
            Task::RenameCssDir,
            Task::CompileCss,
            Task::MoveCompiledCss,
            Task::RemoveOldCssDir,
            Task::Reinstall,
            Task::DeployCssFiles,
        ],
        _ => vec![Task::Reinstall, Task::DeployFile],
    }
}

/// watch 会话启动前的 setup 流水线
pub fn setup_pipeline(strategy: DeploymentStrategy) -> Pipeline {
    match strategy {
        DeploymentStrategy::LocalAppServer => vec![
            Task::Build,
            Task::CleanLocalBundle,
            Task::OsgiClean,
            Task::MaterializeLocalBundle,
        ],
        DeploymentStrategy::DockerContainer => vec![
            Task::Build,
            Task::CleanLocalBundle,
            Task::CleanRemoteBundle,
            Task::OsgiClean,
            Task::MaterializeLocalBundle,
            Task::CopyToRemote,
        ],
        DeploymentStrategy::None => vec![],
    }
}

/// 会话结束时的 teardown 流水线
pub fn teardown_pipeline(strategy: DeploymentStrategy) -> Pipeline {
    let mut tasks = vec![Task::CleanLocalBundle];
    if strategy == DeploymentStrategy::DockerContainer {
        tasks.push(Task::CleanRemoteBundle);
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_inf_pipeline() {
        assert_eq!(
            change_pipeline(Some("WEB-INF")),
            vec![
                Task::Clean,
                Task::BuildSrc,
                Task::BuildWebInf,
                Task::Reinstall,
                Task::DeployFolder,
            ]
        );
    }

    #[test]
    fn test_templates_pipeline() {
        assert_eq!(
            change_pipeline(Some("templates")),
            vec![
                Task::BuildSrc,
                Task::BuildThemeletSrc,
                Task::BuildThemeletJsInject,
                Task::Reinstall,
                Task::DeployFolder,
            ]
        );
    }

    #[test]
    fn test_css_pipeline() {
        assert_eq!(
            change_pipeline(Some("css")),
            vec![
                Task::Clean,
                Task::BuildBase,
                Task::BuildSrc,
                Task::BuildThemeletSrc,
                Task::BuildThemeletCssInject,
                Task::RenameCssDir,
                Task::CompileCss,
                Task::MoveCompiledCss,
                Task::RemoveOldCssDir,
                Task::Reinstall,
                Task::DeployCssFiles,
            ]
        );
    }

    #[test]
    fn test_other_subtrees_fall_back_to_single_file_deploy() {
        for subtree in [Some("js"), Some("images"), Some("fonts"), None] {
            assert_eq!(
                change_pipeline(subtree),
                vec![Task::Reinstall, Task::DeployFile],
            );
        }
    }

    #[test]
    fn test_style_source_change_is_suppressed() {
        // 任何子目录下的样式源文件都不产生流水线
        for path in ["css/main.scss", "templates/x.scss", "js/a.scss"] {
            assert!(resolve_change(&ChangeEvent::new(path)).is_none());
        }
    }

    #[test]
    fn test_non_style_change_resolves() {
        let pipeline = resolve_change(&ChangeEvent::new("js/app.js")).unwrap();
        assert_eq!(pipeline, vec![Task::Reinstall, Task::DeployFile]);
    }

    #[test]
    fn test_setup_local_app_server() {
        assert_eq!(
            setup_pipeline(DeploymentStrategy::LocalAppServer),
            vec![
                Task::Build,
                Task::CleanLocalBundle,
                Task::OsgiClean,
                Task::MaterializeLocalBundle,
            ]
        );
    }

    #[test]
    fn test_setup_docker_inserts_remote_clean_and_appends_copy() {
        let pipeline = setup_pipeline(DeploymentStrategy::DockerContainer);
        assert_eq!(
            pipeline,
            vec![
                Task::Build,
                Task::CleanLocalBundle,
                Task::CleanRemoteBundle,
                Task::OsgiClean,
                Task::MaterializeLocalBundle,
                Task::CopyToRemote,
            ]
        );
    }

    #[test]
    fn test_setup_none_is_empty() {
        assert!(setup_pipeline(DeploymentStrategy::None).is_empty());
    }

    #[test]
    fn test_teardown_always_cleans_local_first() {
        assert_eq!(
            teardown_pipeline(DeploymentStrategy::LocalAppServer),
            vec![Task::CleanLocalBundle]
        );
        assert_eq!(
            teardown_pipeline(DeploymentStrategy::None),
            vec![Task::CleanLocalBundle]
        );
        assert_eq!(
            teardown_pipeline(DeploymentStrategy::DockerContainer),
            vec![Task::CleanLocalBundle, Task::CleanRemoteBundle]
        );
    }
}
