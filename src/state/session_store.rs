//! 会话状态存储
//!
//! 进程内唯一的会话级可变状态。单写者约束：只有编排器
//! （串行执行流水线的那条逻辑线程）调用写方法，其余组件只读。
//! 状态只反映最后一次完整完成的转换，不存在半提交的中间值。

use std::path::PathBuf;
use tokio::sync::RwLock;

/// watch 会话所处阶段
///
/// `Idle` 只能通过显式 teardown 到达，不会隐式回落
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Cleaning,
    Setup,
    Watching,
    Deploying,
    Teardown,
}

/// 会话状态存储
pub struct SessionStore {
    /// 当前阶段
    phase: RwLock<SessionPhase>,
    /// 本地 exploded bundle 目录（setup 完成后写入）
    bundle_dir: RwLock<Option<PathBuf>>,
    /// 最后一次变更的文件（部署完成后清除）
    changed_file: RwLock<Option<PathBuf>>,
    /// watch 标记
    watching: RwLock<bool>,
}

impl SessionStore {
    /// 创建新的会话状态
    pub fn new() -> Self {
        Self {
            phase: RwLock::new(SessionPhase::Idle),
            bundle_dir: RwLock::new(None),
            changed_file: RwLock::new(None),
            watching: RwLock::new(false),
        }
    }

    /// 当前阶段
    pub async fn phase(&self) -> SessionPhase {
        *self.phase.read().await
    }

    /// 切换阶段
    pub async fn set_phase(&self, phase: SessionPhase) {
        let mut current = self.phase.write().await;
        tracing::debug!(from = ?*current, to = ?phase, "Session phase transition");
        *current = phase;
    }

    /// 记录本地 bundle 目录
    pub async fn set_bundle_dir(&self, dir: PathBuf) {
        *self.bundle_dir.write().await = Some(dir);
    }

    /// 读取本地 bundle 目录
    pub async fn bundle_dir(&self) -> Option<PathBuf> {
        self.bundle_dir.read().await.clone()
    }

    /// 记录最后变更的文件
    pub async fn set_changed_file(&self, path: PathBuf) {
        *self.changed_file.write().await = Some(path);
    }

    /// 清除最后变更的文件
    pub async fn clear_changed_file(&self) {
        *self.changed_file.write().await = None;
    }

    /// 读取最后变更的文件
    pub async fn changed_file(&self) -> Option<PathBuf> {
        self.changed_file.read().await.clone()
    }

    /// 设置 watch 标记
    pub async fn set_watching(&self, watching: bool) {
        *self.watching.write().await = watching;
    }

    /// 读取 watch 标记
    pub async fn is_watching(&self) -> bool {
        *self.watching.read().await
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_state() {
        let store = SessionStore::new();
        assert_eq!(store.phase().await, SessionPhase::Idle);
        assert!(store.bundle_dir().await.is_none());
        assert!(store.changed_file().await.is_none());
        assert!(!store.is_watching().await);
    }

    #[tokio::test]
    async fn test_changed_file_roundtrip() {
        let store = SessionStore::new();
        store.set_changed_file(PathBuf::from("js/app.js")).await;
        assert_eq!(store.changed_file().await, Some(PathBuf::from("js/app.js")));

        store.clear_changed_file().await;
        assert!(store.changed_file().await.is_none());
    }

    #[tokio::test]
    async fn test_phase_transitions() {
        let store = SessionStore::new();
        store.set_phase(SessionPhase::Cleaning).await;
        store.set_phase(SessionPhase::Setup).await;
        store.set_phase(SessionPhase::Watching).await;
        assert_eq!(store.phase().await, SessionPhase::Watching);
    }
}
