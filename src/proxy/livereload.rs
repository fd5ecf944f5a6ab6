//! Live-reload 通道管理
//!
//! 部署成功后编排器发布一次 reload 事件，SSE 订阅者
//! （浏览器内的 live-reload 客户端）收到后刷新页面

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// 通道容量
const RELOAD_CHANNEL_CAPACITY: usize = 16;

/// 一次 reload 通知
#[derive(Clone, Debug, Serialize)]
pub struct ReloadEvent {
    /// 触发本次部署的变更文件
    pub changed: Option<String>,
    /// 发布时间
    pub at: DateTime<Utc>,
}

/// Live-reload 中心
pub struct LiveReloadHub {
    sender: broadcast::Sender<ReloadEvent>,
}

impl LiveReloadHub {
    /// 创建新的 hub
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(RELOAD_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// 发布 reload 事件
    ///
    /// 没有订阅者时静默丢弃
    pub fn notify(&self, changed: Option<String>) {
        let event = ReloadEvent {
            changed,
            at: Utc::now(),
        };
        let receivers = self.sender.receiver_count();
        if self.sender.send(event).is_ok() {
            tracing::info!(receivers, "Live reload published");
        }
    }

    /// 订阅 reload 事件
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_reload() {
        let hub = LiveReloadHub::new();
        let mut rx = hub.subscribe();

        hub.notify(Some("js/app.js".to_string()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.changed.as_deref(), Some("js/app.js"));
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_silent() {
        let hub = LiveReloadHub::new();
        hub.notify(None);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
