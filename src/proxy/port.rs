//! 端口分配
//!
//! 从固定基准端口向上探测空闲端口。已发出的端口记录在进程级
//! 集合里，保证并发分配不会拿到同一个端口（绑定探测之间存在
//! 窗口期，单靠探测不够）。

use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::{Mutex, OnceLock};

use crate::error::WatchError;

/// 探测起始端口
pub const BASE_PORT: u16 = 9080;

/// 候选端口数量，超出即启动失败
pub const PORT_SPAN: u16 = 64;

/// 端口分配器
pub struct PortAllocator {
    base: u16,
    span: u16,
    claimed: Mutex<HashSet<u16>>,
}

static GLOBAL_ALLOCATOR: OnceLock<PortAllocator> = OnceLock::new();

/// 进程级分配器
pub fn global() -> &'static PortAllocator {
    GLOBAL_ALLOCATOR.get_or_init(|| PortAllocator::new(BASE_PORT, PORT_SPAN))
}

impl PortAllocator {
    pub fn new(base: u16, span: u16) -> Self {
        Self {
            base,
            span,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// 分配一个空闲端口
    ///
    /// 区间耗尽返回致命的 `PortAllocation` 错误
    pub fn allocate(&self) -> Result<u16, WatchError> {
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for port in self.base..self.base + self.span {
            if claimed.contains(&port) {
                continue;
            }
            if TcpListener::bind(("127.0.0.1", port)).is_ok() {
                claimed.insert(port);
                tracing::info!(port, "Port allocated");
                return Ok(port);
            }
        }

        Err(WatchError::PortAllocation {
            base: self.base,
            span: self.span,
        })
    }

    /// 归还端口（会话 teardown 时调用）
    pub fn release(&self, port: u16) {
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.remove(&port);
    }
}
