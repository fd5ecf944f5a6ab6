//! 文件变更事件
//!
//! 由 watcher 产生，流水线解析器消费一次后丢弃

use std::path::{Component, Path, PathBuf};

/// 样式源文件扩展名，此类变更由独立的样式编译 watch 处理，
/// 不触发部署流水线
pub const STYLE_SOURCE_EXT: &str = "scss";

/// 一次源码树变更
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// 相对源码根目录的路径
    pub path: PathBuf,
    /// 文件扩展名（无扩展名时为 None）
    pub extension: Option<String>,
}

impl ChangeEvent {
    /// 从相对源码根目录的路径构造变更事件
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string());
        Self { path, extension }
    }

    /// 从绝对路径构造，`src_root` 为源码根目录
    ///
    /// 路径不在源码树内时返回 None
    pub fn relative_to(src_root: &Path, absolute: &Path) -> Option<Self> {
        let rel = absolute.strip_prefix(src_root).ok()?;
        Some(Self::new(rel))
    }

    /// 变更路径的第一段（顶级子目录名）
    ///
    /// 变更发生在源码根目录下的文件时返回 None
    pub fn subtree(&self) -> Option<&str> {
        let mut components = self.path.components();
        let first = components.next()?;
        // 只有还有后续段时，第一段才是子目录
        components.next()?;
        match first {
            Component::Normal(name) => name.to_str(),
            _ => None,
        }
    }

    /// 是否为被排除的样式源文件
    pub fn is_style_source(&self) -> bool {
        self.extension.as_deref() == Some(STYLE_SOURCE_EXT)
    }
}
