//! 打包器配置
//!
//! 从项目的打包器配置文件构建开发代理配置。不在原对象上做
//! 运行时改写：`ProxyConfig::build` 接收样式/代理选项，
//! 返回一个新构造的不可变配置值。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::config::settings::{PostCssOptions, SassOptions};
use crate::error::WatchError;

/// 开发代理的固定落地路径
pub const LANDING_PATH: &str = "/webpack-dev-server/";

/// 样式处理链中预处理 loader 的名称
pub const SASS_LOADER: &str = "sass-loader";

/// 样式处理链中后处理 loader 的名称
pub const POSTCSS_LOADER: &str = "postcss-loader";

/// 样式 loader 描述
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StyleLoader {
    /// loader 名称
    pub loader: String,
    /// loader 选项
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// 打包器配置
///
/// 结构上只关心三部分：入口列表、样式 loader 链、开发服务器选项
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    /// 入口点（有序）
    #[serde(default)]
    pub entry: Vec<String>,
    /// 样式 loader 链（有序）
    #[serde(default)]
    pub style_loaders: Vec<StyleLoader>,
    /// 开发服务器选项
    #[serde(default)]
    pub dev_server: Map<String, Value>,
}

impl BundlerConfig {
    /// 从配置文件加载
    ///
    /// 文件缺失或结构无效都是致命的 `ConfigLoad` 错误
    pub fn load(path: &Path) -> Result<Self, WatchError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WatchError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| WatchError::ConfigLoad(format!("{}: {}", path.display(), e)))
    }
}

/// 开发代理配置
///
/// 服务器启动时构建一次，之后不可变
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// 真实应用服务器 URL
    pub target_url: String,
    /// 分配到的本地端口
    pub port: u16,
    /// 改写后的打包器配置
    pub bundler: BundlerConfig,
}

impl ProxyConfig {
    /// 从打包器配置和样式选项构建代理配置
    ///
    /// - sass include 路径注入到预处理 loader 的选项
    /// - 启用后处理时，在样式链末尾追加后处理 loader，从不替换已有项
    /// - 在入口列表末尾追加 live-reload 客户端
    pub fn build(
        bundler: BundlerConfig,
        sass_options: Option<&SassOptions>,
        post_css_options: Option<&PostCssOptions>,
        target_url: &str,
        port: u16,
    ) -> Self {
        let mut bundler = bundler;

        if let Some(sass) = sass_options {
            for loader in bundler
                .style_loaders
                .iter_mut()
                .filter(|l| l.loader == SASS_LOADER)
            {
                loader.options.insert(
                    "includePaths".to_string(),
                    Value::Array(
                        sass.include_paths
                            .iter()
                            .map(|p| Value::String(p.clone()))
                            .collect(),
                    ),
                );
            }
        }

        if let Some(postcss) = post_css_options {
            if postcss.enabled {
                let mut options = Map::new();
                options.insert("ident".to_string(), Value::String("postcss".to_string()));
                options.insert(
                    "plugins".to_string(),
                    Value::Array(
                        postcss
                            .plugins
                            .iter()
                            .map(|p| Value::String(p.clone()))
                            .collect(),
                    ),
                );
                bundler.style_loaders.push(StyleLoader {
                    loader: POSTCSS_LOADER.to_string(),
                    options,
                });
            }
        }

        bundler.entry.push(live_reload_entry(port));

        Self {
            target_url: target_url.to_string(),
            port,
            bundler,
        }
    }
}

/// live-reload 客户端入口，携带选定端口
fn live_reload_entry(port: u16) -> String {
    format!("live-reload-client?http://localhost:{}", port)
}
