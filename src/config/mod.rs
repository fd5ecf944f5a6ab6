//! 配置模块

pub mod bundler;
pub mod settings;

pub use bundler::{BundlerConfig, ProxyConfig};
pub use settings::Settings;
