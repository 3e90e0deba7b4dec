//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn DI 各层共享的错误类型、容器配置和日志初始化。
//!
//! ## 核心内容
//!
//! - [`DependencyError`] - 依赖注入错误分类
//! - [`ContainerConfig`] - 解析上下文配置
//! - [`LoggingConfig`] - 日志配置

pub mod configuration;
pub mod errors;
pub mod logging;

pub use configuration::*;
pub use errors::*;
pub use logging::*;
