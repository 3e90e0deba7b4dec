//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义类型模型、标识模型和解析接口。
//!
//! ## 核心内容
//!
//! - [`Type`] / [`RawType`] - 泛型类型签名与赋值兼容性
//! - [`Name`] / [`Instance`] / [`Target`] / [`Locator`] - 绑定标识
//! - [`Dependency`] - 解析请求与注入点链
//! - [`ScopeLifeCycle`] / [`Scope`] - 作用域生命周期与缓存
//! - [`Generator`] - 实例生成策略
//! - [`Resolver`] / [`ResolverExt`] - 解析接口
//! - [`Lift`] / [`Observer`] - 扩展钩子
//! - [`BindingDescriptor`] - 绑定描述

pub mod binding;
pub mod dependency;
pub mod generator;
pub mod hooks;
pub mod instance;
pub mod name;
pub mod resolver;
pub mod scope;
pub mod target;
pub mod types;

pub use binding::*;
pub use dependency::*;
pub use generator::*;
pub use hooks::*;
pub use instance::*;
pub use name::*;
pub use resolver::*;
pub use scope::*;
pub use target::*;
pub use types::*;
