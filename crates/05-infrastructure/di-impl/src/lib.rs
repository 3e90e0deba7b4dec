//! # 依赖注入具体实现
//!
//! 提供资源注册表、解析算法、构造前校验、作用域实现和解析上下文。
//!
//! ```
//! use di_abstractions::{BindingDescriptor, Instance, ResolverExt, Type};
//! use di_impl::Injector;
//!
//! let injector = Injector::builder()
//!     .bind(BindingDescriptor::constant(Instance::of(Type::of::<i32>()), 42))
//!     .bind(BindingDescriptor::constant(Instance::of(Type::of::<i32>()), 8).named("b"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(*injector.resolve::<i32>().unwrap(), 42);
//! assert_eq!(*injector.resolve_named::<i32>("b").unwrap(), 8);
//! assert_eq!(injector.resolve_all::<i32>().unwrap().len(), 2);
//! ```

pub mod injector;
pub mod registry;
mod resolution;
pub mod scopes;
mod verification;

pub use injector::*;
pub use registry::*;
pub use scopes::*;
