//! 集成测试共用的日志初始化和类型夹具

use di_abstractions::{downcast, AnyInstance, Dependency, RawType, Resolver, Type};
use infrastructure_common::DependencyResult;
use std::any::Any;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
///
/// 日志级别由 `RUST_LOG` 控制，默认只输出警告。
pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok(); // 忽略初始化失败的错误
    });
}

/// 测试用的类型层次：`Integer` 与 `Long` 都继承 `Number`
pub mod types {
    use super::*;

    pub fn number() -> Type {
        Type::from_raw(RawType::named("lang::Number"))
    }

    pub fn integer() -> Type {
        Type::from_raw(RawType::named("lang::Integer").extends([number()]))
    }

    pub fn long() -> Type {
        Type::from_raw(RawType::named("lang::Long").extends([number()]))
    }

    /// `app::web` 包中的消费者类型
    pub fn controller() -> Type {
        Type::named("app::web::Controller")
    }

    /// `app::batch` 包中的消费者类型
    pub fn job() -> Type {
        Type::named("app::batch::Job")
    }
}

/// 解析单个值并按 `T` 取出
pub fn value<T: Any + Send + Sync + Clone>(
    resolver: &dyn Resolver,
    dependency: &Dependency,
) -> DependencyResult<T> {
    let value = downcast::<T>(resolver.resolve_dependency(dependency)?, dependency)?;
    Ok((*value).clone())
}

/// 解析数组或集合请求，逐个按 `T` 取出
pub fn values<T: Any + Send + Sync + Clone>(
    resolver: &dyn Resolver,
    dependency: &Dependency,
) -> DependencyResult<Vec<T>> {
    let collection =
        downcast::<Vec<AnyInstance>>(resolver.resolve_dependency(dependency)?, dependency)?;
    collection
        .iter()
        .map(|element| downcast::<T>(element.clone(), dependency).map(|v| (*v).clone()))
        .collect()
}
