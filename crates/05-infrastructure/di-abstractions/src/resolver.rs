//! 解析器接口

use crate::dependency::Dependency;
use crate::generator::AnyInstance;
use crate::instance::Instance;
use crate::name::Name;
use crate::types::Type;
use infrastructure_common::{DependencyError, DependencyResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 解析器
///
/// 按请求返回实例。数组、列表和集合解析为 `Vec<AnyInstance>`，
/// `Optional` 解析为 `Option<AnyInstance>`，`Provider` 解析为 [`Provider`]。
pub trait Resolver: Send + Sync {
    /// 解析请求
    fn resolve_dependency(&self, dependency: &Dependency) -> DependencyResult<AnyInstance>;
}

/// 把解析结果转为具体类型
pub fn downcast<T: Any + Send + Sync>(
    value: AnyInstance,
    request: &dyn fmt::Display,
) -> DependencyResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| DependencyError::TypeMismatch {
        expected: std::any::type_name::<T>().to_string(),
        request: request.to_string(),
    })
}

/// 类型化的便捷解析方法
pub trait ResolverExt: Resolver {
    /// 解析默认名称的 `T`
    fn resolve<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        self.resolve_instance(Instance::of(Type::of::<T>()))
    }

    /// 解析指定名称的 `T`
    fn resolve_named<T: Any + Send + Sync>(&self, name: impl Into<Name>) -> DependencyResult<Arc<T>> {
        self.resolve_instance(Instance::named(name, Type::of::<T>()))
    }

    /// 解析实例标识，结果按 `T` 取出
    fn resolve_instance<T: Any + Send + Sync>(&self, instance: Instance) -> DependencyResult<Arc<T>> {
        let dependency = Dependency::new(instance);
        downcast(self.resolve_dependency(&dependency)?, &dependency)
    }

    /// 解析所有 `T`
    fn resolve_all<T: Any + Send + Sync>(&self) -> DependencyResult<Vec<Arc<T>>> {
        let dependency = Dependency::new(Instance::any_of(Type::array(Type::of::<T>())));
        let values = downcast::<Vec<AnyInstance>>(self.resolve_dependency(&dependency)?, &dependency)?;
        values
            .iter()
            .map(|value| downcast(value.clone(), &dependency))
            .collect()
    }

    /// 解析可能不存在的 `T`
    fn resolve_optional<T: Any + Send + Sync>(&self) -> DependencyResult<Option<Arc<T>>> {
        let dependency = Dependency::of(Type::optional(Type::of::<T>()));
        let value = downcast::<Option<AnyInstance>>(self.resolve_dependency(&dependency)?, &dependency)?;
        Option::as_ref(&*value)
            .map(|value| downcast(value.clone(), &dependency))
            .transpose()
    }

    /// 获取 `T` 的延迟提供者
    fn resolve_provider<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<Provider>> {
        let dependency = Dependency::of(Type::provider(Type::of::<T>()));
        downcast(self.resolve_dependency(&dependency)?, &dependency)
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

/// 延迟提供者
///
/// 每次调用 [`Provider::get`] 时才解析，结果遵循被提供资源自己的作用域。
/// 提供者在任何作用域中都一致，是把短暂依赖注入持久消费者的标准方式。
/// 提供者不延长解析上下文的生命周期，上下文释放后 `get` 返回 `ContextDropped`。
pub struct Provider {
    resolver: Arc<dyn Resolver>,
    dependency: Dependency,
}

impl Provider {
    /// 以 `resolver` 延迟解析 `dependency`
    pub fn new(resolver: Arc<dyn Resolver>, dependency: Dependency) -> Self {
        Self {
            resolver,
            dependency,
        }
    }

    /// 被提供的请求
    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// 解析一次
    pub fn get(&self) -> DependencyResult<AnyInstance> {
        self.resolver.resolve_dependency(&self.dependency)
    }

    /// 解析一次并按 `T` 取出
    pub fn get_as<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        downcast(self.get()?, &self.dependency)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider({})", self.dependency)
    }
}
