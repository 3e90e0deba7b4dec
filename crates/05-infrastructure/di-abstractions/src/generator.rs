//! 实例生成策略
//!
//! 每个资源独占一个生成器。生成器只负责构造，缓存由作用域负责，装饰由提升钩子负责。

use crate::dependency::Dependency;
use crate::instance::Instance;
use crate::name::Name;
use crate::resolver::Resolver;
use crate::types::Type;
use infrastructure_common::{DependencyError, DependencyResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 类型擦除后的实例
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// 构造函数类型
pub type ConstructFn = Arc<dyn Fn(Arguments) -> anyhow::Result<AnyInstance> + Send + Sync>;

/// 供给函数类型
pub type SupplyFn =
    Arc<dyn Fn(&Dependency, &dyn Resolver) -> anyhow::Result<AnyInstance> + Send + Sync>;

/// 实例生成器
pub trait Generator: Send + Sync {
    /// 生成实例
    ///
    /// `dependency` 已进入当前资源，其直接注入点就是资源自身。
    fn generate(
        &self,
        dependency: &Dependency,
        resolver: &dyn Resolver,
    ) -> DependencyResult<AnyInstance>;

    /// 声明的构造参数，预先校验时据此遍历依赖图
    fn parameters(&self) -> &[Parameter] {
        &[]
    }
}

/// 把用户代码返回的错误转为依赖注入错误
///
/// 原样传播其中的 `DependencyError`，其余包装为 `SupplyFailed`。
pub fn supply_failed(dependency: &Dependency, error: anyhow::Error) -> DependencyError {
    match error.downcast::<DependencyError>() {
        Ok(error) => error,
        Err(error) => DependencyError::SupplyFailed {
            resource: dependency
                .consumer()
                .map_or_else(|| dependency.to_string(), ToString::to_string),
            source: error.into(),
        },
    }
}

/// 构造参数
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    instance: Instance,
    ignore_scoping: bool,
}

impl Parameter {
    /// 按实例标识创建参数
    pub fn new(instance: Instance) -> Self {
        Self {
            instance,
            ignore_scoping: false,
        }
    }

    /// 默认名称的参数
    pub fn of(ty: Type) -> Self {
        Self::new(Instance::of(ty))
    }

    /// 指定名称的参数
    pub fn named(name: impl Into<Name>, ty: Type) -> Self {
        Self::new(Instance::named(name, ty))
    }

    /// 该参数跳过作用域一致性检查
    pub fn ignoring_scopes(mut self) -> Self {
        self.ignore_scoping = true;
        self
    }

    /// 参数请求的实例
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// 是否跳过作用域一致性检查
    pub fn ignores_scoping(&self) -> bool {
        self.ignore_scoping
    }

    /// 在 `consumer` 之下请求该参数
    pub fn dependency(&self, consumer: &Dependency) -> Dependency {
        let dependency = consumer.request(self.instance.clone());
        if self.ignore_scoping {
            dependency.ignoring_scopes()
        } else {
            dependency
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter({})", self.instance)
    }
}

/// 已解析的构造参数
pub struct Arguments(Vec<AnyInstance>);

impl Arguments {
    /// 以解析结果创建参数列表
    pub fn new(values: Vec<AnyInstance>) -> Self {
        Self(values)
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 第 `index` 个参数的原始值
    pub fn raw(&self, index: usize) -> Option<&AnyInstance> {
        self.0.get(index)
    }

    /// 第 `index` 个参数，按 `T` 取出
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> DependencyResult<Arc<T>> {
        let value = self.0.get(index).cloned().ok_or_else(|| DependencyError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            request: format!("参数 #{index} 不存在"),
        })?;
        value.downcast::<T>().map_err(|_| DependencyError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            request: format!("参数 #{index}"),
        })
    }

    /// 取出全部参数
    pub fn into_vec(self) -> Vec<AnyInstance> {
        self.0
    }
}

/// 常量：总是返回同一个预先构造好的值
pub struct Constant {
    value: AnyInstance,
}

impl Constant {
    /// 以值创建常量
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// 以已共享的实例创建常量
    pub fn shared(value: AnyInstance) -> Self {
        Self { value }
    }
}

impl Generator for Constant {
    fn generate(&self, _: &Dependency, _: &dyn Resolver) -> DependencyResult<AnyInstance> {
        Ok(self.value.clone())
    }
}

/// 构造器：先解析声明的参数，再调用构造函数
pub struct Constructor {
    parameters: Vec<Parameter>,
    construct: ConstructFn,
}

impl Constructor {
    /// 以参数列表和构造函数创建
    pub fn new<F>(parameters: impl IntoIterator<Item = Parameter>, construct: F) -> Self
    where
        F: Fn(Arguments) -> anyhow::Result<AnyInstance> + Send + Sync + 'static,
    {
        Self {
            parameters: parameters.into_iter().collect(),
            construct: Arc::new(construct),
        }
    }
}

impl Generator for Constructor {
    fn generate(
        &self,
        dependency: &Dependency,
        resolver: &dyn Resolver,
    ) -> DependencyResult<AnyInstance> {
        let arguments = self
            .parameters
            .iter()
            .map(|parameter| resolver.resolve_dependency(&parameter.dependency(dependency)))
            .collect::<DependencyResult<Vec<_>>>()?;
        (self.construct)(Arguments::new(arguments)).map_err(|e| supply_failed(dependency, e))
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}

/// 供给器：由闭包在解析时动态决定实例，可再次调用解析器
pub struct Supplier {
    supply: SupplyFn,
}

impl Supplier {
    /// 以供给函数创建
    pub fn new<F>(supply: F) -> Self
    where
        F: Fn(&Dependency, &dyn Resolver) -> anyhow::Result<AnyInstance> + Send + Sync + 'static,
    {
        Self {
            supply: Arc::new(supply),
        }
    }
}

impl Generator for Supplier {
    fn generate(
        &self,
        dependency: &Dependency,
        resolver: &dyn Resolver,
    ) -> DependencyResult<AnyInstance> {
        (self.supply)(dependency, resolver).map_err(|e| supply_failed(dependency, e))
    }
}
