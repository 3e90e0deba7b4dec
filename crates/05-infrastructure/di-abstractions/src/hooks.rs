//! 扩展钩子
//!
//! 提升钩子在实例构造完成后装饰或替换它，观察者在提升之后收到通知。
//! 二者都只作用于新构造的实例，作用域缓存命中的实例不会再次经过钩子。

use crate::dependency::Dependency;
use crate::generator::AnyInstance;
use crate::types::Type;
use infrastructure_common::DependencyResult;
use std::fmt;
use std::sync::Arc;

/// 提升钩子
pub trait Lift: Send + Sync {
    /// 执行顺序，小的先执行，相同时按注册顺序
    fn order(&self) -> i32 {
        0
    }

    /// 装饰或替换新构造的实例
    fn lift(&self, value: AnyInstance, dependency: &Dependency) -> DependencyResult<AnyInstance>;
}

/// 以闭包实现的提升钩子
pub struct FnLift<F> {
    order: i32,
    lift: F,
}

impl<F> FnLift<F>
where
    F: Fn(AnyInstance) -> DependencyResult<AnyInstance> + Send + Sync,
{
    /// 以执行顺序和闭包创建
    pub fn new(order: i32, lift: F) -> Self {
        Self { order, lift }
    }
}

impl<F> Lift for FnLift<F>
where
    F: Fn(AnyInstance) -> DependencyResult<AnyInstance> + Send + Sync,
{
    fn order(&self) -> i32 {
        self.order
    }

    fn lift(&self, value: AnyInstance, _: &Dependency) -> DependencyResult<AnyInstance> {
        (self.lift)(value)
    }
}

/// 观察者
pub trait Observer: Send + Sync {
    /// 实例构造并提升完成
    fn constructed(&self, value: &AnyInstance, dependency: &Dependency);
}

/// 注册在类型模式上的提升钩子
#[derive(Clone)]
pub struct LiftBinding {
    pattern: Type,
    lift: Arc<dyn Lift>,
}

impl LiftBinding {
    /// 为 `pattern` 注册提升钩子
    pub fn new(pattern: Type, lift: Arc<dyn Lift>) -> Self {
        Self { pattern, lift }
    }

    /// 匹配的类型模式
    pub fn pattern(&self) -> &Type {
        &self.pattern
    }

    /// 执行顺序
    pub fn order(&self) -> i32 {
        self.lift.order()
    }

    /// 是否作用于 `ty` 类型的资源
    pub fn applies_to(&self, ty: &Type) -> bool {
        ty.is_assignable_to(&self.pattern)
    }

    /// 应用提升钩子
    pub fn lift(&self, value: AnyInstance, dependency: &Dependency) -> DependencyResult<AnyInstance> {
        self.lift.lift(value, dependency)
    }
}

impl fmt::Debug for LiftBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LiftBinding({}, order {})", self.pattern, self.order())
    }
}

/// 注册在类型模式上的观察者
#[derive(Clone)]
pub struct ObserverBinding {
    pattern: Type,
    observer: Arc<dyn Observer>,
}

impl ObserverBinding {
    /// 为 `pattern` 注册观察者
    pub fn new(pattern: Type, observer: Arc<dyn Observer>) -> Self {
        Self { pattern, observer }
    }

    /// 匹配的类型模式
    pub fn pattern(&self) -> &Type {
        &self.pattern
    }

    /// `ty` 是否匹配模式
    pub fn applies_to(&self, ty: &Type) -> bool {
        ty.is_assignable_to(&self.pattern)
    }

    /// 通知观察者
    pub fn notify(&self, value: &AnyInstance, dependency: &Dependency) {
        self.observer.constructed(value, dependency);
    }
}

impl fmt::Debug for ObserverBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverBinding({})", self.pattern)
    }
}
