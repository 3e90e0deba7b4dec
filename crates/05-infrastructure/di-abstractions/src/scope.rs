//! 作用域生命周期与作用域接口

use crate::dependency::Dependency;
use crate::generator::AnyInstance;
use infrastructure_common::DependencyResult;
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

static APPLICATION: Lazy<ScopeLifeCycle> =
    Lazy::new(|| ScopeLifeCycle::permanent(ScopeLifeCycle::APPLICATION));
static DEPENDENCY_TYPE: Lazy<ScopeLifeCycle> =
    Lazy::new(|| ScopeLifeCycle::permanent(ScopeLifeCycle::DEPENDENCY_TYPE));
static TARGET_INSTANCE: Lazy<ScopeLifeCycle> =
    Lazy::new(|| ScopeLifeCycle::permanent(ScopeLifeCycle::TARGET_INSTANCE));
static INJECTION: Lazy<ScopeLifeCycle> =
    Lazy::new(|| ScopeLifeCycle::transient(ScopeLifeCycle::INJECTION));
static THREAD: Lazy<ScopeLifeCycle> =
    Lazy::new(|| ScopeLifeCycle::transient(ScopeLifeCycle::THREAD));
static WORKER: Lazy<ScopeLifeCycle> =
    Lazy::new(|| ScopeLifeCycle::transient(ScopeLifeCycle::WORKER));

struct LifeCycleData {
    name: Cow<'static, str>,
    permanent: bool,
    derived_from: Option<ScopeLifeCycle>,
}

/// 作用域生命周期
///
/// 描述作用域的持久性。持久作用域（应用、依赖类型、目标实例）中的实例在解析上下文的整个生命周期内有效，
/// 可以注入到任何作用域；短暂作用域（注入、线程、工作单元）中的实例只能注入到同一作用域，
/// 或显式派生自它的作用域。按名称比较。
#[derive(Clone)]
pub struct ScopeLifeCycle(Arc<LifeCycleData>);

impl ScopeLifeCycle {
    /// 应用作用域名称
    pub const APPLICATION: &'static str = "application";
    /// 依赖类型作用域名称
    pub const DEPENDENCY_TYPE: &'static str = "dependency_type";
    /// 目标实例作用域名称
    pub const TARGET_INSTANCE: &'static str = "target_instance";
    /// 注入作用域名称
    pub const INJECTION: &'static str = "injection";
    /// 线程作用域名称
    pub const THREAD: &'static str = "thread";
    /// 工作单元作用域名称
    pub const WORKER: &'static str = "worker";

    /// 持久生命周期
    pub fn permanent(name: impl Into<Cow<'static, str>>) -> Self {
        Self(Arc::new(LifeCycleData {
            name: name.into(),
            permanent: true,
            derived_from: None,
        }))
    }

    /// 短暂生命周期
    pub fn transient(name: impl Into<Cow<'static, str>>) -> Self {
        Self(Arc::new(LifeCycleData {
            name: name.into(),
            permanent: false,
            derived_from: None,
        }))
    }

    /// 派生出新的生命周期，本生命周期的实例在派生生命周期中一致
    pub fn derive(&self, name: impl Into<Cow<'static, str>>) -> Self {
        Self(Arc::new(LifeCycleData {
            name: name.into(),
            permanent: self.0.permanent,
            derived_from: Some(self.clone()),
        }))
    }

    /// 应用生命周期
    pub fn application() -> Self {
        APPLICATION.clone()
    }

    /// 依赖类型生命周期
    pub fn dependency_type() -> Self {
        DEPENDENCY_TYPE.clone()
    }

    /// 目标实例生命周期
    pub fn target_instance() -> Self {
        TARGET_INSTANCE.clone()
    }

    /// 注入生命周期
    pub fn injection() -> Self {
        INJECTION.clone()
    }

    /// 线程生命周期
    pub fn thread() -> Self {
        THREAD.clone()
    }

    /// 工作单元生命周期
    pub fn worker() -> Self {
        WORKER.clone()
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// 是否持久
    pub fn is_permanent(&self) -> bool {
        self.0.permanent
    }

    /// 是否（直接或间接）派生自 `other`
    pub fn is_derived_from(&self, other: &ScopeLifeCycle) -> bool {
        let mut current = self.0.derived_from.as_ref();
        while let Some(parent) = current {
            if parent == other {
                return true;
            }
            current = parent.0.derived_from.as_ref();
        }
        false
    }

    /// 本作用域的实例能否注入到 `consumer` 作用域的实例中
    pub fn is_consistent_in(&self, consumer: &ScopeLifeCycle) -> bool {
        self.is_permanent() || self == consumer || consumer.is_derived_from(self)
    }
}

impl PartialEq for ScopeLifeCycle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for ScopeLifeCycle {}

impl Hash for ScopeLifeCycle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Display for ScopeLifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl fmt::Debug for ScopeLifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeLifeCycle")
            .field("name", &self.0.name)
            .field("permanent", &self.0.permanent)
            .finish()
    }
}

/// 作用域缓存键
pub struct ScopeKey<'a> {
    /// 资源序号
    pub serial: usize,
    /// 尚未进入资源的原始请求
    pub request: &'a Dependency,
}

/// 作用域
///
/// 决定资源的实例何时复用、何时新建。`generate` 负责真正构造实例，
/// 实现方不得在持有锁时调用它。
pub trait Scope: Send + Sync {
    /// 生命周期描述
    fn lifecycle(&self) -> &ScopeLifeCycle;

    /// 提供实例：命中缓存则复用，否则调用 `generate`
    fn provide(
        &self,
        key: &ScopeKey<'_>,
        generate: &mut dyn FnMut() -> DependencyResult<AnyInstance>,
    ) -> DependencyResult<AnyInstance>;
}
