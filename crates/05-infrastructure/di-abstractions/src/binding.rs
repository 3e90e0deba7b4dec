//! 绑定描述
//!
//! 外部绑定 DSL、模块组合等协作方最终产出的扁平描述列表，解析上下文据此一次性构建注册表。

use crate::generator::{Constant, Generator};
use crate::instance::{Instance, Locator};
use crate::name::Name;
use crate::scope::ScopeLifeCycle;
use crate::target::{Packages, Target};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// 声明种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// 容器推断出的隐式绑定
    Implicit,
    /// 模块对外发布的绑定
    Published,
    /// 可被覆盖的默认绑定
    Default,
    /// 显式绑定
    Explicit,
    /// 多重绑定，只追加不覆盖，不参与唯一性校验
    Multi,
}

impl DeclarationKind {
    /// 优先级，越大越优先
    pub fn precedence(self) -> u8 {
        match self {
            Self::Implicit => 0,
            Self::Published => 1,
            Self::Default => 2,
            Self::Explicit | Self::Multi => 3,
        }
    }

    /// 是否为多重绑定
    pub fn is_multi(self) -> bool {
        self == Self::Multi
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Implicit => "implicit",
            Self::Published => "published",
            Self::Default => "default",
            Self::Explicit => "explicit",
            Self::Multi => "multi",
        };
        f.write_str(name)
    }
}

/// 访问控制
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Access {
    /// 可按自身类型直接解析
    #[default]
    Direct,
    /// 仅能通过父类型（契约）解析，且只对边界内的消费者可见
    Indirect { boundary: Packages },
}

impl Access {
    /// 是否限制为间接访问
    pub fn is_indirect(&self) -> bool {
        matches!(self, Self::Indirect { .. })
    }
}

/// 绑定描述
#[derive(Clone)]
pub struct BindingDescriptor {
    locator: Locator,
    generator: Arc<dyn Generator>,
    scope: Cow<'static, str>,
    kind: DeclarationKind,
    source: Cow<'static, str>,
    access: Access,
}

impl BindingDescriptor {
    /// 绑定实例到生成器，默认应用作用域、显式声明
    pub fn new(instance: Instance, generator: impl Generator + 'static) -> Self {
        Self::with_generator(instance, Arc::new(generator))
    }

    /// 绑定到预先构造好的值
    pub fn constant<T: Any + Send + Sync>(instance: Instance, value: T) -> Self {
        Self::new(instance, Constant::new(value))
    }

    /// 共享生成器
    pub fn with_generator(instance: Instance, generator: Arc<dyn Generator>) -> Self {
        Self {
            locator: Locator::of(instance),
            generator,
            scope: Cow::Borrowed(ScopeLifeCycle::APPLICATION),
            kind: DeclarationKind::Explicit,
            source: Cow::Borrowed("<unknown>"),
            access: Access::Direct,
        }
    }

    /// 设置名称
    pub fn named(mut self, name: impl Into<Name>) -> Self {
        let instance = self.locator.instance().with_name(name.into());
        self.locator = Locator::new(instance, self.locator.target().clone());
        self
    }

    /// 收窄目标
    pub fn targeted(mut self, target: Target) -> Self {
        self.locator = Locator::new(self.locator.instance().clone(), target);
        self
    }

    /// 按名称引用作用域
    pub fn scoped(mut self, scope: impl Into<Cow<'static, str>>) -> Self {
        self.scope = scope.into();
        self
    }

    /// 设置声明方式
    pub fn kind(mut self, kind: DeclarationKind) -> Self {
        self.kind = kind;
        self
    }

    /// 多重绑定
    pub fn multi(self) -> Self {
        self.kind(DeclarationKind::Multi)
    }

    /// 声明来源，用于诊断
    pub fn source(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.source = source.into();
        self
    }

    /// 仅能通过契约类型解析，对 `boundary` 内的消费者可见
    pub fn indirect(mut self, boundary: Packages) -> Self {
        self.access = Access::Indirect { boundary };
        self
    }

    /// 资源定位
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// 生成器
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// 作用域名称
    pub fn scope_name(&self) -> &str {
        &self.scope
    }

    /// 声明方式
    pub fn declaration_kind(&self) -> DeclarationKind {
        self.kind
    }

    /// 声明来源
    pub fn source_name(&self) -> &str {
        &self.source
    }

    /// 访问限制
    pub fn access(&self) -> &Access {
        &self.access
    }
}

impl fmt::Debug for BindingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingDescriptor")
            .field("locator", &self.locator)
            .field("scope", &self.scope)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("access", &self.access)
            .finish()
    }
}
