//! 实例标识与定位器

use crate::name::Name;
use crate::target::Target;
use crate::types::Type;
use std::fmt;

/// 实例标识：名称和类型，描述"需要什么"
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Instance {
    name: Name,
    ty: Type,
}

impl Instance {
    /// 创建实例标识
    pub fn new(name: Name, ty: Type) -> Self {
        Self { name, ty }
    }

    /// 默认名称的实例
    pub fn of(ty: Type) -> Self {
        Self::new(Name::DEFAULT, ty)
    }

    /// 任意名称的实例
    pub fn any_of(ty: Type) -> Self {
        Self::new(Name::ANY, ty)
    }

    /// 指定名称的实例
    pub fn named(name: impl Into<Name>, ty: Type) -> Self {
        Self::new(name.into(), ty)
    }

    /// 名称
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// 类型
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// 替换类型，保留名称
    pub fn with_type(&self, ty: Type) -> Self {
        Self::new(self.name.clone(), ty)
    }

    /// 替换名称，保留类型
    pub fn with_name(&self, name: Name) -> Self {
        Self::new(name, self.ty.clone())
    }

    /// 能否满足对 `other` 的请求
    pub fn is_assignable_to(&self, other: &Instance) -> bool {
        self.ty.is_assignable_to(&other.ty) && self.name.is_compatible_with(&other.name)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_default() {
            write!(f, "{}", self.ty)
        } else {
            write!(f, "{} \"{}\"", self.ty, self.name)
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 定位器：实例标识加目标收窄，绑定的完整键
///
/// 同一注册表内定位器必须唯一。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    instance: Instance,
    target: Target,
}

impl Locator {
    /// 创建定位器
    pub fn new(instance: Instance, target: Target) -> Self {
        Self { instance, target }
    }

    /// 不带目标收窄的定位器
    pub fn of(instance: Instance) -> Self {
        Self::new(instance, Target::ANY)
    }

    /// 实例标识
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// 目标收窄
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// 类型
    pub fn ty(&self) -> &Type {
        self.instance.ty()
    }

    /// 名称
    pub fn name(&self) -> &Name {
        self.instance.name()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.target.is_any() {
            write!(f, "{}", self.instance)
        } else {
            write!(f, "{} {}", self.instance, self.target)
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
