//! 目标收窄
//!
//! 目标把绑定的适用范围收窄到特定的注入点：注入到某个实例或某类实例中、
//! 父实例链（"注入到 X 且 X 位于 Y 中"），以及注入点所在的包。

use crate::instance::Instance;
use crate::name::Name;
use std::borrow::Cow;
use std::fmt;

/// 包模式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Package {
    name: Cow<'static, str>,
    subpackages: bool,
}

impl Package {
    /// 仅匹配该包本身
    pub fn exactly(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            subpackages: false,
        }
    }

    /// 匹配该包及其所有子包
    pub fn with_subpackages(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            subpackages: true,
        }
    }

    /// 包名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 包路径段数
    pub fn depth(&self) -> usize {
        if self.name.is_empty() {
            0
        } else {
            self.name.split("::").count()
        }
    }

    /// 是否包含给定包
    pub fn contains(&self, package: &str) -> bool {
        package == self.name
            || (self.subpackages
                && (self.name.is_empty()
                    || package
                        .strip_prefix(self.name.as_ref())
                        .is_some_and(|rest| rest.starts_with("::"))))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subpackages {
            write!(f, "{}::*", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// 包集合
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Packages {
    /// 所有包
    All,
    /// 仅列出的包
    Only(Vec<Package>),
}

impl Packages {
    /// 由包模式列表构造
    pub fn only(packages: impl IntoIterator<Item = Package>) -> Self {
        Self::Only(packages.into_iter().collect())
    }

    /// 是否不做包限制
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// 是否包含给定包
    pub fn contains(&self, package: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(packages) => packages.iter().any(|p| p.contains(package)),
        }
    }

    /// 包限制的深度，越深越具体
    pub fn depth(&self) -> usize {
        match self {
            Self::All => 0,
            Self::Only(packages) => packages.iter().map(Package::depth).max().unwrap_or(0),
        }
    }
}

impl fmt::Display for Packages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Only(packages) => {
                let names: Vec<String> = packages.iter().map(ToString::to_string).collect();
                write!(f, "{}", names.join(", "))
            }
        }
    }
}

/// 特异度层级，按从低到高排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecificityTier {
    /// 全局
    Global,
    /// 包限制
    Package,
    /// 注入到某类实例
    Class,
    /// 注入到具名的具体实例
    Instance,
}

/// 目标特异度，值越大越具体
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    /// 层级
    pub tier: SpecificityTier,
    /// 父实例链长度
    pub chain: usize,
    /// 包限制深度
    pub package_depth: usize,
}

/// 目标收窄
///
/// `parents[0]` 是直接注入点，`parents[1]` 是注入点的注入点，以此类推。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Target {
    parents: Vec<Instance>,
    packages: Packages,
}

impl Target {
    /// 处处匹配的默认目标
    pub const ANY: Target = Target {
        parents: Vec::new(),
        packages: Packages::All,
    };

    /// 注入到 `parent` 中
    pub fn injecting_into(parent: Instance) -> Self {
        Self {
            parents: vec![parent],
            packages: Packages::All,
        }
    }

    /// 仅在给定包中
    pub fn in_packages(packages: Packages) -> Self {
        Self {
            parents: Vec::new(),
            packages,
        }
    }

    /// 追加外层父实例："且位于 `outer` 中"
    pub fn within(mut self, outer: Instance) -> Self {
        self.parents.push(outer);
        self
    }

    /// 设置包限制
    pub fn within_packages(mut self, packages: Packages) -> Self {
        self.packages = packages;
        self
    }

    /// 父实例链
    pub fn parents(&self) -> &[Instance] {
        &self.parents
    }

    /// 包限制
    pub fn packages(&self) -> &Packages {
        &self.packages
    }

    /// 是否为处处匹配的默认目标
    pub fn is_any(&self) -> bool {
        self.parents.is_empty() && self.packages.is_all()
    }

    /// 特异度
    pub fn specificity(&self) -> Specificity {
        let tier = match self.parents.first() {
            Some(parent) if !parent.name().is_any() => SpecificityTier::Instance,
            Some(_) => SpecificityTier::Class,
            None if !self.packages.is_all() => SpecificityTier::Package,
            None => SpecificityTier::Global,
        };
        Specificity {
            tier,
            chain: self.parents.len(),
            package_depth: self.packages.depth(),
        }
    }

    /// 是否匹配注入点链，`consumers` 从直接注入点开始
    pub fn matches<'a>(&self, consumers: impl IntoIterator<Item = &'a Instance>) -> bool {
        let mut consumers = consumers.into_iter();
        let mut next = consumers.next();

        if !self.packages.is_all() {
            match next {
                Some(consumer) if self.packages.contains(consumer.ty().raw().package()) => {}
                _ => return false,
            }
        }

        for parent in &self.parents {
            match next {
                Some(consumer) if Self::parent_matches(parent, consumer) => {
                    next = consumers.next();
                }
                _ => return false,
            }
        }
        true
    }

    fn parent_matches(parent: &Instance, consumer: &Instance) -> bool {
        let name_matches = parent.name().is_any()
            || (consumer.name() != &Name::ANY && parent.name().is_compatible_with(consumer.name()));
        let type_matches = if parent.ty().is_upper_bound() {
            consumer.ty().is_assignable_to(&parent.ty().as_exact())
        } else {
            consumer.ty() == parent.ty()
        };
        name_matches && type_matches
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::ANY
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, parent) in self.parents.iter().enumerate() {
            if i == 0 {
                write!(f, "into {parent}")?;
            } else {
                write!(f, " within {parent}")?;
            }
        }
        if !self.packages.is_all() {
            if !self.parents.is_empty() {
                f.write_str(" ")?;
            }
            write!(f, "in {}", self.packages)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
