//! 绑定名称

use std::borrow::Cow;
use std::fmt;

/// 命名空间分隔符
pub const NAMESPACE_SEPARATOR: char = '.';

/// 绑定名称
///
/// 不透明的区分字符串，按值比较。`*` 表示任意名称，空字符串表示默认名称，
/// 以 `.*` 结尾的名称是覆盖整个命名空间的模式。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Cow<'static, str>);

impl Name {
    /// 任意名称
    pub const ANY: Name = Name(Cow::Borrowed("*"));

    /// 默认名称
    pub const DEFAULT: Name = Name(Cow::Borrowed(""));

    /// 创建名称
    pub fn named(value: impl Into<Cow<'static, str>>) -> Self {
        Self(value.into())
    }

    /// 覆盖命名空间内所有名称的模式
    pub fn namespace_pattern(namespace: &str) -> Self {
        Self(Cow::Owned(format!("{namespace}{NAMESPACE_SEPARATOR}*")))
    }

    /// 放入命名空间
    pub fn in_namespace(&self, namespace: &Name) -> Self {
        if namespace.is_default() {
            return self.clone();
        }
        Self(Cow::Owned(format!(
            "{}{NAMESPACE_SEPARATOR}{}",
            namespace.0, self.0
        )))
    }

    /// 名称的字符串值
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 是否为任意名称
    pub fn is_any(&self) -> bool {
        self.0 == "*"
    }

    /// 是否为默认名称
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    /// 是否为命名空间模式
    pub fn is_pattern(&self) -> bool {
        self.0.len() > 2 && self.0.ends_with(".*")
    }

    /// 所在命名空间
    pub fn namespace(&self) -> Option<&str> {
        let value = self.0.strip_suffix(".*").unwrap_or(&self.0);
        value.rfind(NAMESPACE_SEPARATOR).map(|i| &value[..i])
    }

    fn covers(&self, other: &Name) -> bool {
        self.is_pattern() && {
            let prefix = &self.0[..self.0.len() - 1];
            other.0.starts_with(prefix) && !other.is_pattern()
        }
    }

    /// 两个名称是否兼容
    pub fn is_compatible_with(&self, other: &Name) -> bool {
        self.is_any() || other.is_any() || self == other || self.covers(other) || other.covers(self)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&'static str> for Name {
    fn from(value: &'static str) -> Self {
        Self::named(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self::named(value)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}
