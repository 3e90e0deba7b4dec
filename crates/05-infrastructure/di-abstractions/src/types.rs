//! 泛型类型模型
//!
//! 用封闭的结构化值描述绑定时捕获的类型签名：原始类型、类型参数、数组维度和上界标记。
//! 赋值兼容性完全基于这些值计算，不依赖任何运行时反射。
//!
//! 原始类型在构造时声明直接父类型，父类型的传递闭包在构造时一次性算出并缓存在原始类型内部。
//! 父类型的类型参数可以通过 [`Type::variable`] 引用子类型自己的类型参数，
//! 例如 `ArrayList<T0>` 继承 `List<T0>`，判断 `ArrayList<Integer>` 能否赋值给
//! `List<Integer>` 时再代入实际参数。

use once_cell::sync::Lazy;
use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

static ANY: Lazy<RawType> = Lazy::new(|| RawType::named("di::Any"));
static LIST: Lazy<RawType> = Lazy::new(|| RawType::generic("di::List", 1));
static SET: Lazy<RawType> = Lazy::new(|| RawType::generic("di::Set", 1));
static OPTIONAL: Lazy<RawType> = Lazy::new(|| RawType::generic("di::Optional", 1));
static PROVIDER: Lazy<RawType> = Lazy::new(|| RawType::generic("di::Provider", 1));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RawKind {
    Class,
    Variable(usize),
}

#[derive(Clone)]
struct RawTypeData {
    name: Cow<'static, str>,
    type_id: Option<TypeId>,
    arity: usize,
    kind: RawKind,
    supertypes: Vec<Type>,
    closure: Vec<Type>,
}

/// 原始类型
///
/// 按名称比较相等。同名原始类型必须声明相同的父类型，注册表构建时会校验这一点。
#[derive(Clone)]
pub struct RawType(Arc<RawTypeData>);

impl RawType {
    /// 按名称声明无类型参数的原始类型
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::generic(name, 0)
    }

    /// 按名称声明带 `arity` 个类型参数的原始类型
    pub fn generic(name: impl Into<Cow<'static, str>>, arity: usize) -> Self {
        Self(Arc::new(RawTypeData {
            name: name.into(),
            type_id: None,
            arity,
            kind: RawKind::Class,
            supertypes: Vec::new(),
            closure: Vec::new(),
        }))
    }

    /// 从 Rust 类型捕获原始类型
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Arc::new(RawTypeData {
            name: Cow::Borrowed(std::any::type_name::<T>()),
            type_id: Some(TypeId::of::<T>()),
            arity: 0,
            kind: RawKind::Class,
            supertypes: Vec::new(),
            closure: Vec::new(),
        }))
    }

    fn variable(index: usize) -> Self {
        Self(Arc::new(RawTypeData {
            name: Cow::Owned(format!("T{index}")),
            type_id: None,
            arity: 0,
            kind: RawKind::Variable(index),
            supertypes: Vec::new(),
            closure: Vec::new(),
        }))
    }

    /// 声明直接父类型，并计算父类型闭包
    pub fn extends(self, supertypes: impl IntoIterator<Item = Type>) -> Self {
        let mut data = Arc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone());
        data.supertypes.extend(supertypes.into_iter().filter(|s| !s.raw.is_any()));
        data.closure = compute_closure(&data.supertypes);
        Self(Arc::new(data))
    }

    /// 顶层类型，所有类型都可以赋值给它
    pub fn any() -> Self {
        ANY.clone()
    }

    /// 列表容器
    pub fn list() -> Self {
        LIST.clone()
    }

    /// 集合容器
    pub fn set() -> Self {
        SET.clone()
    }

    /// 可选值容器
    pub fn optional() -> Self {
        OPTIONAL.clone()
    }

    /// 延迟提供者
    pub fn provider() -> Self {
        PROVIDER.clone()
    }

    /// 完整名称
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// 不含模块路径的简短名称
    pub fn simple_name(&self) -> &str {
        let name = self.name();
        let base_end = name.find('<').unwrap_or(name.len());
        let start = name[..base_end].rfind("::").map_or(0, |i| i + 2);
        &name[start..]
    }

    /// 所在包（模块路径），顶层类型返回空字符串
    pub fn package(&self) -> &str {
        let name = self.name();
        let base_end = name.find('<').unwrap_or(name.len());
        name[..base_end].rfind("::").map_or("", |i| &name[..i])
    }

    /// 类型参数个数
    pub fn arity(&self) -> usize {
        self.0.arity
    }

    /// 捕获时的 `TypeId`（按名称声明的类型没有）
    pub fn type_id(&self) -> Option<TypeId> {
        self.0.type_id
    }

    /// 直接父类型
    pub fn supertypes(&self) -> &[Type] {
        &self.0.supertypes
    }

    /// 父类型的传递闭包，类型参数以本类型的类型变量表示
    pub fn closure(&self) -> &[Type] {
        &self.0.closure
    }

    /// 是否为顶层类型
    pub fn is_any(&self) -> bool {
        self == &*ANY
    }

    /// 是否为类型变量
    pub fn is_variable(&self) -> bool {
        matches!(self.0.kind, RawKind::Variable(_))
    }

    /// 类型变量的序号
    pub fn variable_index(&self) -> Option<usize> {
        match self.0.kind {
            RawKind::Variable(index) => Some(index),
            RawKind::Class => None,
        }
    }

    /// 原始类型层面的子类型关系
    pub fn is_subtype_of(&self, other: &RawType) -> bool {
        other.is_any() || self == other || self.0.closure.iter().any(|s| &s.raw == other)
    }

    /// 两个同名原始类型的声明是否一致
    pub fn same_declaration(&self, other: &RawType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self == other
                && self.0.arity == other.0.arity
                && self.0.closure == other.0.closure)
    }
}

fn compute_closure(supertypes: &[Type]) -> Vec<Type> {
    fn push_unique(closure: &mut Vec<Type>, candidate: Type) {
        if !closure.iter().any(|known| known.raw == candidate.raw) {
            closure.push(candidate);
        }
    }

    let mut closure: Vec<Type> = Vec::new();
    for supertype in supertypes {
        push_unique(&mut closure, supertype.clone());
        for inherited in supertype.raw.closure() {
            push_unique(&mut closure, inherited.substitute(&supertype.parameters));
        }
    }
    closure
}

impl PartialEq for RawType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.kind == other.0.kind && self.0.name == other.0.name)
    }
}

impl Eq for RawType {}

impl Hash for RawType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.kind.hash(state);
        self.0.name.hash(state);
    }
}

impl fmt::Display for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name())
    }
}

impl fmt::Debug for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 容器类型的种类，解析时可由元素类型的绑定桥接生成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// 数组
    Array,
    /// 列表
    List,
    /// 集合
    Set,
    /// 可选值
    Optional,
    /// 延迟提供者
    Provider,
}

/// 类型签名
///
/// 两个类型相等当且仅当原始类型、维度、上界标记以及所有类型参数递归相等。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type {
    raw: RawType,
    parameters: Arc<[Type]>,
    dimensions: u8,
    upper_bound: bool,
}

impl Type {
    /// 由原始类型构造
    pub fn from_raw(raw: RawType) -> Self {
        Self {
            raw,
            parameters: Arc::from(Vec::new()),
            dimensions: 0,
            upper_bound: false,
        }
    }

    /// 从 Rust 类型捕获
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_raw(RawType::of::<T>())
    }

    /// 按名称声明的无参类型
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::from_raw(RawType::named(name))
    }

    /// 第 `index` 个类型变量，只用于父类型声明
    pub fn variable(index: usize) -> Self {
        Self::from_raw(RawType::variable(index))
    }

    /// 顶层类型
    pub fn any() -> Self {
        Self::from_raw(RawType::any())
    }

    /// 无界通配符 `?`
    pub fn wildcard() -> Self {
        Self::any().as_upper_bound()
    }

    /// `component[]`
    pub fn array(component: Type) -> Self {
        component.add_array_dimension()
    }

    /// `List<element>`
    pub fn list(element: Type) -> Self {
        Self::from_raw(RawType::list()).parameterized([element])
    }

    /// `Set<element>`
    pub fn set(element: Type) -> Self {
        Self::from_raw(RawType::set()).parameterized([element])
    }

    /// `Optional<element>`
    pub fn optional(element: Type) -> Self {
        Self::from_raw(RawType::optional()).parameterized([element])
    }

    /// `Provider<element>`
    pub fn provider(element: Type) -> Self {
        Self::from_raw(RawType::provider()).parameterized([element])
    }

    /// 设置类型参数
    pub fn parameterized(mut self, parameters: impl IntoIterator<Item = Type>) -> Self {
        self.parameters = parameters.into_iter().collect();
        self
    }

    /// 原始类型
    pub fn raw(&self) -> &RawType {
        &self.raw
    }

    /// 全部类型参数
    pub fn parameters(&self) -> &[Type] {
        &self.parameters
    }

    /// 第 `index` 个类型参数
    pub fn parameter(&self, index: usize) -> Option<&Type> {
        self.parameters.get(index)
    }

    /// 是否带类型参数
    pub fn is_parameterized(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// 数组维度
    pub fn dimensions(&self) -> u8 {
        self.dimensions
    }

    /// 是否为数组
    pub fn is_array(&self) -> bool {
        self.dimensions > 0
    }

    /// 是否为上界类型 `? extends X`
    pub fn is_upper_bound(&self) -> bool {
        self.upper_bound
    }

    /// 是否为无界通配符
    pub fn is_unbounded_wildcard(&self) -> bool {
        self.upper_bound && self.raw.is_any() && self.dimensions == 0
    }

    /// 转为上界类型
    pub fn as_upper_bound(&self) -> Self {
        Self {
            upper_bound: true,
            ..self.clone()
        }
    }

    /// 去掉上界标记
    pub fn as_exact(&self) -> Self {
        Self {
            upper_bound: false,
            ..self.clone()
        }
    }

    /// 增加一个数组维度
    pub fn add_array_dimension(&self) -> Self {
        Self {
            dimensions: self.dimensions.saturating_add(1),
            ..self.clone()
        }
    }

    /// 数组的组件类型
    pub fn component_type(&self) -> Option<Self> {
        (self.dimensions > 0).then(|| Self {
            dimensions: self.dimensions - 1,
            ..self.clone()
        })
    }

    /// 容器种类
    pub fn container_kind(&self) -> Option<ContainerKind> {
        if self.dimensions > 0 {
            return Some(ContainerKind::Array);
        }
        if self.raw == *LIST {
            Some(ContainerKind::List)
        } else if self.raw == *SET {
            Some(ContainerKind::Set)
        } else if self.raw == *OPTIONAL {
            Some(ContainerKind::Optional)
        } else if self.raw == *PROVIDER {
            Some(ContainerKind::Provider)
        } else {
            None
        }
    }

    /// 容器的元素类型：数组的组件类型或容器的第一个类型参数
    pub fn element_type(&self) -> Option<Self> {
        match self.container_kind()? {
            ContainerKind::Array => self.component_type(),
            _ => Some(self.parameter(0).cloned().unwrap_or_else(Self::wildcard)),
        }
    }

    /// 结构相等
    pub fn equal_to(&self, other: &Self) -> bool {
        self == other
    }

    /// `self` 的值能否赋给 `other`
    pub fn is_assignable_to(&self, other: &Self) -> bool {
        if other.raw.is_any() && other.dimensions == 0 {
            return true;
        }
        if self.dimensions != other.dimensions {
            return other.raw.is_any() && other.dimensions < self.dimensions;
        }
        if other.raw.is_any() {
            return true;
        }
        let Some(view) = self.supertype(&other.raw) else {
            return false;
        };
        if other.parameters.is_empty() {
            return true;
        }
        if view.parameters.is_empty() {
            return other.parameters.iter().all(Self::is_unbounded_wildcard);
        }
        view.parameters.len() == other.parameters.len()
            && view
                .parameters
                .iter()
                .zip(other.parameters.iter())
                .all(|(actual, expected)| argument_compatible(actual, expected))
    }

    /// `other` 的值能否赋给 `self`
    pub fn is_assignable_from(&self, other: &Self) -> bool {
        other.is_assignable_to(self)
    }

    /// 以父类型 `raw` 的视角看待本类型，类型参数已代入
    pub fn supertype(&self, raw: &RawType) -> Option<Self> {
        if &self.raw == raw {
            return Some(self.clone());
        }
        self.raw
            .closure()
            .iter()
            .find(|s| &s.raw == raw)
            .map(|s| {
                let mut view = s.substitute(&self.parameters);
                view.dimensions = self.dimensions;
                view
            })
    }

    /// 用实际参数替换类型变量，缺失的参数以通配符代替
    pub fn substitute(&self, arguments: &[Type]) -> Self {
        if let Some(index) = self.raw.variable_index() {
            let mut actual = arguments.get(index).cloned().unwrap_or_else(Self::wildcard);
            actual.dimensions = actual.dimensions.saturating_add(self.dimensions);
            actual.upper_bound |= self.upper_bound;
            return actual;
        }
        if self.parameters.is_empty() {
            return self.clone();
        }
        Self {
            raw: self.raw.clone(),
            parameters: self.parameters.iter().map(|p| p.substitute(arguments)).collect(),
            dimensions: self.dimensions,
            upper_bound: self.upper_bound,
        }
    }

    /// 是否含有未代入的类型变量
    pub fn has_variables(&self) -> bool {
        self.raw.is_variable() || self.parameters.iter().any(Self::has_variables)
    }

    /// 遍历本类型及其参数中出现的所有原始类型
    pub fn visit_raw_types(&self, visit: &mut impl FnMut(&RawType)) {
        visit(&self.raw);
        for parameter in self.parameters.iter() {
            parameter.visit_raw_types(visit);
        }
    }
}

fn argument_compatible(actual: &Type, expected: &Type) -> bool {
    if actual.upper_bound || expected.upper_bound {
        actual.as_exact().is_assignable_to(&expected.as_exact())
    } else {
        actual == expected
    }
}

impl From<RawType> for Type {
    fn from(raw: RawType) -> Self {
        Self::from_raw(raw)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.upper_bound {
            if self.is_unbounded_wildcard() && self.parameters.is_empty() {
                return f.write_str("?");
            }
            f.write_str("? extends ")?;
        }
        write!(f, "{}", self.raw)?;
        if !self.parameters.is_empty() {
            f.write_str("<")?;
            for (i, parameter) in self.parameters.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{parameter}")?;
            }
            f.write_str(">")?;
        }
        for _ in 0..self.dimensions {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
