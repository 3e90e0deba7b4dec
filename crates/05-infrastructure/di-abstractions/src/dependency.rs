//! 解析请求与注入点链

use crate::instance::Instance;
use crate::name::Name;
use crate::scope::ScopeLifeCycle;
use crate::types::Type;
use infrastructure_common::{DependencyError, DependencyResult};
use std::fmt;
use std::sync::Arc;

/// 注入点：正在构造的消费者
#[derive(Clone)]
pub struct InjectionSite {
    instance: Instance,
    serial: Option<usize>,
    scope: Option<ScopeLifeCycle>,
}

impl InjectionSite {
    /// 由解析上下文中的资源构成的注入点
    pub fn resource(instance: Instance, serial: usize, scope: ScopeLifeCycle) -> Self {
        Self {
            instance,
            serial: Some(serial),
            scope: Some(scope),
        }
    }

    /// 由调用方声明的外部注入点，不对应任何资源
    pub fn external(instance: Instance) -> Self {
        Self {
            instance,
            serial: None,
            scope: None,
        }
    }

    /// 注入点对应的实例
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// 资源序号，外部注入点没有
    pub fn serial(&self) -> Option<usize> {
        self.serial
    }

    /// 资源的作用域生命周期
    pub fn scope(&self) -> Option<&ScopeLifeCycle> {
        self.scope.as_ref()
    }
}

impl fmt::Display for InjectionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance)
    }
}

impl fmt::Debug for InjectionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionSite")
            .field("instance", &self.instance)
            .field("serial", &self.serial)
            .finish()
    }
}

struct ChainNode {
    site: InjectionSite,
    next: Option<Arc<ChainNode>>,
    depth: usize,
}

impl Drop for ChainNode {
    // 长链逐节点释放，避免递归析构
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// 注入点链
///
/// 持久化的链表栈：压栈返回新链，原链不变，丢弃即出栈。
#[derive(Clone, Default)]
pub struct InjectionChain {
    head: Option<Arc<ChainNode>>,
}

impl InjectionChain {
    /// 空链
    pub fn empty() -> Self {
        Self::default()
    }

    /// 压入注入点
    pub fn push(&self, site: InjectionSite) -> Self {
        Self {
            head: Some(Arc::new(ChainNode {
                site,
                depth: self.depth() + 1,
                next: self.head.clone(),
            })),
        }
    }

    /// 链长度
    pub fn depth(&self) -> usize {
        self.head.as_ref().map_or(0, |node| node.depth)
    }

    /// 链是否为空
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// 直接注入点
    pub fn top(&self) -> Option<&InjectionSite> {
        self.head.as_deref().map(|node| &node.site)
    }

    /// 从直接注入点开始向外遍历
    pub fn iter(&self) -> impl Iterator<Item = &InjectionSite> + '_ {
        let mut current = self.head.as_deref();
        std::iter::from_fn(move || {
            let node = current?;
            current = node.next.as_deref();
            Some(&node.site)
        })
    }

    /// 从直接注入点开始的消费者实例
    pub fn instances(&self) -> impl Iterator<Item = &Instance> + '_ {
        self.iter().map(InjectionSite::instance)
    }

    /// 链上是否已有该资源
    pub fn contains_serial(&self, serial: usize) -> bool {
        self.iter().any(|site| site.serial == Some(serial))
    }

    /// 链顶 `count` 个注入点中是否已有该资源
    fn top_contains_serial(&self, count: usize, serial: usize) -> bool {
        self.iter().take(count).any(|site| site.serial == Some(serial))
    }
}

impl fmt::Debug for InjectionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// 解析请求
///
/// 请求的实例（类型加名称）、注入点链和作用域检查开关。短暂存在，克隆代价很低。
///
/// `floor` 以下的注入点只参与目标匹配，不计入循环检测和解析深度。
#[derive(Clone)]
pub struct Dependency {
    instance: Instance,
    sites: InjectionChain,
    floor: usize,
    ignore_scoping: bool,
}

impl Dependency {
    /// 顶层请求
    pub fn new(instance: Instance) -> Self {
        Self {
            instance,
            sites: InjectionChain::empty(),
            floor: 0,
            ignore_scoping: false,
        }
    }

    /// 默认名称的类型请求
    pub fn of(ty: Type) -> Self {
        Self::new(Instance::of(ty))
    }

    /// 指定名称的类型请求
    pub fn named(name: impl Into<Name>, ty: Type) -> Self {
        Self::new(Instance::named(name, ty))
    }

    /// 被请求的实例
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// 被请求的类型
    pub fn ty(&self) -> &Type {
        self.instance.ty()
    }

    /// 被请求的名称
    pub fn name(&self) -> &Name {
        self.instance.name()
    }

    /// 注入点链
    pub fn sites(&self) -> &InjectionChain {
        &self.sites
    }

    /// 直接注入点
    pub fn consumer(&self) -> Option<&InjectionSite> {
        self.sites.top()
    }

    /// 是否跳过作用域一致性检查
    pub fn ignores_scoping(&self) -> bool {
        self.ignore_scoping
    }

    /// 跳过作用域一致性检查
    pub fn ignoring_scopes(mut self) -> Self {
        self.ignore_scoping = true;
        self
    }

    /// 脱离当前构造：已有注入点保留用于目标匹配，但不再视为进行中
    pub fn detached(mut self) -> Self {
        self.floor = self.sites.depth();
        self
    }

    /// 进行中的注入点数
    pub fn in_flight(&self) -> usize {
        self.sites.depth().saturating_sub(self.floor)
    }

    /// 声明请求来自外部注入点 `consumer`
    pub fn injected_into(mut self, consumer: Instance) -> Self {
        self.sites = self.sites.push(InjectionSite::external(consumer));
        self
    }

    /// 在同一注入点链下发起新的请求
    pub fn request(&self, instance: Instance) -> Self {
        Self {
            instance,
            sites: self.sites.clone(),
            floor: self.floor,
            ignore_scoping: false,
        }
    }

    /// 压入注入点，不做检查
    pub fn push(&self, site: InjectionSite) -> Self {
        Self {
            instance: self.instance.clone(),
            sites: self.sites.push(site),
            floor: self.floor,
            ignore_scoping: self.ignore_scoping,
        }
    }

    /// 进入资源：检查循环依赖和解析深度后压入注入点
    pub fn entering(&self, site: InjectionSite, max_depth: usize) -> DependencyResult<Self> {
        let in_flight = self.in_flight();
        if let Some(serial) = site.serial {
            if self.sites.top_contains_serial(in_flight, serial) {
                let mut chain: Vec<String> = Vec::new();
                for existing in self.sites.iter().take(in_flight) {
                    chain.push(existing.to_string());
                    if existing.serial == Some(serial) {
                        break;
                    }
                }
                chain.reverse();
                chain.push(site.to_string());
                return Err(DependencyError::DependencyCycle { chain });
            }
        }
        if in_flight >= max_depth {
            return Err(DependencyError::ResolutionDepthExceeded {
                limit: max_depth,
                request: self.to_string(),
            });
        }
        Ok(self.push(site))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance)?;
        if let Some(consumer) = self.consumer() {
            write!(f, " (注入到 {consumer})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("instance", &self.instance)
            .field("sites", &self.sites)
            .field("floor", &self.floor)
            .field("ignore_scoping", &self.ignore_scoping)
            .finish()
    }
}
