//! 候选选择
//!
//! 按请求类型、名称和注入点链收集候选资源并排序，选出唯一的最佳匹配，
//! 或为数组和集合请求收集元素资源。只做选择，不构造实例。

use crate::registry::{Registry, Resource};
use di_abstractions::{Access, ContainerKind, Dependency, Instance, Name, Specificity, Type};
use infrastructure_common::{DependencyError, DependencyResult, TieBreak};
use std::cmp::Ordering;
use std::collections::HashMap;

/// 排序键，按字典序比较，越大越优先
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    specificity: Specificity,
    exact_type: bool,
    exact_name: bool,
    precedence: u8,
}

/// 选择器
pub(crate) struct Resolution<'r> {
    registry: &'r Registry,
    tie_break: TieBreak,
}

impl<'r> Resolution<'r> {
    pub(crate) fn new(registry: &'r Registry, tie_break: TieBreak) -> Self {
        Self {
            registry,
            tie_break,
        }
    }

    /// 选择字面匹配请求的唯一资源，没有任何候选时返回 `None`
    pub(crate) fn select(&self, dependency: &Dependency) -> DependencyResult<Option<&'r Resource>> {
        let instance = dependency.instance();
        let mut illegal: Option<&'r Resource> = None;
        let mut singular: Vec<&'r Resource> = Vec::new();
        let mut multi: Vec<&'r Resource> = Vec::new();

        for resource in self.matching(dependency, instance.ty(), instance.name()) {
            if !is_accessible(resource, instance.ty(), dependency) {
                illegal.get_or_insert(resource);
                continue;
            }
            if resource.kind().is_multi() {
                multi.push(resource);
            } else {
                singular.push(resource);
            }
        }

        let pool = if singular.is_empty() { multi } else { singular };
        if pool.is_empty() {
            return match illegal {
                Some(resource) => Err(DependencyError::IllegalAccess {
                    request: dependency.to_string(),
                    resource: resource.to_string(),
                }),
                None => Ok(None),
            };
        }

        let Some(best) = pool.iter().map(|resource| rank(resource, instance)).max() else {
            return Ok(None);
        };
        let top: Vec<&'r Resource> = pool
            .into_iter()
            .filter(|resource| rank(resource, instance) == best)
            .collect();

        if let [only] = top.as_slice() {
            return Ok(Some(*only));
        }

        let same_instance = top.iter().all(|r| r.instance() == top[0].instance());
        match (same_instance, self.tie_break) {
            (true, TieBreak::LastDeclarationWins) => {
                Ok(top.iter().copied().max_by_key(|r| r.serial()))
            }
            _ => Err(DependencyError::ambiguous(
                dependency.to_string(),
                top.iter().map(ToString::to_string).collect(),
            )),
        }
    }

    /// 收集数组或集合请求的元素资源
    ///
    /// 单一绑定每个不同的实例取最佳资源，多重绑定全部保留，按声明顺序返回。
    /// 不可访问的资源直接跳过。
    pub(crate) fn elements(&self, dependency: &Dependency, element: &Type) -> Vec<&'r Resource> {
        let name = element_name(dependency.name());
        let instance = Instance::new(name.clone(), element.clone());
        let mut best: HashMap<&'r Instance, &'r Resource> = HashMap::new();
        let mut elements: Vec<&'r Resource> = Vec::new();

        for resource in self.matching(dependency, element, &name) {
            if !is_accessible(resource, element, dependency) {
                continue;
            }
            if resource.kind().is_multi() {
                elements.push(resource);
                continue;
            }
            best.entry(resource.instance())
                .and_modify(|current| {
                    let ordering = rank(resource, &instance)
                        .cmp(&rank(*current, &instance))
                        .then(resource.serial().cmp(&current.serial()));
                    if ordering == Ordering::Greater {
                        *current = resource;
                    }
                })
                .or_insert(resource);
        }

        elements.extend(best.into_values());
        elements.sort_by_key(|resource| resource.serial());
        elements
    }

    /// 预先校验时请求会用到的资源，提供者延迟解析，不计入
    pub(crate) fn planned(&self, dependency: &Dependency) -> DependencyResult<Vec<&'r Resource>> {
        if let Some(resource) = self.select(dependency)? {
            return Ok(vec![resource]);
        }
        let ty = dependency.ty();
        match ty.container_kind() {
            Some(ContainerKind::Array | ContainerKind::List | ContainerKind::Set) => {
                Ok(ty.element_type().map_or_else(Vec::new, |element| self.elements(dependency, &element)))
            }
            Some(ContainerKind::Optional) => match ty.element_type() {
                Some(element) => {
                    let element = element_request(dependency, element);
                    self.planned(&element).or_else(|error| {
                        if error.is_no_match() {
                            Ok(Vec::new())
                        } else {
                            Err(error)
                        }
                    })
                }
                None => Ok(Vec::new()),
            },
            Some(ContainerKind::Provider) => Ok(Vec::new()),
            None => Err(self.no_match(dependency)),
        }
    }

    /// 无匹配错误，附带忽略目标收窄时的候选
    pub(crate) fn no_match(&self, dependency: &Dependency) -> DependencyError {
        let candidates = self
            .registry
            .resources_of(dependency.instance())
            .map(ToString::to_string)
            .collect();
        DependencyError::no_match(dependency.to_string(), candidates)
    }

    fn matching<'a>(
        &'a self,
        dependency: &'a Dependency,
        ty: &'a Type,
        name: &'a Name,
    ) -> impl Iterator<Item = &'r Resource> + 'a
    where
        'r: 'a,
    {
        self.registry.candidates(ty).filter(move |resource| {
            resource.name().is_compatible_with(name)
                && resource.target().matches(dependency.sites().instances())
        })
    }
}

/// 容器元素请求：沿用名称与注入点链
pub(crate) fn element_request(dependency: &Dependency, element: Type) -> Dependency {
    let request = dependency.request(dependency.instance().with_type(element));
    if dependency.ignores_scoping() {
        request.ignoring_scopes()
    } else {
        request
    }
}

/// 元素收集使用的名称：默认名称放宽为任意名称
fn element_name(name: &Name) -> Name {
    if name.is_default() {
        Name::ANY
    } else {
        name.clone()
    }
}

fn rank(resource: &Resource, request: &Instance) -> Rank {
    Rank {
        specificity: resource.target().specificity(),
        exact_type: resource.ty().raw() == request.ty().raw(),
        exact_name: resource.name() == request.name(),
        precedence: resource.kind().precedence(),
    }
}

/// 契约绑定只能通过父类型解析，且只对边界内的消费者可见
fn is_accessible(resource: &Resource, requested: &Type, dependency: &Dependency) -> bool {
    match resource.access() {
        Access::Direct => true,
        Access::Indirect { boundary } => {
            let via_contract = resource.ty().raw() != requested.raw();
            let visible = boundary.is_all()
                || dependency
                    .consumer()
                    .is_some_and(|site| boundary.contains(site.instance().ty().raw().package()));
            via_contract && visible
        }
    }
}
