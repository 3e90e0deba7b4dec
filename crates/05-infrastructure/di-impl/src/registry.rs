//! 资源注册表
//!
//! 由有序的绑定描述列表一次性构建，构建后只读。构建时校验定位器唯一性、
//! 处理声明覆盖、校验同名原始类型一致，并按原始类型建立索引。

use di_abstractions::{
    Access, BindingDescriptor, DeclarationKind, Generator, Instance, InjectionSite, Locator,
    Name, RawType, Scope, ScopeLifeCycle, Target, Type,
};
use infrastructure_common::{DependencyError, DependencyResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 资源：注册表中的一条绑定
pub struct Resource {
    serial: usize,
    locator: Locator,
    generator: Arc<dyn Generator>,
    scope: Arc<dyn Scope>,
    kind: DeclarationKind,
    source: String,
    access: Access,
}

impl Resource {
    /// 声明序号，即在注册表中的位置
    pub fn serial(&self) -> usize {
        self.serial
    }

    /// 资源定位
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// 资源绑定的实例
    pub fn instance(&self) -> &Instance {
        self.locator.instance()
    }

    /// 资源类型
    pub fn ty(&self) -> &Type {
        self.locator.ty()
    }

    /// 资源名称
    pub fn name(&self) -> &Name {
        self.locator.name()
    }

    /// 注入目标
    pub fn target(&self) -> &Target {
        self.locator.target()
    }

    /// 生成器
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// 所属作用域
    pub fn scope(&self) -> &Arc<dyn Scope> {
        &self.scope
    }

    /// 作用域生命周期
    pub fn lifecycle(&self) -> &ScopeLifeCycle {
        self.scope.lifecycle()
    }

    /// 声明方式
    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    /// 声明来源
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 访问限制
    pub fn access(&self) -> &Access {
        &self.access
    }

    /// 以本资源为消费者的注入点
    pub fn site(&self) -> InjectionSite {
        InjectionSite::resource(self.instance().clone(), self.serial, self.lifecycle().clone())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}, {}, 来自 {})",
            self.serial,
            self.locator,
            self.kind,
            self.lifecycle(),
            self.source
        )
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 资源注册表
pub struct Registry {
    resources: Vec<Resource>,
    index: HashMap<(RawType, u8), Vec<usize>>,
    site_depth: usize,
}

impl Registry {
    /// 构建注册表
    ///
    /// `scopes` 按名称提供描述中引用的作用域。
    pub fn build(
        descriptors: Vec<BindingDescriptor>,
        scopes: &HashMap<String, Arc<dyn Scope>>,
        validate_parameters: bool,
    ) -> DependencyResult<Self> {
        check_raw_types(&descriptors)?;
        let kept = supersede(descriptors)?;

        let resources = kept
            .into_iter()
            .enumerate()
            .map(|(serial, descriptor)| {
                let scope = scopes.get(descriptor.scope_name()).cloned().ok_or_else(|| {
                    DependencyError::inconsistent(format!(
                        "未知作用域 {}: {}",
                        descriptor.scope_name(),
                        descriptor.locator()
                    ))
                })?;
                Ok(Resource {
                    serial,
                    locator: descriptor.locator().clone(),
                    generator: descriptor.generator().clone(),
                    scope,
                    kind: descriptor.declaration_kind(),
                    source: descriptor.source_name().to_string(),
                    access: descriptor.access().clone(),
                })
            })
            .collect::<DependencyResult<Vec<_>>>()?;

        let mut index: HashMap<(RawType, u8), Vec<usize>> = HashMap::new();
        let mut site_depth = 0;
        for resource in &resources {
            let dimensions = resource.ty().dimensions();
            index
                .entry((resource.ty().raw().clone(), dimensions))
                .or_default()
                .push(resource.serial);
            for supertype in resource.ty().raw().closure() {
                index
                    .entry((supertype.raw().clone(), dimensions))
                    .or_default()
                    .push(resource.serial);
            }
            let target = resource.target();
            let depth = target.parents().len() + usize::from(!target.packages().is_all());
            site_depth = site_depth.max(depth);
        }

        let registry = Self {
            resources,
            index,
            site_depth,
        };
        if validate_parameters {
            registry.validate_parameters()?;
        }
        debug!("注册表构建完成: {} 个资源", registry.len());
        Ok(registry)
    }

    fn validate_parameters(&self) -> DependencyResult<()> {
        for resource in &self.resources {
            for parameter in resource.generator().parameters() {
                let ty = parameter.instance().ty();
                if ty.has_variables() {
                    return Err(DependencyError::inconsistent(format!(
                        "参数排列不合法: {resource} 的参数 {} 含有未代入的类型变量",
                        parameter.instance()
                    )));
                }
                if ty.container_kind().is_some() {
                    continue;
                }
                if self.resources_of(parameter.instance()).next().is_none() {
                    return Err(DependencyError::inconsistent(format!(
                        "无法解析的必需绑定: {resource} 需要 {}",
                        parameter.instance()
                    )));
                }
            }
        }
        Ok(())
    }

    /// 资源数量
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// 是否没有资源
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// 按声明顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.resources.iter()
    }

    /// 按序号获取
    pub fn get(&self, serial: usize) -> Option<&Resource> {
        self.resources.get(serial)
    }

    /// 类型可赋值给 `ty` 的资源，按声明顺序
    pub fn candidates<'a, 't>(&'a self, ty: &'t Type) -> Box<dyn Iterator<Item = &'a Resource> + 't>
    where
        'a: 't,
    {
        if ty.raw().is_any() {
            return Box::new(
                self.resources
                    .iter()
                    .filter(move |resource| resource.ty().is_assignable_to(ty)),
            );
        }
        let serials = self
            .index
            .get(&(ty.raw().clone(), ty.dimensions()))
            .map_or(&[][..], Vec::as_slice);
        Box::new(
            serials
                .iter()
                .map(move |&serial| &self.resources[serial])
                .filter(move |resource| resource.ty().is_assignable_to(ty)),
        )
    }

    /// 不考虑目标收窄时能满足 `instance` 的资源
    pub fn resources_of<'a, 't>(
        &'a self,
        instance: &'t Instance,
    ) -> impl Iterator<Item = &'a Resource> + 't
    where
        'a: 't,
    {
        self.candidates(instance.ty())
            .filter(move |resource| resource.name().is_compatible_with(instance.name()))
    }

    /// 影响候选选择的注入点链深度上限
    pub fn site_depth(&self) -> usize {
        self.site_depth
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.resources.iter()).finish()
    }
}

/// 同名原始类型必须声明一致
fn check_raw_types(descriptors: &[BindingDescriptor]) -> DependencyResult<()> {
    let mut declared: HashMap<String, RawType> = HashMap::new();
    let mut conflict: Option<String> = None;

    let mut record = |raw: &RawType| {
        if raw.is_variable() || conflict.is_some() {
            return;
        }
        match declared.get(raw.name()) {
            Some(known) if !known.same_declaration(raw) => {
                conflict = Some(raw.name().to_string());
            }
            Some(_) => {}
            None => {
                declared.insert(raw.name().to_string(), raw.clone());
            }
        }
    };

    for descriptor in descriptors {
        descriptor.locator().ty().visit_raw_types(&mut record);
        for parent in descriptor.locator().target().parents() {
            parent.ty().visit_raw_types(&mut record);
        }
        for parameter in descriptor.generator().parameters() {
            parameter.instance().ty().visit_raw_types(&mut record);
        }
    }

    match conflict {
        Some(name) => Err(DependencyError::inconsistent(format!(
            "原始类型 {name} 存在不一致的声明"
        ))),
        None => Ok(()),
    }
}

/// 处理同一定位器的重复声明：高优先级覆盖低优先级，同优先级重复即报错
fn supersede(descriptors: Vec<BindingDescriptor>) -> DependencyResult<Vec<BindingDescriptor>> {
    let mut kept: Vec<Option<BindingDescriptor>> = Vec::with_capacity(descriptors.len());
    let mut winners: HashMap<Locator, usize> = HashMap::new();

    for descriptor in descriptors {
        let kind = descriptor.declaration_kind();
        if kind.is_multi() {
            kept.push(Some(descriptor));
            continue;
        }

        let Some(&position) = winners.get(descriptor.locator()) else {
            winners.insert(descriptor.locator().clone(), kept.len());
            kept.push(Some(descriptor));
            continue;
        };

        let Some(existing) = kept[position].as_ref() else {
            continue;
        };
        let existing_precedence = existing.declaration_kind().precedence();
        if kind.precedence() == existing_precedence {
            return Err(DependencyError::inconsistent(format!(
                "重复声明 {}: 来自 {} 与 {}",
                descriptor.locator(),
                existing.source_name(),
                descriptor.source_name()
            )));
        }
        if kind.precedence() > existing_precedence {
            warn!(
                "声明被覆盖: {} ({}, 来自 {}) 被 {} 声明取代",
                existing.locator(),
                existing.declaration_kind(),
                existing.source_name(),
                kind
            );
            kept[position] = None;
            winners.insert(descriptor.locator().clone(), kept.len());
            kept.push(Some(descriptor));
        } else {
            warn!(
                "声明被覆盖: {} ({}, 来自 {}) 被 {} 声明取代",
                descriptor.locator(),
                kind,
                descriptor.source_name(),
                existing.declaration_kind()
            );
        }
    }

    Ok(kept.into_iter().flatten().collect())
}
