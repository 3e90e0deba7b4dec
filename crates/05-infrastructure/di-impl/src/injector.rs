//! 解析上下文
//!
//! [`Injector`] 是构建完成后不可变的解析上下文，克隆代价很低，可在线程间自由共享。
//! 可变状态只存在于各作用域的缓存中。

use crate::registry::{Registry, Resource};
use crate::resolution::{element_request, Resolution};
use crate::scopes::{
    ApplicationScope, DependencyScope, InjectionScope, TargetInstanceScope, ThreadScope,
    WorkerScope,
};
use crate::verification::{check_consistency, Verifier};
use di_abstractions::{
    AnyInstance, BindingDescriptor, ContainerKind, Dependency, FnLift, Lift, LiftBinding,
    Observer, ObserverBinding, Provider, Resolver, Scope, ScopeKey, ScopeLifeCycle, Type,
};
use infrastructure_common::{ContainerConfig, DependencyError, DependencyResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

struct InjectorState {
    registry: Registry,
    config: ContainerConfig,
    scopes: HashMap<String, Arc<dyn Scope>>,
    thread_scope: Arc<ThreadScope>,
    worker_scope: Arc<WorkerScope>,
    lifts: Vec<LiftBinding>,
    observers: Vec<ObserverBinding>,
    verifier: Verifier,
}

/// 解析上下文
#[derive(Clone)]
pub struct Injector {
    state: Arc<InjectorState>,
}

impl Injector {
    /// 创建构建器
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    /// 资源注册表
    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.state.config
    }

    /// 按名称获取作用域
    pub fn scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.state.scopes.get(name).cloned()
    }

    /// 线程作用域，用于获取当前线程的控制器
    pub fn thread_scope(&self) -> &Arc<ThreadScope> {
        &self.state.thread_scope
    }

    /// 工作单元作用域，用于创建和进入控制器
    pub fn worker_scope(&self) -> &Arc<WorkerScope> {
        &self.state.worker_scope
    }

    /// 对所有资源做构造前校验，不构造任何实例
    pub fn verify(&self) -> DependencyResult<()> {
        let resolution = self.resolution();
        for resource in self.state.registry.iter() {
            let dependency = Dependency::new(resource.instance().clone());
            self.state.verifier.verify(&resolution, resource, &dependency)?;
        }
        info!("构造前校验完成: {} 个资源", self.state.registry.len());
        Ok(())
    }

    fn resolution(&self) -> Resolution<'_> {
        Resolution::new(&self.state.registry, self.state.config.tie_break)
    }

    fn resolve_with(&self, resolution: &Resolution<'_>, dependency: &Dependency) -> DependencyResult<AnyInstance> {
        if let Some(resource) = resolution.select(dependency)? {
            return self.produce(resolution, resource, dependency);
        }

        let ty = dependency.ty();
        match (ty.container_kind(), ty.element_type()) {
            (Some(ContainerKind::Array | ContainerKind::List | ContainerKind::Set), Some(element)) => {
                self.synthesize_collection(resolution, dependency, &element)
            }
            (Some(ContainerKind::Optional), Some(element)) => {
                let element = element_request(dependency, element);
                let value = match resolution.select(&element)? {
                    Some(resource) => Some(self.produce(resolution, resource, &element)?),
                    None if element.ty().container_kind().is_some() => {
                        Some(self.resolve_with(resolution, &element)?)
                    }
                    None => None,
                };
                Ok(Arc::new(value))
            }
            (Some(ContainerKind::Provider), Some(element)) => {
                let element = element_request(dependency, element)
                    .ignoring_scopes()
                    .detached();
                debug!("创建延迟提供者: {}", element);
                let resolver = WeakInjector {
                    state: Arc::downgrade(&self.state),
                };
                Ok(Arc::new(Provider::new(Arc::new(resolver), element)))
            }
            _ => {
                let error = resolution.no_match(dependency);
                warn!("解析失败: {}", error);
                Err(error)
            }
        }
    }

    fn synthesize_collection(
        &self,
        resolution: &Resolution<'_>,
        dependency: &Dependency,
        element: &Type,
    ) -> DependencyResult<AnyInstance> {
        let request = element_request(dependency, element.clone());
        let mut values: Vec<AnyInstance> = Vec::new();
        for resource in resolution.elements(dependency, element) {
            let value = self.produce(resolution, resource, &request)?;
            if !values.iter().any(|known| Arc::ptr_eq(known, &value)) {
                values.push(value);
            }
        }
        debug!("桥接生成 {}: {} 个元素", dependency.ty(), values.len());
        Ok(Arc::new(values))
    }

    fn produce(
        &self,
        resolution: &Resolution<'_>,
        resource: &Resource,
        dependency: &Dependency,
    ) -> DependencyResult<AnyInstance> {
        if !dependency.ignores_scoping() {
            if let Some(consumer_scope) = dependency.consumer().and_then(|site| site.scope()) {
                let consumer = dependency.consumer().map(|site| site.to_string()).unwrap_or_default();
                check_consistency(resource, consumer, consumer_scope)?;
            }
        }
        if self.state.config.verify_before_construction {
            self.state.verifier.verify(resolution, resource, dependency)?;
        }

        let entered = dependency.entering(resource.site(), self.state.config.max_resolution_depth)?;
        let key = ScopeKey {
            serial: resource.serial(),
            request: dependency,
        };
        let mut constructed: Option<AnyInstance> = None;
        let value = resource.scope().provide(&key, &mut || {
            debug!("构造实例: {}", resource);
            let value = resource.generator().generate(&entered, self)?;
            let value = self.lift(resource, value, &entered)?;
            constructed = Some(value.clone());
            Ok(value)
        })?;

        // 并发构造中落败的实例已被作用域丢弃，只通知被保留的那个
        if constructed.is_some_and(|own| Arc::ptr_eq(&own, &value)) {
            self.notify(resource, &value, &entered);
        }
        Ok(value)
    }

    /// 依次应用匹配的提升钩子
    fn lift(
        &self,
        resource: &Resource,
        mut value: AnyInstance,
        dependency: &Dependency,
    ) -> DependencyResult<AnyInstance> {
        for lift in &self.state.lifts {
            if lift.applies_to(resource.ty()) {
                value = lift.lift(value, dependency)?;
            }
        }
        Ok(value)
    }

    fn notify(&self, resource: &Resource, value: &AnyInstance, dependency: &Dependency) {
        for observer in &self.state.observers {
            if observer.applies_to(resource.ty()) {
                observer.notify(value, dependency);
            }
        }
    }
}

impl Resolver for Injector {
    fn resolve_dependency(&self, dependency: &Dependency) -> DependencyResult<AnyInstance> {
        debug!("解析: {}", dependency);
        self.resolve_with(&self.resolution(), dependency)
    }
}

/// 不延长上下文生命周期的解析句柄
///
/// 延迟提供者可能被缓存在上下文自己的作用域里，持有强引用会让上下文永远无法释放。
struct WeakInjector {
    state: Weak<InjectorState>,
}

impl Resolver for WeakInjector {
    fn resolve_dependency(&self, dependency: &Dependency) -> DependencyResult<AnyInstance> {
        let state = self
            .state
            .upgrade()
            .ok_or_else(|| DependencyError::ContextDropped {
                request: dependency.to_string(),
            })?;
        Injector { state }.resolve_dependency(dependency)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("resources", &self.state.registry.len())
            .field("config", &self.state.config)
            .finish()
    }
}

/// 解析上下文构建器
pub struct InjectorBuilder {
    config: ContainerConfig,
    descriptors: Vec<BindingDescriptor>,
    scopes: HashMap<String, Arc<dyn Scope>>,
    thread_scope: Arc<ThreadScope>,
    worker_scope: Arc<WorkerScope>,
    lifts: Vec<LiftBinding>,
    observers: Vec<ObserverBinding>,
    overridden: Vec<String>,
}

impl InjectorBuilder {
    /// 创建带内置作用域的构建器
    pub fn new() -> Self {
        let thread_scope = Arc::new(ThreadScope::new());
        let worker_scope = Arc::new(WorkerScope::new());
        let builder = Self {
            config: ContainerConfig::default(),
            descriptors: Vec::new(),
            scopes: HashMap::new(),
            thread_scope: thread_scope.clone(),
            worker_scope: worker_scope.clone(),
            lifts: Vec::new(),
            observers: Vec::new(),
            overridden: Vec::new(),
        };
        builder
            .with_scope(Arc::new(ApplicationScope::new()))
            .with_scope(Arc::new(InjectionScope::new()))
            .with_scope(Arc::new(DependencyScope::new()))
            .with_scope(Arc::new(TargetInstanceScope::new()))
            .register_scope(thread_scope)
            .register_scope(worker_scope)
    }

    /// 设置容器配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 注册作用域，同名作用域被替换
    ///
    /// 线程和工作单元作用域由上下文自己的控制器驱动，不能替换，替换会在 `build` 时报错。
    pub fn with_scope(mut self, scope: Arc<dyn Scope>) -> Self {
        let name = scope.lifecycle().name();
        if name == ScopeLifeCycle::THREAD || name == ScopeLifeCycle::WORKER {
            self.overridden.push(name.to_string());
            return self;
        }
        self.register_scope(scope)
    }

    fn register_scope(mut self, scope: Arc<dyn Scope>) -> Self {
        self.scopes.insert(scope.lifecycle().name().to_string(), scope);
        self
    }

    /// 追加绑定描述
    pub fn bind(mut self, descriptor: BindingDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// 追加多个绑定描述
    pub fn bind_all(mut self, descriptors: impl IntoIterator<Item = BindingDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// 注册提升钩子，作用于类型可赋值给 `pattern` 的资源
    pub fn lift(mut self, pattern: Type, lift: impl Lift + 'static) -> Self {
        self.lifts.push(LiftBinding::new(pattern, Arc::new(lift)));
        self
    }

    /// 以闭包注册提升钩子
    pub fn lift_fn<F>(self, pattern: Type, order: i32, lift: F) -> Self
    where
        F: Fn(AnyInstance) -> DependencyResult<AnyInstance> + Send + Sync + 'static,
    {
        self.lift(pattern, FnLift::new(order, lift))
    }

    /// 注册观察者
    pub fn observe(mut self, pattern: Type, observer: impl Observer + 'static) -> Self {
        self.observers
            .push(ObserverBinding::new(pattern, Arc::new(observer)));
        self
    }

    /// 构建解析上下文
    pub fn build(self) -> DependencyResult<Injector> {
        self.config
            .validate()
            .map_err(|error| DependencyError::inconsistent(error.to_string()))?;
        if let Some(name) = self.overridden.first() {
            return Err(DependencyError::inconsistent(format!(
                "内置作用域 {name} 不能替换"
            )));
        }

        let declared = self.descriptors.len();
        let registry = Registry::build(self.descriptors, &self.scopes, self.config.validate_parameters)?;

        let mut lifts = self.lifts;
        lifts.sort_by_key(LiftBinding::order);

        info!(
            "构建解析上下文完成: 声明 {} 个, 注册 {} 个资源, {} 个作用域, {} 个提升钩子, {} 个观察者",
            declared,
            registry.len(),
            self.scopes.len(),
            lifts.len(),
            self.observers.len()
        );

        let verifier = Verifier::new(registry.site_depth());
        Ok(Injector {
            state: Arc::new(InjectorState {
                registry,
                config: self.config,
                scopes: self.scopes,
                thread_scope: self.thread_scope,
                worker_scope: self.worker_scope,
                lifts,
                observers: self.observers,
                verifier,
            }),
        })
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
