//! 作用域实现
//!
//! 持久作用域使用至多写一次的缓存：并发构造同一资源时只有一个实例被保留，
//! 其余构造结果直接丢弃。线程和工作单元作用域的缓存区域由 [`ScopeController`] 拥有，
//! 可以在线程之间移交。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use di_abstractions::{AnyInstance, Instance, Scope, ScopeKey, ScopeLifeCycle};
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::debug;
use uuid::Uuid;

type Generate<'a> = &'a mut dyn FnMut() -> DependencyResult<AnyInstance>;

/// 至多写一次：生成期间不持有任何分片锁，落败的并发结果被丢弃
fn provide_cached<K: Eq + Hash>(
    cache: &DashMap<K, AnyInstance>,
    key: K,
    generate: Generate<'_>,
) -> DependencyResult<AnyInstance> {
    if let Some(existing) = cache.get(&key) {
        return Ok(existing.value().clone());
    }
    let value = generate()?;
    Ok(cache.entry(key).or_insert(value).value().clone())
}

/// 应用作用域：每个资源一个实例
pub struct ApplicationScope {
    lifecycle: ScopeLifeCycle,
    instances: DashMap<usize, AnyInstance>,
}

impl ApplicationScope {
    /// 创建应用作用域
    pub fn new() -> Self {
        Self::with_lifecycle(ScopeLifeCycle::application())
    }

    /// 以自定义的持久生命周期创建
    pub fn with_lifecycle(lifecycle: ScopeLifeCycle) -> Self {
        Self {
            lifecycle,
            instances: DashMap::new(),
        }
    }
}

impl Default for ApplicationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for ApplicationScope {
    fn lifecycle(&self) -> &ScopeLifeCycle {
        &self.lifecycle
    }

    fn provide(&self, key: &ScopeKey<'_>, generate: Generate<'_>) -> DependencyResult<AnyInstance> {
        provide_cached(&self.instances, key.serial, generate)
    }
}

/// 注入作用域：每次注入都新建
pub struct InjectionScope {
    lifecycle: ScopeLifeCycle,
}

impl InjectionScope {
    /// 创建注入作用域
    pub fn new() -> Self {
        Self {
            lifecycle: ScopeLifeCycle::injection(),
        }
    }
}

impl Default for InjectionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for InjectionScope {
    fn lifecycle(&self) -> &ScopeLifeCycle {
        &self.lifecycle
    }

    fn provide(&self, _: &ScopeKey<'_>, generate: Generate<'_>) -> DependencyResult<AnyInstance> {
        generate()
    }
}

/// 依赖类型作用域：每个资源的每种被请求实例一个实例
pub struct DependencyScope {
    lifecycle: ScopeLifeCycle,
    instances: DashMap<(usize, Instance), AnyInstance>,
}

impl DependencyScope {
    /// 创建依赖类型作用域
    pub fn new() -> Self {
        Self {
            lifecycle: ScopeLifeCycle::dependency_type(),
            instances: DashMap::new(),
        }
    }
}

impl Default for DependencyScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for DependencyScope {
    fn lifecycle(&self) -> &ScopeLifeCycle {
        &self.lifecycle
    }

    fn provide(&self, key: &ScopeKey<'_>, generate: Generate<'_>) -> DependencyResult<AnyInstance> {
        provide_cached(
            &self.instances,
            (key.serial, key.request.instance().clone()),
            generate,
        )
    }
}

/// 目标实例作用域：每个资源的每个直接消费者一个实例
pub struct TargetInstanceScope {
    lifecycle: ScopeLifeCycle,
    instances: DashMap<(usize, Option<Instance>), AnyInstance>,
}

impl TargetInstanceScope {
    /// 创建目标实例作用域
    pub fn new() -> Self {
        Self {
            lifecycle: ScopeLifeCycle::target_instance(),
            instances: DashMap::new(),
        }
    }
}

impl Default for TargetInstanceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for TargetInstanceScope {
    fn lifecycle(&self) -> &ScopeLifeCycle {
        &self.lifecycle
    }

    fn provide(&self, key: &ScopeKey<'_>, generate: Generate<'_>) -> DependencyResult<AnyInstance> {
        let consumer = key.request.consumer().map(|site| site.instance().clone());
        provide_cached(&self.instances, (key.serial, consumer), generate)
    }
}

/// 缓存区域：一次 `allocate` 到对应 `deallocate` 之间存活
pub struct ScopeRegion {
    id: Uuid,
    created_at: DateTime<Utc>,
    closed: AtomicBool,
    instances: DashMap<usize, AnyInstance>,
}

impl ScopeRegion {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            closed: AtomicBool::new(false),
            instances: DashMap::new(),
        }
    }

    /// 区域标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 区域创建时间
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 区域是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 已缓存的实例数
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// 是否没有缓存实例
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.instances.clear();
    }

    fn provide(
        &self,
        scope: &ScopeLifeCycle,
        serial: usize,
        generate: Generate<'_>,
    ) -> DependencyResult<AnyInstance> {
        if self.is_closed() {
            return Err(DependencyError::ScopeNotAllocated {
                scope: scope.to_string(),
            });
        }
        provide_cached(&self.instances, serial, generate)
    }
}

#[derive(Default)]
struct ControllerState {
    depth: usize,
    region: Option<Arc<ScopeRegion>>,
}

type ThreadControllers = DashMap<ThreadId, Arc<ScopeController>>;

/// 线程控制器在所属线程作用域中的登记位置
struct ThreadRegistration {
    controllers: Weak<ThreadControllers>,
    thread: ThreadId,
    this: Weak<ScopeController>,
}

impl ThreadRegistration {
    fn register(&self) {
        if let (Some(controllers), Some(this)) = (self.controllers.upgrade(), self.this.upgrade()) {
            controllers.insert(self.thread, this);
        }
    }

    fn release(&self) {
        if let Some(controllers) = self.controllers.upgrade() {
            controllers.remove_if(&self.thread, |_, controller| {
                Arc::as_ptr(controller) == self.this.as_ptr()
            });
        }
    }
}

/// 作用域控制器
///
/// `allocate` 与 `deallocate` 可重入：只有最外层的 `allocate` 打开区域，
/// 只有与之配对的 `deallocate` 关闭区域，多余的 `deallocate` 不做任何事。
#[derive(Default)]
pub struct ScopeController {
    state: Mutex<ControllerState>,
    registration: Option<ThreadRegistration>,
}

impl ScopeController {
    /// 创建未分配区域的控制器
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开（或重入）缓存区域
    pub fn allocate(&self) {
        let opened = {
            let mut state = self.state.lock();
            state.depth += 1;
            if state.depth == 1 {
                let region = ScopeRegion::new();
                debug!("打开作用域区域: {}", region.id());
                state.region = Some(Arc::new(region));
            }
            state.depth == 1
        };
        if opened {
            if let Some(registration) = &self.registration {
                registration.register();
            }
        }
    }

    /// 退出一层，最外层退出时关闭区域
    pub fn deallocate(&self) {
        let closed = {
            let mut state = self.state.lock();
            if state.depth == 0 {
                return;
            }
            state.depth -= 1;
            if state.depth > 0 {
                return;
            }
            state.region.take()
        };
        if let Some(region) = closed {
            debug!("关闭作用域区域: {}", region.id());
            region.close();
            if let Some(registration) = &self.registration {
                registration.release();
            }
        }
    }

    /// 是否已分配区域
    pub fn is_allocated(&self) -> bool {
        self.state.lock().region.is_some()
    }

    /// 当前重入深度
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    /// 当前区域
    pub fn region(&self) -> Option<Arc<ScopeRegion>> {
        self.state.lock().region.clone()
    }

    fn provide(
        &self,
        scope: &ScopeLifeCycle,
        serial: usize,
        generate: Generate<'_>,
    ) -> DependencyResult<AnyInstance> {
        let region = self.region().ok_or_else(|| DependencyError::ScopeNotAllocated {
            scope: scope.to_string(),
        })?;
        region.provide(scope, serial, generate)
    }
}

/// 线程作用域：每个线程一个控制器
///
/// 控制器只在区域分配期间登记在作用域中，最外层 `deallocate` 后即移除，
/// 结束的线程不会留下任何条目。
pub struct ThreadScope {
    lifecycle: ScopeLifeCycle,
    controllers: Arc<ThreadControllers>,
}

impl ThreadScope {
    /// 创建线程作用域
    pub fn new() -> Self {
        Self::with_lifecycle(ScopeLifeCycle::thread())
    }

    /// 以自定义生命周期创建，通常是派生自线程作用域的生命周期
    pub fn with_lifecycle(lifecycle: ScopeLifeCycle) -> Self {
        Self {
            lifecycle,
            controllers: Arc::new(DashMap::new()),
        }
    }

    /// 当前线程的控制器
    ///
    /// 已分配时返回登记中的控制器，否则返回新的控制器，它在 `allocate` 时登记为本线程的控制器。
    pub fn controller(&self) -> Arc<ScopeController> {
        let thread = thread::current().id();
        if let Some(existing) = self.controllers.get(&thread) {
            return existing.value().clone();
        }
        let controllers = Arc::downgrade(&self.controllers);
        Arc::new_cyclic(|this| ScopeController {
            state: Mutex::default(),
            registration: Some(ThreadRegistration {
                controllers,
                thread,
                this: this.clone(),
            }),
        })
    }

    /// 已分配区域的线程数
    pub fn allocated_threads(&self) -> usize {
        self.controllers.len()
    }
}

impl Default for ThreadScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for ThreadScope {
    fn lifecycle(&self) -> &ScopeLifeCycle {
        &self.lifecycle
    }

    fn provide(&self, key: &ScopeKey<'_>, generate: Generate<'_>) -> DependencyResult<AnyInstance> {
        let controller = self
            .controllers
            .get(&thread::current().id())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DependencyError::ScopeNotAllocated {
                scope: self.lifecycle.to_string(),
            })?;
        controller.provide(&self.lifecycle, key.serial, generate)
    }
}

/// 工作单元作用域
///
/// 控制器与线程无关：任何线程都可以通过 [`WorkerScope::enter`] 进入同一个控制器，
/// 同一线程上的进入可以嵌套，以最内层为准。
pub struct WorkerScope {
    lifecycle: ScopeLifeCycle,
    entered: DashMap<ThreadId, Vec<Arc<ScopeController>>>,
}

impl WorkerScope {
    /// 创建工作单元作用域
    pub fn new() -> Self {
        Self::with_lifecycle(ScopeLifeCycle::worker())
    }

    /// 以自定义生命周期创建
    pub fn with_lifecycle(lifecycle: ScopeLifeCycle) -> Self {
        Self {
            lifecycle,
            entered: DashMap::new(),
        }
    }

    /// 创建新的控制器
    pub fn controller(&self) -> Arc<ScopeController> {
        Arc::new(ScopeController::new())
    }

    /// 当前线程进入 `controller`，守卫释放时退出
    pub fn enter(&self, controller: &Arc<ScopeController>) -> WorkerGuard<'_> {
        let thread = thread::current().id();
        self.entered
            .entry(thread)
            .or_default()
            .push(controller.clone());
        WorkerGuard {
            scope: self,
            thread,
        }
    }

    fn current(&self) -> Option<Arc<ScopeController>> {
        self.entered
            .get(&thread::current().id())
            .and_then(|stack| stack.last().cloned())
    }
}

impl Default for WorkerScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for WorkerScope {
    fn lifecycle(&self) -> &ScopeLifeCycle {
        &self.lifecycle
    }

    fn provide(&self, key: &ScopeKey<'_>, generate: Generate<'_>) -> DependencyResult<AnyInstance> {
        let controller = self.current().ok_or_else(|| DependencyError::ScopeNotAllocated {
            scope: self.lifecycle.to_string(),
        })?;
        controller.provide(&self.lifecycle, key.serial, generate)
    }
}

/// 工作单元进入守卫
#[must_use = "守卫释放时即退出工作单元"]
pub struct WorkerGuard<'a> {
    scope: &'a WorkerScope,
    thread: ThreadId,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        let emptied = match self.scope.entered.get_mut(&self.thread) {
            Some(mut stack) => {
                stack.pop();
                stack.is_empty()
            }
            None => false,
        };
        if emptied {
            self.scope
                .entered
                .remove_if(&self.thread, |_, stack| stack.is_empty());
        }
    }
}
