//! 构造前校验
//!
//! 在生成器运行之前沿声明的构造参数遍历依赖图，检查作用域一致性和循环依赖。
//! 使用显式栈而非递归，任意长度的依赖链都不会耗尽线程栈。成功结果按
//! (资源, 影响选择的注入点前缀, 是否跳过作用域检查) 记忆。

use crate::registry::Resource;
use crate::resolution::Resolution;
use dashmap::DashSet;
use di_abstractions::{Dependency, Instance, ScopeLifeCycle};
use infrastructure_common::{DependencyError, DependencyResult};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VerifiedKey {
    serial: usize,
    sites: Vec<Instance>,
    ignore_scoping: bool,
}

impl VerifiedKey {
    fn new(resource: &Resource, dependency: &Dependency, site_depth: usize) -> Self {
        Self {
            serial: resource.serial(),
            sites: dependency.sites().instances().take(site_depth).cloned().collect(),
            ignore_scoping: dependency.ignores_scoping(),
        }
    }
}

struct Frame<'r> {
    resource: &'r Resource,
    key: VerifiedKey,
    edges: Vec<(&'r Resource, Dependency)>,
    next: usize,
}

/// 构造前校验器
pub(crate) struct Verifier {
    verified: DashSet<VerifiedKey>,
    site_depth: usize,
}

impl Verifier {
    pub(crate) fn new(site_depth: usize) -> Self {
        Self {
            verified: DashSet::new(),
            site_depth,
        }
    }

    /// 校验 `root` 在 `dependency` 请求下的整个构造参数子图
    pub(crate) fn verify<'r>(
        &self,
        resolution: &Resolution<'r>,
        root: &'r Resource,
        dependency: &Dependency,
    ) -> DependencyResult<()> {
        let key = VerifiedKey::new(root, dependency, self.site_depth);
        if self.verified.contains(&key) {
            return Ok(());
        }

        let mut on_path: HashSet<usize> = HashSet::new();
        let mut stack: Vec<Frame<'r>> = Vec::new();
        on_path.insert(root.serial());
        stack.push(Frame {
            resource: root,
            key,
            edges: edges(resolution, root, &dependency.push(root.site()))?,
            next: 0,
        });

        while let Some(frame) = stack.last_mut() {
            let Some((child, request)) = frame.edges.get(frame.next).cloned() else {
                let finished = stack.pop();
                if let Some(finished) = finished {
                    on_path.remove(&finished.resource.serial());
                    self.verified.insert(finished.key);
                }
                continue;
            };
            frame.next += 1;
            let consumer = frame.resource;

            if !request.ignores_scoping() {
                check_consistency(child, consumer, consumer.lifecycle())?;
            }

            if on_path.contains(&child.serial()) {
                let mut chain: Vec<String> = stack
                    .iter()
                    .skip_while(|frame| frame.resource.serial() != child.serial())
                    .map(|frame| frame.resource.instance().to_string())
                    .collect();
                chain.push(child.instance().to_string());
                return Err(DependencyError::DependencyCycle { chain });
            }

            let key = VerifiedKey::new(child, &request, self.site_depth);
            if self.verified.contains(&key) {
                continue;
            }

            let entered = request.push(child.site());
            on_path.insert(child.serial());
            stack.push(Frame {
                resource: child,
                key,
                edges: edges(resolution, child, &entered)?,
                next: 0,
            });
        }

        debug!("构造前校验通过: {}", root);
        Ok(())
    }
}

/// 资源的每个构造参数会用到的资源及其请求
fn edges<'r>(
    resolution: &Resolution<'r>,
    resource: &'r Resource,
    entered: &Dependency,
) -> DependencyResult<Vec<(&'r Resource, Dependency)>> {
    let mut edges = Vec::new();
    for parameter in resource.generator().parameters() {
        let request = parameter.dependency(entered);
        for child in resolution.planned(&request)? {
            edges.push((child, request.clone()));
        }
    }
    Ok(edges)
}

/// 检查 `dependency` 能否注入到作用域为 `consumer_scope` 的 `consumer` 中
pub(crate) fn check_consistency(
    dependency: &Resource,
    consumer: impl std::fmt::Display,
    consumer_scope: &ScopeLifeCycle,
) -> DependencyResult<()> {
    if dependency.lifecycle().is_consistent_in(consumer_scope) {
        return Ok(());
    }
    Err(DependencyError::UnstableDependency {
        dependency: dependency.instance().to_string(),
        dependency_scope: dependency.lifecycle().to_string(),
        consumer: consumer.to_string(),
        consumer_scope: consumer_scope.to_string(),
    })
}
