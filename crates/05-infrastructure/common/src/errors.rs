//! 错误类型定义

use std::fmt;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },

    #[error("日志初始化失败: {message}")]
    LoggingInitFailed { message: String },
}

/// 资源解析失败的具体原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// 没有任何匹配的资源
    NoMatch,
    /// 排序后仍有多个同等匹配的资源
    Ambiguous,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => f.write_str("无匹配资源"),
            Self::Ambiguous => f.write_str("匹配存在歧义"),
        }
    }
}

/// 依赖注入错误类型
///
/// 除 `InconsistentDeclaration` 只在构建解析上下文时出现外，其余均为解析期错误，
/// 原样传播给 `resolve` 的调用方。`ContextDropped` 只会由延迟提供者在上下文释放后返回。
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("声明不一致: {message}")]
    InconsistentDeclaration { message: String },

    #[error("资源解析失败 ({kind}): {request}, 候选: [{}]", .candidates.join(", "))]
    ResourceResolutionFailed {
        kind: ResolutionFailure,
        request: String,
        candidates: Vec<String>,
    },

    #[error("非法访问: {resource} 仅允许通过契约类型解析, 请求: {request}")]
    IllegalAccess { request: String, resource: String },

    #[error("检测到循环依赖: {}", .chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    #[error(
        "不稳定依赖: {dependency} (作用域 {dependency_scope}) 不能注入到 {consumer} (作用域 {consumer_scope})"
    )]
    UnstableDependency {
        dependency: String,
        dependency_scope: String,
        consumer: String,
        consumer_scope: String,
    },

    #[error("实例供给失败: {resource}, 原因: {source}")]
    SupplyFailed {
        resource: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("作用域未分配: {scope}")]
    ScopeNotAllocated { scope: String },

    #[error("解析深度超过上限 {limit}: {request}")]
    ResolutionDepthExceeded { limit: usize, request: String },

    #[error("类型不匹配: 期望 {expected}, 请求 {request}")]
    TypeMismatch { expected: String, request: String },

    #[error("解析上下文已释放: {request}")]
    ContextDropped { request: String },
}

impl DependencyError {
    /// 创建声明不一致错误
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentDeclaration {
            message: message.into(),
        }
    }

    /// 创建无匹配错误
    pub fn no_match(request: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::ResourceResolutionFailed {
            kind: ResolutionFailure::NoMatch,
            request: request.into(),
            candidates,
        }
    }

    /// 创建歧义匹配错误
    pub fn ambiguous(request: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::ResourceResolutionFailed {
            kind: ResolutionFailure::Ambiguous,
            request: request.into(),
            candidates,
        }
    }

    /// 是否为无匹配错误
    pub fn is_no_match(&self) -> bool {
        matches!(
            self,
            Self::ResourceResolutionFailed {
                kind: ResolutionFailure::NoMatch,
                ..
            }
        )
    }

    /// 是否为歧义匹配错误
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::ResourceResolutionFailed {
                kind: ResolutionFailure::Ambiguous,
                ..
            }
        )
    }

    /// 是否为循环依赖错误
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::DependencyCycle { .. })
    }

    /// 是否为不稳定依赖错误
    pub fn is_unstable(&self) -> bool {
        matches!(self, Self::UnstableDependency { .. })
    }

    /// 是否为声明不一致错误
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Self::InconsistentDeclaration { .. })
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
/// 依赖注入结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;
