//! 容器配置定义

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "DI";

/// 同等特异度候选之间的裁决策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// 后声明者胜出
    #[default]
    LastDeclarationWins,
    /// 视为歧义并报错
    Ambiguous,
}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 最大解析深度
    ///
    /// 构造沿线程栈递归，默认值保证满深度的链在 2 MiB 的线程栈上完成。
    /// 调大时需要相应调大解析线程的栈。
    pub max_resolution_depth: usize,
    /// 同等特异度裁决策略
    pub tie_break: TieBreak,
    /// 构造实例前是否先做作用域一致性与循环依赖校验
    pub verify_before_construction: bool,
    /// 构建时是否校验构造参数可解析
    pub validate_parameters: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 128,
            tie_break: TieBreak::default(),
            verify_before_construction: true,
            validate_parameters: true,
        }
    }
}

impl ContainerConfig {
    /// 从可选的配置文件和 `DI_` 前缀的环境变量加载配置
    ///
    /// 环境变量使用双下划线分隔层级，例如 `DI_MAX_RESOLUTION_DEPTH=64`。
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            debug!("加载容器配置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                error!("容器配置构建失败: {}", e);
                ConfigError::ParseError {
                    source: Box::new(e),
                }
            })?;

        let config: Self = settings.try_deserialize().map_err(|e| {
            error!("容器配置绑定失败: {}", e);
            ConfigError::ParseError {
                source: Box::new(e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 设置裁决策略
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// 设置是否在构造前校验
    pub fn with_verification(mut self, enabled: bool) -> Self {
        self.verify_before_construction = enabled;
        self
    }

    /// 设置是否校验构造参数
    pub fn with_parameter_validation(mut self, enabled: bool) -> Self {
        self.validate_parameters = enabled;
        self
    }
}
