//! 容器配置与日志初始化集成测试
//!
//! 本测试二进制不使用共享的测试日志初始化，日志系统由 `init_logging` 自己安装。

use di_abstractions::{AnyInstance, BindingDescriptor, Dependency, Instance, Resolver, Supplier, Type};
use di_impl::Injector;
use infrastructure_common::{
    init_logging, ConfigError, ContainerConfig, DependencyError, LoggingConfig, TieBreak,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn chain(len: usize) -> Vec<BindingDescriptor> {
    (0..len)
        .map(|i| {
            BindingDescriptor::new(
                Instance::of(Type::named(format!("app::chain::Link{i}"))),
                Supplier::new(move |dependency, resolver| {
                    if i + 1 == len {
                        return Ok(Arc::new(i) as AnyInstance);
                    }
                    let next = Instance::of(Type::named(format!("app::chain::Link{}", i + 1)));
                    Ok(resolver.resolve_dependency(&dependency.request(next))?)
                }),
            )
        })
        .collect()
}

#[test]
fn test_loaded_config_drives_injector() {
    let file = config_file(
        "max_resolution_depth = 4\n\
         tie_break = \"ambiguous\"\n\
         verify_before_construction = false\n",
    );
    let config = ContainerConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.max_resolution_depth, 4);
    assert_eq!(config.tie_break, TieBreak::Ambiguous);
    assert!(!config.verify_before_construction);

    let injector = Injector::builder()
        .with_config(config.clone())
        .bind_all(chain(8))
        .build()
        .unwrap();
    assert_eq!(injector.config(), &config);

    let error = injector
        .resolve_dependency(&Dependency::of(Type::named("app::chain::Link0")))
        .unwrap_err();
    assert!(matches!(
        error,
        DependencyError::ResolutionDepthExceeded { limit: 4, .. }
    ));

    let strict = Injector::builder()
        .with_config(config)
        .bind(BindingDescriptor::constant(Instance::of(Type::named("app::Port")), 1u16).multi())
        .bind(BindingDescriptor::constant(Instance::of(Type::named("app::Port")), 2u16).multi())
        .build()
        .unwrap();
    let error = strict
        .resolve_dependency(&Dependency::of(Type::named("app::Port")))
        .unwrap_err();
    assert!(error.is_ambiguous());
}

#[test]
fn test_environment_overrides_file() {
    let file = config_file("validate_parameters = true\nmax_resolution_depth = 64\n");

    // 其余测试不读取该字段
    std::env::set_var("DI_VALIDATE_PARAMETERS", "false");
    let config = ContainerConfig::load(Some(file.path()));
    std::env::remove_var("DI_VALIDATE_PARAMETERS");

    let config = config.unwrap();
    assert!(!config.validate_parameters);
    assert_eq!(config.max_resolution_depth, 64);
}

#[test]
fn test_invalid_config_files() {
    let zero = config_file("max_resolution_depth = 0\n");
    assert!(matches!(
        ContainerConfig::load(Some(zero.path())),
        Err(ConfigError::ValidationError { .. })
    ));

    let malformed = config_file("tie_break = \"coin_flip\"\n");
    assert!(matches!(
        ContainerConfig::load(Some(malformed.path())),
        Err(ConfigError::ParseError { .. })
    ));
}

#[test]
fn test_invalid_config_rejected_at_build() {
    let error = Injector::builder()
        .with_config(ContainerConfig::default().with_max_resolution_depth(0))
        .build()
        .unwrap_err();
    assert!(error.is_inconsistent());
}

#[test]
fn test_parameter_validation_can_be_disabled() {
    use di_abstractions::{Constructor, Parameter};

    let service = || {
        BindingDescriptor::new(
            Instance::of(Type::named("app::Service")),
            Constructor::new([Parameter::of(Type::named("app::Missing"))], |_| {
                Ok(Arc::new(()) as AnyInstance)
            }),
        )
    };

    let error = Injector::builder().bind(service()).build().unwrap_err();
    assert!(error.is_inconsistent());

    let injector = Injector::builder()
        .with_config(ContainerConfig::default().with_parameter_validation(false))
        .bind(service())
        .build()
        .unwrap();
    let error = injector
        .resolve_dependency(&Dependency::of(Type::named("app::Service")))
        .unwrap_err();
    assert!(error.is_no_match());
}

#[test]
fn test_logging_initialises_once() {
    assert!(init_logging(&LoggingConfig::development()).is_ok());
    assert!(matches!(
        init_logging(&LoggingConfig::production()),
        Err(ConfigError::LoggingInitFailed { .. })
    ));
}
