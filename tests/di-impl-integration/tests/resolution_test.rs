//! 候选选择与桥接生成集成测试

use di_abstractions::{
    downcast, AnyInstance, BindingDescriptor, Constructor, DeclarationKind, Dependency, Instance,
    Package, Packages, Parameter, Provider, RawType, Resolver, ResolverExt, Supplier, Target, Type,
};
use di_impl::Injector;
use di_impl_integration_tests::types::{controller, integer, job, long, number};
use di_impl_integration_tests::{init_test_logger, value, values};
use infrastructure_common::{ContainerConfig, DependencyError, TieBreak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn integers() -> Injector {
    Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 42i32))
        .bind(BindingDescriptor::constant(Instance::of(integer()), 8i32).named("b"))
        .build()
        .unwrap()
}

#[test]
fn test_default_and_named_integers() {
    init_test_logger();
    let injector = integers();

    assert_eq!(value::<i32>(&injector, &Dependency::of(integer())).unwrap(), 42);
    assert_eq!(value::<i32>(&injector, &Dependency::named("b", integer())).unwrap(), 8);

    let all = Dependency::new(Instance::any_of(Type::array(integer())));
    assert_eq!(values::<i32>(&injector, &all).unwrap(), vec![42, 8]);

    // 默认名称的数组请求同样收集所有名称
    let array = Dependency::of(Type::array(integer()));
    assert_eq!(values::<i32>(&injector, &array).unwrap(), vec![42, 8]);
    let list = Dependency::of(Type::list(integer()));
    assert_eq!(values::<i32>(&injector, &list).unwrap(), vec![42, 8]);
}

#[test]
fn test_named_collection_only_gathers_that_name() {
    init_test_logger();
    let injector = integers();

    let named = Dependency::named("b", Type::array(integer()));
    assert_eq!(values::<i32>(&injector, &named).unwrap(), vec![8]);
}

#[test]
fn test_subtype_satisfies_supertype_request() {
    init_test_logger();
    let injector = integers();

    assert_eq!(value::<i32>(&injector, &Dependency::of(number())).unwrap(), 42);
    let numbers = Dependency::new(Instance::any_of(Type::array(number())));
    assert_eq!(values::<i32>(&injector, &numbers).unwrap(), vec![42, 8]);
}

#[test]
fn test_bridging_three_and_zero() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 1i32).multi())
        .bind(BindingDescriptor::constant(Instance::of(integer()), 2i32).multi())
        .bind(BindingDescriptor::constant(Instance::of(integer()), 3i32).multi())
        .build()
        .unwrap();
    let all = Dependency::of(Type::set(integer()));
    assert_eq!(values::<i32>(&injector, &all).unwrap(), vec![1, 2, 3]);

    let empty = Injector::builder().build().unwrap();
    let array = Dependency::of(Type::array(integer()));
    assert!(values::<i32>(&empty, &array).unwrap().is_empty());
}

#[test]
fn test_literal_container_binding_wins_over_synthesis() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 42i32))
        .bind(BindingDescriptor::constant(
            Instance::of(Type::array(integer())),
            vec![7i32, 9],
        ))
        .build()
        .unwrap();

    let array = Dependency::of(Type::array(integer()));
    assert_eq!(value::<Vec<i32>>(&injector, &array).unwrap(), vec![7, 9]);
}

#[test]
fn test_singular_binding_beats_multi_binding() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 1i32).multi())
        .bind(BindingDescriptor::constant(Instance::of(integer()), 2i32))
        .build()
        .unwrap();

    assert_eq!(value::<i32>(&injector, &Dependency::of(integer())).unwrap(), 2);
    let all = Dependency::of(Type::array(integer()));
    assert_eq!(values::<i32>(&injector, &all).unwrap(), vec![1, 2]);
}

#[test]
fn test_target_specificity() {
    init_test_logger();
    let main = Instance::named("main", controller());
    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 1i32).source("global"))
        .bind(
            BindingDescriptor::constant(Instance::of(integer()), 2i32)
                .targeted(Target::in_packages(Packages::only([Package::exactly("app::web")]))),
        )
        .bind(
            BindingDescriptor::constant(Instance::of(integer()), 3i32)
                .targeted(Target::injecting_into(main.clone())),
        )
        .build()
        .unwrap();

    let into_main = Dependency::of(integer()).injected_into(main);
    assert_eq!(value::<i32>(&injector, &into_main).unwrap(), 3);

    let into_web = Dependency::of(integer()).injected_into(Instance::of(controller()));
    assert_eq!(value::<i32>(&injector, &into_web).unwrap(), 2);

    let unrelated = Dependency::of(integer()).injected_into(Instance::of(job()));
    assert_eq!(value::<i32>(&injector, &unrelated).unwrap(), 1);
    assert_eq!(value::<i32>(&injector, &Dependency::of(integer())).unwrap(), 1);
}

#[test]
fn test_longest_parent_chain_wins() {
    init_test_logger();
    let repository = Type::named("app::data::Repository");
    let injector = Injector::builder()
        .bind(
            BindingDescriptor::constant(Instance::of(integer()), 1i32)
                .targeted(Target::injecting_into(Instance::any_of(repository.clone()))),
        )
        .bind(
            BindingDescriptor::constant(Instance::of(integer()), 2i32).targeted(
                Target::injecting_into(Instance::any_of(repository.clone()))
                    .within(Instance::any_of(controller())),
            ),
        )
        .build()
        .unwrap();

    let nested = Dependency::of(integer())
        .injected_into(Instance::of(controller()))
        .injected_into(Instance::of(repository.clone()));
    assert_eq!(value::<i32>(&injector, &nested).unwrap(), 2);

    let direct = Dependency::of(integer()).injected_into(Instance::of(repository));
    assert_eq!(value::<i32>(&injector, &direct).unwrap(), 1);

    let error = injector.resolve_dependency(&Dependency::of(integer())).unwrap_err();
    assert!(error.is_no_match());
}

#[test]
fn test_targets_follow_constructor_parameters() {
    init_test_logger();
    #[derive(Debug)]
    struct Port(i32);

    let server = Type::named("app::web::Server");
    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 80i32))
        .bind(
            BindingDescriptor::constant(Instance::of(integer()), 8080i32)
                .targeted(Target::injecting_into(Instance::any_of(server.clone()))),
        )
        .bind(BindingDescriptor::new(
            Instance::of(server.clone()),
            Constructor::new([Parameter::of(integer())], |args| {
                Ok(Arc::new(Port(*args.get::<i32>(0)?)) as AnyInstance)
            }),
        ))
        .build()
        .unwrap();

    let port = injector.resolve_instance::<Port>(Instance::of(server)).unwrap();
    assert_eq!(port.0, 8080);
    assert_eq!(value::<i32>(&injector, &Dependency::of(integer())).unwrap(), 80);
}

#[test]
fn test_upper_bound_parameters() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(
            Instance::of(Type::list(integer())),
            vec![1i32, 2],
        ))
        .build()
        .unwrap();

    let covariant = Dependency::of(Type::list(number().as_upper_bound()));
    assert_eq!(value::<Vec<i32>>(&injector, &covariant).unwrap(), vec![1, 2]);

    // List<Number> 与 List<Integer> 不兼容，转而由 Number 元素桥接生成
    let invariant = Dependency::of(Type::list(number()));
    assert!(values::<i32>(&injector, &invariant).unwrap().is_empty());
}

#[test]
fn test_optional() {
    init_test_logger();
    let empty = Injector::builder().build().unwrap();
    let request = Dependency::of(Type::optional(integer()));
    let value = downcast::<Option<AnyInstance>>(empty.resolve_dependency(&request).unwrap(), &request)
        .unwrap();
    assert!(value.is_none());

    let injector = integers();
    let value = downcast::<Option<AnyInstance>>(
        injector.resolve_dependency(&request).unwrap(),
        &request,
    )
    .unwrap();
    let inner = (*value).clone().unwrap().downcast::<i32>().unwrap();
    assert_eq!(*inner, 42);

    assert_eq!(empty.resolve_optional::<String>().unwrap(), None);
}

#[test]
fn test_optional_propagates_nested_failures() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(BindingDescriptor::new(
            Instance::of(integer()),
            Supplier::new(|_, _| Err(anyhow::anyhow!("磁盘已满"))),
        ))
        .build()
        .unwrap();

    let error = injector
        .resolve_dependency(&Dependency::of(Type::optional(integer())))
        .unwrap_err();
    assert!(matches!(error, DependencyError::SupplyFailed { .. }));
}

#[test]
fn test_provider_is_lazy() {
    init_test_logger();
    #[derive(Debug)]
    struct Session(usize);

    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let injector = Injector::builder()
        .bind(
            BindingDescriptor::new(
                Instance::of(Type::of::<Session>()),
                Supplier::new(move |_, _| {
                    let id = counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Session(id)) as AnyInstance)
                }),
            )
            .scoped("injection"),
        )
        .build()
        .unwrap();

    let provider = injector.resolve_provider::<Session>().unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let first = provider.get_as::<Session>().unwrap();
    let second = provider.get_as::<Session>().unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert_ne!(first.0, second.0);
}

#[test]
fn test_provider_parameter() {
    init_test_logger();
    struct Handler {
        sessions: Arc<Provider>,
    }

    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(Type::of::<String>()), "session".to_string()))
        .bind(BindingDescriptor::new(
            Instance::of(Type::of::<Handler>()),
            Constructor::new([Parameter::of(Type::provider(Type::of::<String>()))], |args| {
                Ok(Arc::new(Handler {
                    sessions: args.get::<Provider>(0)?,
                }) as AnyInstance)
            }),
        ))
        .build()
        .unwrap();

    let handler = injector.resolve::<Handler>().unwrap();
    assert_eq!(*handler.sessions.get_as::<String>().unwrap(), "session");
}

#[test]
fn test_provider_does_not_keep_context_alive() {
    init_test_logger();
    struct Holder {
        numbers: Arc<Provider>,
    }

    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(Type::of::<u8>()), 7u8))
        .bind(BindingDescriptor::new(
            Instance::of(Type::of::<Holder>()),
            Constructor::new([Parameter::of(Type::provider(Type::of::<u8>()))], |args| {
                Ok(Arc::new(Holder {
                    numbers: args.get::<Provider>(0)?,
                }) as AnyInstance)
            }),
        ))
        .build()
        .unwrap();

    let holder = injector.resolve::<Holder>().unwrap();
    assert_eq!(*holder.numbers.get_as::<u8>().unwrap(), 7);
    assert_eq!(Arc::strong_count(&holder), 2);

    // 应用作用域的缓存随上下文一起释放
    drop(injector);
    assert_eq!(Arc::strong_count(&holder), 1);
    let error = holder.numbers.get().unwrap_err();
    assert!(matches!(error, DependencyError::ContextDropped { .. }));
}

#[test]
fn test_indirect_access() {
    init_test_logger();
    let pool = Type::named("app::db::Pool");
    let pg_pool = Type::from_raw(RawType::named("app::db::PgPool").extends([pool.clone()]));
    let migrator = Instance::of(Type::named("app::db::Migrator"));

    let injector = Injector::builder()
        .bind(
            BindingDescriptor::constant(Instance::of(pg_pool.clone()), "postgres".to_string())
                .indirect(Packages::only([Package::with_subpackages("app::db")])),
        )
        .build()
        .unwrap();

    let via_contract = Dependency::of(pool.clone()).injected_into(migrator.clone());
    assert_eq!(value::<String>(&injector, &via_contract).unwrap(), "postgres");

    let concrete = Dependency::of(pg_pool).injected_into(migrator);
    let error = injector.resolve_dependency(&concrete).unwrap_err();
    assert!(matches!(error, DependencyError::IllegalAccess { .. }));

    let outside = Dependency::of(pool).injected_into(Instance::of(controller()));
    let error = injector.resolve_dependency(&outside).unwrap_err();
    assert!(matches!(error, DependencyError::IllegalAccess { .. }));
}

#[test]
fn test_tie_break_between_same_instance() {
    init_test_logger();
    let descriptors = || {
        [
            BindingDescriptor::constant(Instance::of(integer()), 1i32).multi(),
            BindingDescriptor::constant(Instance::of(integer()), 2i32).multi(),
        ]
    };

    let last_wins = Injector::builder().bind_all(descriptors()).build().unwrap();
    assert_eq!(value::<i32>(&last_wins, &Dependency::of(integer())).unwrap(), 2);

    let strict = Injector::builder()
        .with_config(ContainerConfig::default().with_tie_break(TieBreak::Ambiguous))
        .bind_all(descriptors())
        .build()
        .unwrap();
    let error = strict.resolve_dependency(&Dependency::of(integer())).unwrap_err();
    assert!(error.is_ambiguous());
}

#[test]
fn test_different_instances_are_ambiguous() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 1i32))
        .bind(BindingDescriptor::constant(Instance::of(long()), 2i64))
        .build()
        .unwrap();

    let error = injector.resolve_dependency(&Dependency::of(number())).unwrap_err();
    match error {
        DependencyError::ResourceResolutionFailed { candidates, .. } => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    // 精确类型优先于子类型
    assert_eq!(value::<i32>(&injector, &Dependency::of(integer())).unwrap(), 1);
}

#[test]
fn test_no_match_lists_candidates() {
    init_test_logger();
    let injector = integers();

    let error = injector
        .resolve_dependency(&Dependency::named("c", integer()))
        .unwrap_err();
    assert!(error.is_no_match());

    let error = injector
        .resolve_dependency(&Dependency::of(Type::named("app::Missing")))
        .unwrap_err();
    match error {
        DependencyError::ResourceResolutionFailed { candidates, .. } => {
            assert!(candidates.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_type_mismatch() {
    init_test_logger();
    let injector = integers();

    let error = injector
        .resolve_instance::<String>(Instance::of(integer()))
        .unwrap_err();
    assert!(matches!(error, DependencyError::TypeMismatch { .. }));
}

#[test]
fn test_supply_failure_is_wrapped() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(BindingDescriptor::new(
            Instance::of(Type::named("app::db::Connection")),
            Supplier::new(|_, _| Err(anyhow::anyhow!("连接被拒绝"))),
        ))
        .build()
        .unwrap();

    let error = injector
        .resolve_dependency(&Dependency::of(Type::named("app::db::Connection")))
        .unwrap_err();
    match error {
        DependencyError::SupplyFailed { source, .. } => {
            assert_eq!(source.to_string(), "连接被拒绝");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_declaration_precedence() {
    init_test_logger();
    let injector = Injector::builder()
        .bind(
            BindingDescriptor::constant(Instance::of(integer()), 1i32)
                .kind(DeclarationKind::Default)
                .source("defaults"),
        )
        .bind(BindingDescriptor::constant(Instance::of(integer()), 2i32).source("app"))
        .bind(
            BindingDescriptor::constant(Instance::of(integer()), 3i32)
                .kind(DeclarationKind::Implicit)
                .source("discovered"),
        )
        .build()
        .unwrap();

    assert_eq!(injector.registry().len(), 1);
    assert_eq!(value::<i32>(&injector, &Dependency::of(integer())).unwrap(), 2);
}

#[test]
fn test_duplicate_declarations_fail_in_any_order() {
    init_test_logger();
    let first = BindingDescriptor::constant(Instance::of(integer()), 1i32).source("a");
    let second = BindingDescriptor::constant(Instance::of(integer()), 2i32).source("b");

    let error = Injector::builder().bind(first).bind(second).build().unwrap_err();
    assert!(error.is_inconsistent());

    let first = BindingDescriptor::constant(Instance::of(integer()), 1i32).source("a");
    let second = BindingDescriptor::constant(Instance::of(integer()), 2i32).source("b");
    let error = Injector::builder().bind(second).bind(first).build().unwrap_err();
    assert!(error.is_inconsistent());
}

#[test]
fn test_unresolvable_parameter_fails_at_build() {
    init_test_logger();
    let error = Injector::builder()
        .bind(BindingDescriptor::new(
            Instance::of(Type::named("app::Service")),
            Constructor::new([Parameter::of(Type::named("app::Missing"))], |_| {
                Ok(Arc::new(()) as AnyInstance)
            }),
        ))
        .build()
        .unwrap_err();
    assert!(error.is_inconsistent());

    let error = Injector::builder()
        .bind(BindingDescriptor::constant(Instance::of(integer()), 1i32).scoped("request"))
        .build()
        .unwrap_err();
    assert!(error.is_inconsistent());
}
