//! Centralized integration tests for warren-runtime crate
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use warren_core::{ConfigMap, ContainerSchema, DependencyError, ServiceInstance, ServiceLoader};
use warren_runtime::Container;

/// 把 JSON 对象转成配置表
fn config_map(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected JSON object"),
    }
}

/// 记录创建次数的简单加载器
fn counting_loader(name: &str, counter: Arc<AtomicUsize>) -> Arc<ServiceLoader> {
    let service_name = name.to_string();
    ServiceLoader::builder(name)
        .create(move |_ctx| {
            let counter = counter.clone();
            let service_name = service_name.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(ServiceInstance::value(service_name)))
            }
        })
        .build()
}

#[tokio::test]
async fn test_builder_resolves_schema_loaders() {
    let counter = Arc::new(AtomicUsize::new(0));
    let schema = ContainerSchema::new()
        .with_loader(counting_loader("alpha", counter.clone()))
        .with_loader(counting_loader("beta", counter.clone()));

    let container = Container::builder("app").schema(schema).build().await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(container.has_service("alpha"));
    assert!(container.has_service("beta"));
    assert_eq!(container.name(), "app");
}

#[tokio::test]
async fn test_load_service_is_idempotent() {
    let counter = Arc::new(AtomicUsize::new(0));
    let schema = ContainerSchema::new().with_loader(counting_loader("alpha", counter.clone()));

    let container = Container::builder("app")
        .schema(schema)
        .resolve_on_build(false)
        .build()
        .await
        .unwrap();

    let mut stack = Vec::new();
    container.load_service("alpha", false, &mut stack).await.unwrap();
    container.load_service("alpha", false, &mut stack).await.unwrap();

    // 第二次请求是空操作，不再触发创建
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_explicit_null_blocks_re_resolution() {
    let counter = Arc::new(AtomicUsize::new(0));
    let attempts = counter.clone();
    let loader = ServiceLoader::builder("ghost")
        .create(move |_ctx| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                // 返回空缺，被归一化为显式空值
                Ok(None)
            }
        })
        .build();

    let container = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(loader))
        .build()
        .await
        .unwrap();

    // 显式空值算已解析：查找未命中，但重新加载是空操作
    assert!(container.has_service("ghost"));
    assert!(container.get("ghost").is_none());

    let mut stack = Vec::new();
    container.load_service("ghost", false, &mut stack).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dependency_stack_restored() {
    let counter = Arc::new(AtomicUsize::new(0));
    let schema = ContainerSchema::new().with_loader(counting_loader("plain", counter));

    let container = Container::builder("app")
        .schema(schema)
        .resolve_on_build(false)
        .build()
        .await
        .unwrap();

    // 无依赖的解析不动依赖栈：调用方给的内容原样保留
    let mut stack = vec!["sentinel".to_string()];
    container.load_service("plain", false, &mut stack).await.unwrap();
    assert_eq!(stack, vec!["sentinel".to_string()]);
}

#[tokio::test]
async fn test_dependencies_resolved_in_declaration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let make_loader = |name: &str, requires: Vec<&str>| {
        let order = order.clone();
        let service_name = name.to_string();
        let mut builder = ServiceLoader::builder(name);
        if !requires.is_empty() {
            builder = builder.requires(requires);
        }
        builder
            .create(move |_ctx| {
                let order = order.clone();
                let service_name = service_name.clone();
                async move {
                    order.lock().unwrap().push(service_name.clone());
                    Ok(Some(ServiceInstance::value(service_name)))
                }
            })
            .build()
    };

    let schema = ContainerSchema::new()
        .with_loader(make_loader("web", vec!["config", "db"]))
        .with_loader(make_loader("db", vec!["config"]))
        .with_loader(make_loader("config", vec![]));

    let container = Container::builder("app").schema(schema).build().await.unwrap();

    // 深度优先、声明顺序：config -> db -> web
    assert_eq!(
        *order.lock().unwrap(),
        vec!["config".to_string(), "db".to_string(), "web".to_string()]
    );
    assert!(container.has_service("web"));
}

#[tokio::test]
async fn test_circular_dependency_fails_before_creation() {
    let created = Arc::new(AtomicUsize::new(0));

    let make_loader = |name: &str, requires: &str| {
        let created = created.clone();
        ServiceLoader::builder(name)
            .requires(requires)
            .create(move |_ctx| {
                let created = created.clone();
                async move {
                    created.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(ServiceInstance::value(())))
                }
            })
            .build()
    };

    let schema = ContainerSchema::new()
        .with_loader(make_loader("s1", "s2"))
        .with_loader(make_loader("s2", "s1"));

    let error = Container::builder("app")
        .schema(schema)
        .build()
        .await
        .unwrap_err();

    // 循环错误同时点名两个服务，且发生在任何创建函数执行之前
    match &error {
        DependencyError::CircularDependency { service, dependency } => {
            assert_eq!(service, "s1");
            assert_eq!(dependency, "s2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_loader_fails() {
    let loader = ServiceLoader::builder("app_service")
        .requires("nowhere")
        .create(|_ctx| async { Ok(Some(ServiceInstance::value(()))) })
        .build();

    let error = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(loader))
        .build()
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DependencyError::LoaderNotFound { service } if service == "nowhere"
    ));
}

#[tokio::test]
async fn test_missing_create_capability_fails() {
    let loader = ServiceLoader::builder("hollow").build();

    let error = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(loader))
        .build()
        .await
        .unwrap_err();

    assert!(matches!(error, DependencyError::CapabilityNotFound { .. }));
}

#[tokio::test]
async fn test_lookup_misses_return_none() {
    let container = Container::builder("app").build().await.unwrap();

    // 未解析的服务、不存在的作用域、不合法的引用都宽松返回 None
    assert!(container.get("foo").is_none());
    assert!(container.get("foo@bar").is_none());
    assert!(container.get("Not A Reference").is_none());
}

#[tokio::test]
async fn test_lookup_scopes_parent_and_sibling() {
    let cfg_loader = ServiceLoader::builder("cfg")
        .create(|_ctx| async { Ok(Some(ServiceInstance::value("root-cfg"))) })
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(cfg_loader))
        .build()
        .await
        .unwrap();

    let worker_a = root.fork(None, "worker_a", None).await.unwrap();
    let _worker_b = root.fork(None, "worker_b", None).await.unwrap();

    // 作用域等于父容器名 -> 父容器的服务表
    assert!(worker_a.get("cfg@app").is_some());
    // 兄弟容器作用域
    assert!(worker_a.get("cfg@worker_b").is_some());
    // 不存在的兄弟
    assert!(worker_a.get("cfg@worker_c").is_none());
    // 根容器没有父容器，作用域查找必然未命中
    assert!(root.get("cfg@app").is_none());
}

#[tokio::test]
async fn test_lookup_invokes_callable_with_param() {
    let registry_loader = ServiceLoader::builder("registry")
        .create(|_ctx| async {
            Ok(Some(ServiceInstance::callable(|args| {
                let key = args.first()?.clone().downcast::<String>().ok()?;
                Some(ServiceInstance::value(format!("value-of-{key}")))
            })))
        })
        .build();

    let container = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(registry_loader))
        .build()
        .await
        .unwrap();

    // 带参数段的引用把找到的服务当作可调用对象
    let result = container.get("registry:feature.flag").unwrap();
    assert_eq!(
        result.downcast::<String>().map(|v| (*v).clone()),
        Some("value-of-feature.flag".to_string())
    );

    // 非可调用实例带参调用宽松返回 None
    let plain_loader = ServiceLoader::builder("plain")
        .create(|_ctx| async { Ok(Some(ServiceInstance::value(1u8))) })
        .build();
    let other = Container::builder("other")
        .schema(ContainerSchema::new().with_loader(plain_loader))
        .build()
        .await
        .unwrap();
    assert!(other.get("plain:anything").is_none());
}

#[tokio::test]
async fn test_fork_creates_dependencies_with_defaulted_config() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let seen_config = Arc::new(Mutex::new(None));

    let order_a = order.clone();
    let loader_a = ServiceLoader::builder("a")
        .requires("b")
        .create(move |_ctx| {
            let order = order_a.clone();
            async move {
                order.lock().unwrap().push("a".to_string());
                Ok(Some(ServiceInstance::value("a")))
            }
        })
        .build();

    let order_b = order.clone();
    let seen = seen_config.clone();
    let loader_b = ServiceLoader::builder("b")
        .create(move |ctx| {
            let order = order_b.clone();
            let seen = seen.clone();
            async move {
                order.lock().unwrap().push("b".to_string());
                *seen.lock().unwrap() = ctx.config_value("x").cloned();
                Ok(Some(ServiceInstance::value("b")))
            }
        })
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(loader_a).with_loader(loader_b))
        .resolve_on_build(false)
        .build()
        .await
        .unwrap();

    let override_schema = ContainerSchema::new().with_config("b", json!({ "x": 1 }));
    let child = root.fork(Some(override_schema), "child", None).await.unwrap();

    // b 先于 a 创建，且拿到缺省合并后的配置
    assert_eq!(*order.lock().unwrap(), vec!["b".to_string(), "a".to_string()]);
    assert_eq!(*seen_config.lock().unwrap(), Some(json!(1)));
    assert!(child.has_service("a"));
    assert!(child.has_service("b"));
}

#[tokio::test]
async fn test_fork_inherit_reuses_parent_instance() {
    let pool_loader = ServiceLoader::builder("pool")
        .create(|_ctx| async { Ok(Some(ServiceInstance::value("shared-pool".to_string()))) })
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(pool_loader))
        .build()
        .await
        .unwrap();

    let child = root.fork(None, "request", None).await.unwrap();

    // 未声明分叉行为：父容器的实例原样复用
    let parent_value = root.get_as::<String>("pool").unwrap();
    let child_value = child.get_as::<String>("pool").unwrap();
    assert!(Arc::ptr_eq(&parent_value, &child_value));
}

#[tokio::test]
async fn test_fork_skip_leaves_service_unset() {
    let counter = Arc::new(AtomicUsize::new(0));
    let created = counter.clone();
    let session_loader = ServiceLoader::builder("session")
        .create(move |_ctx| {
            let created = created.clone();
            async move {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(Some(ServiceInstance::value("session")))
            }
        })
        .fork_skip()
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(session_loader))
        .resolve_on_build(false)
        .build()
        .await
        .unwrap();

    let child = root.fork(None, "request", None).await.unwrap();

    // 分叉跳过创建：既不是实例也不是显式空值，而是完全未设置
    assert!(!child.has_service("session"));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    // 未设置不同于显式空值：之后的普通加载仍会正常创建
    let mut stack = Vec::new();
    child.load_service("session", false, &mut stack).await.unwrap();
    assert!(child.has_service("session"));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fork_handler_used_in_fork_mode_only() {
    let fork_calls = Arc::new(AtomicUsize::new(0));
    let create_calls = Arc::new(AtomicUsize::new(0));

    let forks = fork_calls.clone();
    let creates = create_calls.clone();
    let loader = ServiceLoader::builder("conn")
        .create(move |_ctx| {
            let creates = creates.clone();
            async move {
                creates.fetch_add(1, Ordering::SeqCst);
                Ok(Some(ServiceInstance::value("created")))
            }
        })
        .fork_handler(move |_ctx| {
            let forks = forks.clone();
            async move {
                forks.fetch_add(1, Ordering::SeqCst);
                Ok(Some(ServiceInstance::value("forked")))
            }
        })
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(loader))
        .build()
        .await
        .unwrap();
    let child = root.fork(None, "request", None).await.unwrap();

    assert_eq!(create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fork_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        child.get_as::<&str>("conn").map(|v| *v),
        Some("forked")
    );
}

#[tokio::test]
async fn test_fork_create_shape_forces_create() {
    let create_calls = Arc::new(AtomicUsize::new(0));
    let creates = create_calls.clone();
    let loader = ServiceLoader::builder("stateless")
        .create(move |_ctx| {
            let creates = creates.clone();
            async move {
                creates.fetch_add(1, Ordering::SeqCst);
                Ok(Some(ServiceInstance::value("fresh")))
            }
        })
        .fork_create()
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(loader))
        .build()
        .await
        .unwrap();
    let _child = root.fork(None, "request", None).await.unwrap();

    // 布尔真形态：分叉时也走 create，而不是继承父实例
    assert_eq!(create_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refork_accumulates_overrides() {
    let base = counting_loader("base", Arc::new(AtomicUsize::new(0)));
    let extra1 = counting_loader("extra1", Arc::new(AtomicUsize::new(0)));
    let extra2 = counting_loader("extra2", Arc::new(AtomicUsize::new(0)));

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(base))
        .build()
        .await
        .unwrap();

    let s1 = ContainerSchema::new()
        .with_loader(extra1)
        .with_config("extra1", json!({ "from": "s1" }));
    let s2 = ContainerSchema::new().with_loader(extra2);

    // 链式再分叉同名容器：覆盖是累积的，不是只剩最后一次
    let first = root.fork(Some(s1), "x", None).await.unwrap();
    let second = first.fork(Some(s2), "x", None).await.unwrap();

    assert!(second.has_service("base"));
    assert!(second.has_service("extra1"));
    assert!(second.has_service("extra2"));
}

#[tokio::test]
async fn test_fork_merges_preregistered_child_schema() {
    let base = counting_loader("base", Arc::new(AtomicUsize::new(0)));
    let preset = counting_loader("preset", Arc::new(AtomicUsize::new(0)));

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(base))
        .child_schema("jobs", ContainerSchema::new().with_loader(preset))
        .build()
        .await
        .unwrap();

    let child = root.fork(None, "jobs", None).await.unwrap();

    // 预注册的子模式参与合并
    assert!(child.has_service("base"));
    assert!(child.has_service("preset"));
}

#[tokio::test]
async fn test_fork_failure_leaves_child_registered() {
    let good = counting_loader("good", Arc::new(AtomicUsize::new(0)));
    let bad = ServiceLoader::builder("bad")
        .fork_create()
        .create(|_ctx| async { Err("boom".into()) })
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(good).with_loader(bad))
        .resolve_on_build(false)
        .build()
        .await
        .unwrap();

    let error = root.fork(None, "child", None).await.unwrap_err();
    assert!(matches!(error, DependencyError::CreationFailed { .. }));

    // 尽力而为：失败的子容器仍注册在父容器中，已解析的服务保留
    let child = root.child("child").unwrap();
    assert!(child.has_service("good"));
    assert!(!child.has_service("bad"));
}

#[tokio::test]
async fn test_fork_overwrites_prior_child_registration() {
    let root = Container::builder("app").build().await.unwrap();

    let first = root.fork(None, "twin", None).await.unwrap();
    let second = root
        .fork(None, "twin", Some(config_map(json!({ "generation": 2 }))))
        .await
        .unwrap();

    // 同名分叉顶替父容器中的旧注册
    let registered = root.child("twin").unwrap();
    assert_eq!(
        registered.options().get("generation"),
        Some(&json!(2))
    );
    assert_eq!(second.options().get("generation"), Some(&json!(2)));
    // 旧句柄依然有效，只是不再被父容器引用
    assert_eq!(first.name(), "twin");
}

#[tokio::test]
async fn test_log_callback_inherited_by_forks() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();

    let loader = ServiceLoader::builder("svc")
        .create(|_ctx| async { Ok(Some(ServiceInstance::value(()))) })
        .fork_create()
        .build();

    let root = Container::builder("app")
        .schema(ContainerSchema::new().with_loader(loader))
        .log(move |line| sink.lock().unwrap().push(line.to_string()))
        .build()
        .await
        .unwrap();
    let _child = root.fork(None, "request", None).await.unwrap();

    let lines = lines.lock().unwrap();
    assert!(lines.iter().any(|line| line.contains("\"app\"")));
    assert!(lines.iter().any(|line| line.contains("\"request\"")));
    assert!(lines.iter().all(|line| line.contains("\"svc\"")));
}

#[tokio::test]
async fn test_schema_config_defaults_into_loader_config() {
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();

    let loader = ServiceLoader::builder("db")
        .config(json!({ "host": "localhost", "pool": { "min": 1, "max": 4 } }))
        .create(move |ctx| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = Some(Value::Object(ctx.config().clone()));
                Ok(Some(ServiceInstance::value(())))
            }
        })
        .build();

    let schema = ContainerSchema::new()
        .with_loader(loader)
        .with_config("db", json!({ "host": "db.internal", "pool": { "max": 16 } }));

    let _container = Container::builder("app").schema(schema).build().await.unwrap();

    // 模式条目的值优先，加载器默认值填充空缺（深层）
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some(json!({ "host": "db.internal", "pool": { "max": 16, "min": 1 } }))
    );
}

#[tokio::test]
async fn test_context_exposes_container_lookup() {
    let config_loader = ServiceLoader::builder("config")
        .create(|_ctx| async { Ok(Some(ServiceInstance::value("cfg-value".to_string()))) })
        .build();

    let consumer_loader = ServiceLoader::builder("consumer")
        .requires("config")
        .create(|ctx| async move {
            // 依赖已先行解析，工厂可以直接查找
            let config = ctx
                .container()
                .lookup("config", &[])
                .and_then(|instance| instance.downcast::<String>())
                .map(|value| (*value).clone())
                .unwrap_or_default();
            Ok(Some(ServiceInstance::value(format!("consumer({config})"))))
        })
        .build();

    let container = Container::builder("app")
        .schema(
            ContainerSchema::new()
                .with_loader(config_loader)
                .with_loader(consumer_loader),
        )
        .build()
        .await
        .unwrap();

    assert_eq!(
        container.get_as::<String>("consumer").map(|v| (*v).clone()),
        Some("consumer(cfg-value)".to_string())
    );
}
