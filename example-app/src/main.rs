//! # 示例应用程序
//!
//! 演示如何使用 Warren 服务容器：声明服务加载器、构建根容器、
//! 分叉请求作用域并进行作用域查找

use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, Level};
use warren_core::{ContainerSchema, ServiceInstance, ServiceLoader};
use warren_runtime::{value_arg, Container};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "Warren 服务容器示例应用")]
struct Args {
    /// 模拟的请求作用域数量
    #[arg(long, default_value_t = 2)]
    requests: usize,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// 应用设置服务的配置
#[derive(Debug, Clone, Deserialize)]
struct AppSettings {
    app_name: String,
    listen_port: u16,
}

/// 数据库连接池（演示用）
#[derive(Debug)]
struct DbPool {
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    info!("启动 Warren 示例应用");

    // 构建应用容器
    let container = build_application().await?;

    // 演示服务查找
    demonstrate_lookup(&container);

    // 演示请求作用域分叉
    demonstrate_forks(&container, args.requests).await?;

    info!("示例应用结束");
    Ok(())
}

/// 组装应用容器
async fn build_application() -> anyhow::Result<Container> {
    // 设置服务：把合并后的配置绑定为类型化结构
    let settings_loader = ServiceLoader::builder("settings")
        .config(json!({ "app_name": "warren-demo", "listen_port": 8080 }))
        .create(|ctx| async move {
            let settings: AppSettings = ctx.bind_config()?;
            Ok(Some(ServiceInstance::value(settings)))
        })
        .build();

    // 数据库服务：依赖设置服务，分叉时复用父容器的连接池
    let database_loader = ServiceLoader::builder("database")
        .requires("settings")
        .config(json!({ "url": "postgres://localhost/demo" }))
        .create(|ctx| async move {
            let url = ctx
                .config_value("url")
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(Some(ServiceInstance::value(DbPool { url })))
        })
        .build();

    // 问候服务：可调用对象，查找时带参数调用
    let greeter_loader = ServiceLoader::builder("greeter")
        .requires("settings")
        .create(|ctx| async move {
            let app_name = ctx
                .container()
                .lookup("settings", &[])
                .and_then(|instance| instance.downcast::<AppSettings>())
                .map(|settings| settings.app_name.clone())
                .unwrap_or_default();

            Ok(Some(ServiceInstance::callable(move |args| {
                let who = args
                    .first()
                    .and_then(|arg| arg.clone().downcast::<String>().ok())
                    .map(|name| (*name).clone())
                    .unwrap_or_else(|| "world".to_string());
                Some(ServiceInstance::value(format!("[{app_name}] 你好, {who}")))
            })))
        })
        .build();

    // 请求跟踪服务：只在分叉的请求作用域中创建
    let trace_loader = ServiceLoader::builder("trace")
        .create(|_ctx| async { Ok(None) })
        .fork_handler(|ctx| async move {
            let trace_id = format!("trace-{}", ctx.container().container_name());
            Ok(Some(ServiceInstance::value(trace_id)))
        })
        .build();

    let schema = ContainerSchema::new()
        .with_loader(settings_loader)
        .with_loader(database_loader)
        .with_loader(greeter_loader)
        .with_loader(trace_loader)
        .with_config("database", json!({ "url": "postgres://db.internal/demo" }));

    let container = Container::builder("app")
        .schema(schema)
        .log(|line| tracing::debug!("{line}"))
        .build()
        .await?;

    Ok(container)
}

/// 演示根容器中的服务查找
fn demonstrate_lookup(container: &Container) {
    if let Some(settings) = container.get_as::<AppSettings>("settings") {
        info!("应用设置: {} (端口 {})", settings.app_name, settings.listen_port);
    }

    if let Some(pool) = container.get_as::<DbPool>("database") {
        info!("数据库连接池: {}", pool.url);
    }

    // 带参调用可调用服务
    if let Some(greeting) = container
        .call("greeter", &[value_arg("warren")])
        .and_then(|instance| instance.downcast::<String>())
    {
        info!("问候: {}", greeting);
    }

    // 参数段形式的同一调用
    if let Some(greeting) = container
        .get("greeter:ops")
        .and_then(|instance| instance.downcast::<String>())
    {
        info!("问候: {}", greeting);
    }
}

/// 演示请求作用域分叉与作用域查找
async fn demonstrate_forks(container: &Container, requests: usize) -> anyhow::Result<()> {
    for index in 0..requests {
        let scope_name = format!("request_{index}");
        let fork = container
            .fork(None, &scope_name, Some(options(index)))
            .await?;

        // 连接池按引用继承自父容器
        let inherited = fork.get_as::<DbPool>("database").is_some();
        // 跟踪服务只在分叉中存在
        let trace = fork
            .get_as::<String>("trace")
            .map(|id| (*id).clone())
            .unwrap_or_default();

        info!(
            "请求作用域 {}: 继承数据库 = {}, 跟踪 = {}",
            fork.name(),
            inherited,
            trace
        );

        // 作用域查找：从分叉访问父容器的服务
        let via_parent = fork.get_as::<AppSettings>("settings@app").is_some();
        info!("通过父作用域访问设置: {}", via_parent);
    }

    Ok(())
}

/// 构造分叉选项
fn options(index: usize) -> warren_core::ConfigMap {
    match json!({ "request_index": index }) {
        serde_json::Value::Object(map) => map,
        _ => warren_core::ConfigMap::new(),
    }
}

/// 解析日志级别
fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
