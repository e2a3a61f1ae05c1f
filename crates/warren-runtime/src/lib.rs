//! # Warren Runtime
//!
//! 这个 crate 提供 Warren 服务容器的具体运行时：容器树、递归服务
//! 解析、容器分叉和作用域查找。
//!
//! ## 主要功能
//!
//! - **容器树**: 以区域方式存储的容器节点，父子关系用索引表示
//! - **服务解析**: 按声明顺序深度优先解析依赖闭包，带循环检测
//! - **容器分叉**: 模式累积合并的子容器，继承或覆盖父容器的服务
//! - **作用域查找**: `name[@scope][:param]` 引用的宽松同步查找
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use warren_core::{ContainerSchema, ServiceInstance, ServiceLoader};
//! use warren_runtime::Container;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = ContainerSchema::new().with_loader(
//!         ServiceLoader::builder("greeter")
//!             .create(|_ctx| async { Ok(Some(ServiceInstance::value("你好"))) })
//!             .build(),
//!     );
//!
//!     let container = Container::builder("app").schema(schema).build().await?;
//!     let fork = container.fork(None, "request", None).await?;
//!
//!     assert!(fork.get("greeter").is_some());
//!     assert!(fork.get("greeter@app").is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## 并发约定
//!
//! 每个容器带有一个解析守卫：顶层的 `load_service` 与 `fork` 互斥，
//! 同一容器同一时刻只有一条解析链。查找是同步的短临界区读取，不受
//! 守卫约束。创建函数不得对正在解析自己的容器再发起 `fork` 或
//! `load_service`（守卫不可重入）。

mod arena;
mod builder;
mod container;
mod fork;
mod reference;
mod resolver;

pub use arena::ContainerId;
pub use builder::ContainerBuilder;
pub use container::Container;
pub use reference::ServiceReference;

// 重新导出核心层类型
pub use warren_core::{
    defaults_deep, merge, value_arg, BoxError, ConfigMap, ContainerSchema, DependencyError,
    DependencyResult, ForkBehavior, LogCallback, Requires, ServiceContext, ServiceFactory,
    ServiceInstance, ServiceLoader, ServiceLoaderBuilder, ServiceProvider, ServiceValue,
    CREATE_CAPABILITY, FORK_CAPABILITY,
};
