//! # Warren Core
//!
//! 这个 crate 提供了 Warren 服务容器的核心数据模型和抽象接口。
//!
//! ## 核心组件
//!
//! - [`ContainerSchema`] - 容器模式：加载器列表与服务配置
//! - [`ServiceLoader`] - 服务加载器描述符与构建器
//! - [`ServiceFactory`] - 服务创建能力 trait
//! - [`ServiceProvider`] - 容器查找界面 trait
//! - [`ServiceInstance`] - 已解析的服务实例
//! - [`DependencyError`] - 依赖解析错误类型
//!
//! ## 设计原则
//!
//! - 加载器描述符是不可变模板，通过 `Arc` 跨容器共享
//! - 异步优先：创建能力是可以任意挂起的异步函数
//! - 解析失败立即失败，查找未命中宽松返回
//! - 基于 `serde_json` 值的无模式配置

pub mod errors;
pub mod loader;
pub mod provider;
pub mod schema;
pub mod service;

pub use errors::*;
pub use loader::*;
pub use provider::*;
pub use schema::*;
pub use service::*;
