//! 服务提供者抽象接口
//!
//! 运行时容器句柄实现此 trait，加载器的工厂函数通过它查找
//! 已解析的服务，而不依赖具体的容器实现。

use crate::schema::ConfigMap;
use crate::service::{ServiceInstance, ServiceValue};
use std::sync::Arc;

/// 服务提供者 trait
///
/// 容器对工厂函数暴露的查找界面
pub trait ServiceProvider: Send + Sync {
    /// 容器名称
    fn container_name(&self) -> String;

    /// 容器选项
    fn options(&self) -> ConfigMap;

    /// 按引用查找服务
    ///
    /// 引用格式为 `name[@scope][:param]`，任何未命中都返回 `None`
    fn lookup(&self, reference: &str, args: &[ServiceValue]) -> Option<ServiceInstance>;

    /// 服务是否已解析（显式空值也算已解析）
    fn has_service(&self, name: &str) -> bool;
}

/// 日志回调类型
///
/// 由根容器注入，子容器按引用继承；调用方不等待返回值
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;
