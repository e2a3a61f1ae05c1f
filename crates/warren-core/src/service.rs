//! 服务实例类型定义
//!
//! 容器的服务表中存放的是已解析的服务实例。实例要么是一个任意值，
//! 要么是一个可调用对象（查找时可以带参数调用）。

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// 服务值类型
///
/// 已解析服务的值载体，与具体类型解耦
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

/// 可调用服务 trait
///
/// 查找引用带参数段时，目标服务按此 trait 被调用
pub trait ServiceCallable: Send + Sync {
    /// 以给定参数调用服务
    fn call(&self, args: &[ServiceValue]) -> Option<ServiceInstance>;
}

impl<F> ServiceCallable for F
where
    F: Fn(&[ServiceValue]) -> Option<ServiceInstance> + Send + Sync,
{
    fn call(&self, args: &[ServiceValue]) -> Option<ServiceInstance> {
        self(args)
    }
}

/// 已解析的服务实例
#[derive(Clone)]
pub enum ServiceInstance {
    /// 普通值
    Value(ServiceValue),
    /// 可调用对象
    Callable(Arc<dyn ServiceCallable>),
}

impl ServiceInstance {
    /// 从具体值创建服务实例
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::Value(Arc::new(value))
    }

    /// 从共享值创建服务实例
    pub fn shared(value: ServiceValue) -> Self {
        Self::Value(value)
    }

    /// 从闭包创建可调用服务实例
    pub fn callable<F>(func: F) -> Self
    where
        F: Fn(&[ServiceValue]) -> Option<ServiceInstance> + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(func))
    }

    /// 实例是否可调用
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    /// 以给定参数调用实例
    ///
    /// 普通值不可调用，返回 `None`
    pub fn invoke(&self, args: &[ServiceValue]) -> Option<ServiceInstance> {
        match self {
            Self::Value(_) => None,
            Self::Callable(func) => func.call(args),
        }
    }

    /// 尝试将实例向下转型为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Value(value) => value.clone().downcast::<T>().ok(),
            Self::Callable(_) => None,
        }
    }
}

impl Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("ServiceInstance::Value(..)"),
            Self::Callable(_) => f.write_str("ServiceInstance::Callable(..)"),
        }
    }
}

/// 将字符串参数包装为服务值
pub fn value_arg(arg: impl Into<String>) -> ServiceValue {
    Arc::new(arg.into())
}
