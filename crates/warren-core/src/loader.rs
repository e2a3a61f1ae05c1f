//! 服务加载器定义
//!
//! 加载器是外部提供的服务描述符：声明服务名称、配置默认值、
//! 依赖列表和创建能力。描述符是不可变模板，通过 `Arc` 在多个
//! 模式与容器之间共享；每次解析时合并后的配置以快照形式传给
//! 工厂函数，不会写回描述符本身。

use crate::errors::BoxError;
use crate::provider::ServiceProvider;
use crate::schema::ConfigMap;
use crate::service::ServiceInstance;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// 默认创建能力的名称
pub const CREATE_CAPABILITY: &str = "create";

/// 分叉能力的名称
pub const FORK_CAPABILITY: &str = "fork";

/// 传递给工厂函数的解析上下文
///
/// 取代直接传递可变容器：携带容器查找句柄、服务名称和合并后的
/// 配置快照
#[derive(Clone)]
pub struct ServiceContext {
    container: Arc<dyn ServiceProvider>,
    service_name: String,
    config: ConfigMap,
}

impl ServiceContext {
    /// 创建新的解析上下文
    pub fn new(
        container: Arc<dyn ServiceProvider>,
        service_name: impl Into<String>,
        config: ConfigMap,
    ) -> Self {
        Self {
            container,
            service_name: service_name.into(),
            config,
        }
    }

    /// 所属容器的查找句柄
    pub fn container(&self) -> &Arc<dyn ServiceProvider> {
        &self.container
    }

    /// 正在解析的服务名称
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 合并后的配置快照
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// 获取单个配置项
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// 将配置快照绑定到具体类型
    pub fn bind_config<T>(&self) -> Result<T, BoxError>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_value(Value::Object(self.config.clone())).map_err(Into::into)
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("container", &self.container.container_name())
            .field("service_name", &self.service_name)
            .field("config", &self.config)
            .finish()
    }
}

/// 创建能力的返回值类型
pub type FactoryOutcome = Result<Option<ServiceInstance>, BoxError>;

/// 创建能力的装箱异步返回值
pub type FactoryFuture = BoxFuture<'static, FactoryOutcome>;

/// 服务工厂 trait
///
/// 加载器的创建能力。返回 `Ok(None)` 表示服务解析完成但刻意为空，
/// 会被归一化为容器服务表中的显式空值条目
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    /// 创建服务实例
    async fn invoke(&self, ctx: ServiceContext) -> FactoryOutcome;
}

/// Lambda 工厂包装器
///
/// 将返回装箱 future 的闭包包装为 [`ServiceFactory`]；
/// 普通异步闭包经由 [`ServiceLoaderBuilder`] 的能力方法自动装箱
pub struct LambdaFactory<F> {
    factory_fn: F,
}

impl<F> LambdaFactory<F> {
    /// 包装闭包
    pub fn new(factory_fn: F) -> Self {
        Self { factory_fn }
    }
}

#[async_trait]
impl<F> ServiceFactory for LambdaFactory<F>
where
    F: Fn(ServiceContext) -> FactoryFuture + Send + Sync,
{
    async fn invoke(&self, ctx: ServiceContext) -> FactoryOutcome {
        (self.factory_fn)(ctx).await
    }
}

/// 将普通异步闭包包装为共享的工厂对象
fn lambda<F, Fut>(factory_fn: F) -> Arc<dyn ServiceFactory>
where
    F: Fn(ServiceContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FactoryOutcome> + Send + 'static,
{
    Arc::new(LambdaFactory::new(
        move |ctx: ServiceContext| -> FactoryFuture { Box::pin(factory_fn(ctx)) },
    ))
}

/// 依赖声明
///
/// 加载器可以不声明依赖、声明单个依赖名，或声明有序依赖列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Requires {
    /// 无依赖
    #[default]
    None,
    /// 单个依赖
    One(String),
    /// 有序依赖列表
    Many(Vec<String>),
}

impl Requires {
    /// 归一化为有序依赖名切片
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::None => &[],
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }

    /// 是否声明了依赖
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for Requires {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl From<String> for Requires {
    fn from(name: String) -> Self {
        Self::One(name)
    }
}

impl From<Vec<String>> for Requires {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

impl From<Vec<&str>> for Requires {
    fn from(names: Vec<&str>) -> Self {
        Self::Many(names.into_iter().map(str::to_string).collect())
    }
}

/// 分叉行为声明
///
/// 描述在分叉容器中加载此服务时使用的创建策略
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForkBehavior {
    /// 未声明：父容器已解析该服务时复用其实例，否则调用 `create`
    #[default]
    Inherit,
    /// 强制调用 `create`
    Create,
    /// 跳过创建，服务保持未设置状态
    Skip,
    /// 调用指定名称的能力
    Capability(String),
}

/// 服务加载器描述符
///
/// 通过 [`ServiceLoader::builder`] 构建；构建后不可变
pub struct ServiceLoader {
    name: String,
    config: ConfigMap,
    requires: Requires,
    capabilities: HashMap<String, Arc<dyn ServiceFactory>>,
    fork: ForkBehavior,
}

impl ServiceLoader {
    /// 创建加载器构建器
    pub fn builder(name: impl Into<String>) -> ServiceLoaderBuilder {
        ServiceLoaderBuilder::new(name)
    }

    /// 加载器名称（即服务名称）
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 加载器声明的配置默认值
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// 依赖声明
    pub fn requires(&self) -> &Requires {
        &self.requires
    }

    /// 分叉行为
    pub fn fork(&self) -> &ForkBehavior {
        &self.fork
    }

    /// 按名称获取创建能力
    pub fn capability(&self, name: &str) -> Option<&Arc<dyn ServiceFactory>> {
        self.capabilities.get(name)
    }

    /// 是否声明了指定能力
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }
}

impl std::fmt::Debug for ServiceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceLoader")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("requires", &self.requires)
            .field(
                "capabilities",
                &self.capabilities.keys().collect::<Vec<_>>(),
            )
            .field("fork", &self.fork)
            .finish()
    }
}

/// 服务加载器构建器
pub struct ServiceLoaderBuilder {
    name: String,
    config: ConfigMap,
    requires: Requires,
    capabilities: HashMap<String, Arc<dyn ServiceFactory>>,
    fork: ForkBehavior,
}

impl ServiceLoaderBuilder {
    /// 创建新的构建器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ConfigMap::new(),
            requires: Requires::None,
            capabilities: HashMap::new(),
            fork: ForkBehavior::Inherit,
        }
    }

    /// 设置配置默认值
    ///
    /// 非对象的 JSON 值会被忽略
    pub fn config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    /// 声明依赖
    pub fn requires(mut self, requires: impl Into<Requires>) -> Self {
        self.requires = requires.into();
        self
    }

    /// 设置 `create` 能力
    pub fn create<F, Fut>(self, factory_fn: F) -> Self
    where
        F: Fn(ServiceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryOutcome> + Send + 'static,
    {
        self.capability(CREATE_CAPABILITY, factory_fn)
    }

    /// 声明分叉处理函数
    ///
    /// 等价于设置名为 `fork` 的能力并在分叉模式下调用它
    pub fn fork_handler<F, Fut>(mut self, factory_fn: F) -> Self
    where
        F: Fn(ServiceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryOutcome> + Send + 'static,
    {
        self.fork = ForkBehavior::Capability(FORK_CAPABILITY.to_string());
        self.capability(FORK_CAPABILITY, factory_fn)
    }

    /// 分叉时强制调用 `create`
    pub fn fork_create(mut self) -> Self {
        self.fork = ForkBehavior::Create;
        self
    }

    /// 分叉时跳过创建
    pub fn fork_skip(mut self) -> Self {
        self.fork = ForkBehavior::Skip;
        self
    }

    /// 分叉时调用指定名称的能力
    pub fn fork_capability(mut self, name: impl Into<String>) -> Self {
        self.fork = ForkBehavior::Capability(name.into());
        self
    }

    /// 声明命名能力
    pub fn capability<F, Fut>(mut self, name: impl Into<String>, factory_fn: F) -> Self
    where
        F: Fn(ServiceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryOutcome> + Send + 'static,
    {
        self.capabilities.insert(name.into(), lambda(factory_fn));
        self
    }

    /// 完成构建
    ///
    /// `create` 能力的存在性在解析时检查，而不是在这里
    pub fn build(self) -> Arc<ServiceLoader> {
        Arc::new(ServiceLoader {
            name: self.name,
            config: self.config,
            requires: self.requires,
            capabilities: self.capabilities,
            fork: self.fork,
        })
    }
}
