//! 容器模式定义与合并
//!
//! `ContainerSchema` 描述一个容器的加载器列表和各服务的配置。
//! 合并规则：加载器按名称取并集（覆盖方优先），配置在服务名层面
//! 做浅层缺省填充（基底方优先）。

use crate::loader::ServiceLoader;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// 服务配置对象
///
/// 以 JSON 对象承载任意配置数据
pub type ConfigMap = Map<String, Value>;

/// 容器模式
///
/// 一个容器的加载器列表与各服务的配置条目
#[derive(Clone, Default)]
pub struct ContainerSchema {
    /// 服务加载器列表，按名称去重
    pub loaders: Vec<Arc<ServiceLoader>>,
    /// 服务名 -> 配置对象
    pub config: HashMap<String, ConfigMap>,
}

impl ContainerSchema {
    /// 创建空模式
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加加载器
    pub fn with_loader(mut self, loader: Arc<ServiceLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// 添加服务配置条目
    ///
    /// 非对象的 JSON 值会被忽略
    pub fn with_config(mut self, service: impl Into<String>, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config.insert(service.into(), map);
        }
        self
    }

    /// 按名称查找加载器
    pub fn find_loader(&self, name: &str) -> Option<&Arc<ServiceLoader>> {
        self.loaders.iter().find(|loader| loader.name() == name)
    }
}

impl std::fmt::Debug for ContainerSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSchema")
            .field(
                "loaders",
                &self
                    .loaders
                    .iter()
                    .map(|loader| loader.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

/// 合并两个容器模式
///
/// 纯函数，不修改输入。加载器列表按名称取并集，覆盖方定义优先，
/// 顺序为覆盖方列表在前、基底方剩余条目在后。配置在服务名层面做
/// 缺省填充：基底方已定义的服务条目保持不变，覆盖方只补充缺失的
/// 服务条目。该方向保证祖先模式的显式设置优先于新引入模式的默认值。
pub fn merge(base: &ContainerSchema, overlay: &ContainerSchema) -> ContainerSchema {
    let mut merged = ContainerSchema::new();

    // 加载器并集：覆盖方优先
    for loader in &overlay.loaders {
        merged.loaders.push(Arc::clone(loader));
    }
    for loader in &base.loaders {
        if merged.find_loader(loader.name()).is_none() {
            merged.loaders.push(Arc::clone(loader));
        }
    }

    // 配置缺省填充：基底方优先
    merged.config = base.config.clone();
    for (service, config) in &overlay.config {
        merged
            .config
            .entry(service.clone())
            .or_insert_with(|| config.clone());
    }

    merged
}

/// 深层缺省填充合并
///
/// 将 `source` 中的键递归填充进 `target` 的空缺处：`target` 已有的
/// 标量键保持不变，双方都是对象的键递归合并，其余缺失键整体克隆。
pub fn defaults_deep(target: &mut ConfigMap, source: &ConfigMap) {
    for (key, source_value) in source {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), source_value.clone());
            }
            Some(Value::Object(target_map)) => {
                if let Value::Object(source_map) = source_value {
                    defaults_deep(target_map, source_map);
                }
            }
            Some(_) => {}
        }
    }
}
