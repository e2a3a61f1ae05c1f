//! 根容器构建器
//!
//! 使用建造者模式创建容器树的根节点：给定名称、模式、选项和日志
//! 回调，构建时按模式的加载器列表顺序在普通模式下解析全部服务。

use crate::arena::{ContainerArena, ContainerNode};
use crate::container::Container;
use crate::resolver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use warren_core::{ConfigMap, ContainerSchema, DependencyResult, LogCallback};

/// 根容器构建器
pub struct ContainerBuilder {
    name: String,
    schema: ContainerSchema,
    child_schemas: HashMap<String, ContainerSchema>,
    options: ConfigMap,
    log: Option<LogCallback>,
    resolve_on_build: bool,
}

impl ContainerBuilder {
    /// 创建新的构建器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: ContainerSchema::new(),
            child_schemas: HashMap::new(),
            options: ConfigMap::new(),
            log: None,
            resolve_on_build: true,
        }
    }

    /// 设置容器模式
    pub fn schema(mut self, schema: ContainerSchema) -> Self {
        self.schema = schema;
        self
    }

    /// 预注册子容器模式
    ///
    /// 以该名称分叉时，这里注册的模式会参与累积合并
    pub fn child_schema(mut self, name: impl Into<String>, schema: ContainerSchema) -> Self {
        self.child_schemas.insert(name.into(), schema);
        self
    }

    /// 构建时是否立即解析模式中的全部服务
    ///
    /// 默认开启；关闭后服务在首次显式加载或分叉时才创建
    pub fn resolve_on_build(mut self, enabled: bool) -> Self {
        self.resolve_on_build = enabled;
        self
    }

    /// 设置容器选项
    ///
    /// 非对象的 JSON 值会被忽略
    pub fn options(mut self, options: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = options {
            self.options = map;
        }
        self
    }

    /// 注入日志回调
    ///
    /// 回调由根容器持有，所有分叉出的子容器按引用继承
    pub fn log<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.log = Some(Arc::new(callback));
        self
    }

    /// 构建根容器并解析模式中的全部服务
    ///
    /// 解析失败原样向上传播；已解析的服务保留在容器中
    pub async fn build(self) -> DependencyResult<Container> {
        let arena = Arc::new(ContainerArena::new());

        let loaders = self.schema.loaders.clone();
        let mut schema_map = HashMap::new();
        schema_map.insert(self.name.clone(), self.schema);
        for (name, schema) in self.child_schemas {
            schema_map.entry(name).or_insert(schema);
        }

        let root_id = arena.alloc(ContainerNode::new(
            &self.name,
            schema_map,
            None,
            self.options,
            self.log,
        ));

        info!("构建根容器: {}", self.name);

        if self.resolve_on_build {
            for loader in &loaders {
                if resolver::service_present(&arena, root_id, loader.name()) {
                    continue;
                }

                let mut dependency_stack = Vec::new();
                resolver::load_service_inner(
                    &arena,
                    root_id,
                    loader.name(),
                    false,
                    &mut dependency_stack,
                )
                .await?;
            }
        }

        Ok(Container::from_parts(arena, root_id))
    }
}

impl Container {
    /// 创建根容器构建器
    pub fn builder(name: impl Into<String>) -> ContainerBuilder {
        ContainerBuilder::new(name)
    }
}
