//! 容器分叉
//!
//! 在现有容器上创建子容器：模式取父模式、此前注册的同名子模式与
//! 调用方新模式的累积合并，子容器注册进父容器后，按合并模式的
//! 加载器列表在分叉模式下逐个解析。解析失败原样向上传播，子容器
//! 保持已注册但未完全填充的状态（尽力而为，不是事务）。

use crate::arena::ContainerNode;
use crate::container::Container;
use crate::resolver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use warren_core::{
    merge, ConfigMap, ContainerSchema, DependencyError, DependencyResult,
};

impl Container {
    /// 创建当前容器的分叉
    ///
    /// `schema` 为本次分叉的覆盖模式；对同一 `container_name` 重复
    /// 分叉时覆盖是累积的。同名旧子容器会被新子容器顶替。分叉期间
    /// 持有父容器的解析守卫，与其它顶层解析互斥
    pub async fn fork(
        &self,
        schema: Option<ContainerSchema>,
        container_name: &str,
        options: Option<ConfigMap>,
    ) -> DependencyResult<Container> {
        let guard = self.resolution_guard()?;
        let _guard = guard.lock().await;

        let (parent_name, parent_schema, prior_child_schema, log) = self
            .arena()
            .with_node(self.id(), |node| {
                (
                    node.name.clone(),
                    node.schema.get(&node.name).cloned(),
                    node.schema.get(container_name).cloned(),
                    node.log.clone(),
                )
            })
            .ok_or_else(|| DependencyError::invalid_container("容器节点不存在"))?;

        let parent_schema = parent_schema.ok_or_else(|| {
            DependencyError::invalid_container(format!(
                "容器模式中缺少 \"{parent_name}\" 条目"
            ))
        })?;

        // 累积合并：父模式 <- 此前注册的同名子模式 <- 调用方新模式
        let merged = merge(
            &merge(&parent_schema, &prior_child_schema.unwrap_or_default()),
            &schema.unwrap_or_default(),
        );

        info!("分叉容器: {} -> {}", parent_name, container_name);

        let loaders = merged.loaders.clone();

        // 新模式只包含以新容器名为键的条目，兄弟条目不带入
        let mut child_schema = HashMap::new();
        child_schema.insert(container_name.to_string(), merged);

        let child_id = self.arena().alloc(ContainerNode::new(
            container_name,
            child_schema,
            Some(self.id()),
            options.unwrap_or_default(),
            log,
        ));

        self.arena()
            .with_node_mut(self.id(), |node| {
                node.children.insert(container_name.to_string(), child_id);
            })
            .ok_or_else(|| DependencyError::invalid_container("容器节点不存在"))?;

        // 按列表顺序在分叉模式下解析每个加载器，
        // 每个顶层加载器使用全新的依赖栈
        for loader in &loaders {
            if resolver::service_present(self.arena(), child_id, loader.name()) {
                continue;
            }

            let mut dependency_stack = Vec::new();
            resolver::load_service_inner(
                self.arena(),
                child_id,
                loader.name(),
                true,
                &mut dependency_stack,
            )
            .await?;
        }

        Ok(Container::from_parts(Arc::clone(self.arena()), child_id))
    }
}
