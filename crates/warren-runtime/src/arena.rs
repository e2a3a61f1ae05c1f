//! 容器节点区域
//!
//! 容器树以区域（arena）方式存储：节点放在一个只增不减的向量里，
//! 父子关系用索引表示。父引用只是一个索引，不隐含所有权，因此
//! 不需要弱引用或引用计数循环。节点在核心层没有销毁钩子，随区域
//! 一起存活。

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use warren_core::{ConfigMap, ContainerSchema, LogCallback, ServiceInstance};

/// 容器标识符
///
/// 区域内的节点索引；节点不会被移除，索引始终有效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub(crate) usize);

/// 容器树节点
pub(crate) struct ContainerNode {
    /// 容器名称，兄弟之间唯一
    pub(crate) name: String,
    /// 容器名 -> 模式；至少包含容器自身名称的条目
    pub(crate) schema: HashMap<String, ContainerSchema>,
    /// 服务名 -> 已解析实例；键不存在表示从未尝试解析，
    /// `None` 表示显式空值（已解析、刻意为空）
    pub(crate) services: HashMap<String, Option<ServiceInstance>>,
    /// 父容器索引
    pub(crate) parent: Option<ContainerId>,
    /// 子容器名 -> 索引
    pub(crate) children: HashMap<String, ContainerId>,
    /// 分叉时传入的选项
    pub(crate) options: ConfigMap,
    /// 从根容器按引用继承的日志回调
    pub(crate) log: Option<LogCallback>,
    /// 创建时间
    pub(crate) created_at: DateTime<Utc>,
    /// 解析守卫：同一容器同一时刻只允许一条顶层解析链
    pub(crate) resolution_guard: Arc<Mutex<()>>,
}

impl ContainerNode {
    /// 创建新节点
    pub(crate) fn new(
        name: impl Into<String>,
        schema: HashMap<String, ContainerSchema>,
        parent: Option<ContainerId>,
        options: ConfigMap,
        log: Option<LogCallback>,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            services: HashMap::new(),
            parent,
            children: HashMap::new(),
            options,
            log,
            created_at: Utc::now(),
            resolution_guard: Arc::new(Mutex::new(())),
        }
    }
}

/// 容器节点区域
///
/// 锁的使用约定：读写锁只做短临界区访问，绝不跨越挂起点持有
pub(crate) struct ContainerArena {
    nodes: RwLock<Vec<ContainerNode>>,
}

impl ContainerArena {
    /// 创建空区域
    pub(crate) fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// 分配新节点，返回其索引
    pub(crate) fn alloc(&self, node: ContainerNode) -> ContainerId {
        let mut nodes = self.nodes.write();
        let id = ContainerId(nodes.len());
        nodes.push(node);
        id
    }

    /// 只读访问节点
    pub(crate) fn with_node<R>(
        &self,
        id: ContainerId,
        reader: impl FnOnce(&ContainerNode) -> R,
    ) -> Option<R> {
        let nodes = self.nodes.read();
        nodes.get(id.0).map(reader)
    }

    /// 可变访问节点
    pub(crate) fn with_node_mut<R>(
        &self,
        id: ContainerId,
        writer: impl FnOnce(&mut ContainerNode) -> R,
    ) -> Option<R> {
        let mut nodes = self.nodes.write();
        nodes.get_mut(id.0).map(writer)
    }
}
