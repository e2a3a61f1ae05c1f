//! 容器句柄与作用域查找
//!
//! [`Container`] 是暴露给使用方的轻量句柄（区域引用 + 节点索引），
//! 同时就是提供者/查找函数：同步解析查找引用，按作用域选择自身、
//! 父容器或兄弟容器的服务表。查找只做短临界区读取，永不阻塞解析。

use crate::arena::{ContainerArena, ContainerId};
use crate::reference::ServiceReference;
use crate::resolver;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::Mutex;
use warren_core::{
    value_arg, ConfigMap, DependencyError, DependencyResult, ServiceInstance, ServiceProvider,
    ServiceValue,
};

/// 容器句柄
///
/// 克隆开销极低；所有克隆指向同一个容器节点
#[derive(Clone)]
pub struct Container {
    arena: Arc<ContainerArena>,
    id: ContainerId,
}

impl Container {
    /// 由区域和节点索引构造句柄
    pub(crate) fn from_parts(arena: Arc<ContainerArena>, id: ContainerId) -> Self {
        Self { arena, id }
    }

    pub(crate) fn arena(&self) -> &Arc<ContainerArena> {
        &self.arena
    }

    pub(crate) fn id(&self) -> ContainerId {
        self.id
    }

    /// 取出本容器的解析守卫
    pub(crate) fn resolution_guard(&self) -> DependencyResult<Arc<Mutex<()>>> {
        self.arena
            .with_node(self.id, |node| node.resolution_guard.clone())
            .ok_or_else(|| DependencyError::invalid_container("容器节点不存在"))
    }

    /// 容器名称
    pub fn name(&self) -> String {
        self.arena
            .with_node(self.id, |node| node.name.clone())
            .unwrap_or_default()
    }

    /// 分叉时传入的选项
    pub fn options(&self) -> ConfigMap {
        self.arena
            .with_node(self.id, |node| node.options.clone())
            .unwrap_or_default()
    }

    /// 容器创建时间
    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.arena.with_node(self.id, |node| node.created_at)
    }

    /// 父容器句柄
    pub fn parent(&self) -> Option<Container> {
        let parent_id = self.arena.with_node(self.id, |node| node.parent)??;
        Some(Self::from_parts(Arc::clone(&self.arena), parent_id))
    }

    /// 按名称获取子容器句柄
    pub fn child(&self, name: &str) -> Option<Container> {
        let child_id = self
            .arena
            .with_node(self.id, |node| node.children.get(name).copied())??;
        Some(Self::from_parts(Arc::clone(&self.arena), child_id))
    }

    /// 服务是否已解析
    ///
    /// 显式空值条目也算已解析
    pub fn has_service(&self, name: &str) -> bool {
        self.arena
            .with_node(self.id, |node| node.services.contains_key(name))
            .unwrap_or(false)
    }

    /// 已解析的服务名列表
    pub fn service_names(&self) -> Vec<String> {
        self.arena
            .with_node(self.id, |node| node.services.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// 解析查找引用并返回服务实例
    ///
    /// 任何未命中（格式不合法、作用域不存在、服务未解析或为显式
    /// 空值、对非可调用实例传参）都返回 `None`，绝不报错
    pub fn lookup(&self, reference: &str, args: &[ServiceValue]) -> Option<ServiceInstance> {
        let reference = ServiceReference::parse(reference)?;

        let target = match reference.scope() {
            None => self.id,
            Some(scope) => self.resolve_scope(scope)?,
        };

        let entry = self
            .arena
            .with_node(target, |node| node.services.get(reference.name()).cloned())??;
        // 显式空值视为未命中
        let instance = entry?;

        match reference.param() {
            Some(param) => {
                let mut call_args: Vec<ServiceValue> = Vec::with_capacity(args.len() + 1);
                call_args.push(value_arg(param));
                call_args.extend(args.iter().cloned());
                instance.invoke(&call_args)
            }
            None if args.is_empty() => Some(instance),
            None => instance.invoke(args),
        }
    }

    /// 作用域解析：等于父容器名时指向父容器，否则按兄弟容器名查找
    fn resolve_scope(&self, scope: &str) -> Option<ContainerId> {
        let parent_id = self.arena.with_node(self.id, |node| node.parent)??;
        self.arena.with_node(parent_id, |parent| {
            if parent.name == scope {
                Some(parent_id)
            } else {
                parent.children.get(scope).copied()
            }
        })?
    }

    /// 无参查找
    pub fn get(&self, reference: &str) -> Option<ServiceInstance> {
        self.lookup(reference, &[])
    }

    /// 查找并向下转型为具体类型
    pub fn get_as<T: Any + Send + Sync>(&self, reference: &str) -> Option<Arc<T>> {
        self.get(reference)?.downcast::<T>()
    }

    /// 带参调用查找
    pub fn call(&self, reference: &str, args: &[ServiceValue]) -> Option<ServiceInstance> {
        self.lookup(reference, args)
    }

    /// 解析并加载指定服务
    ///
    /// 依赖栈由调用方初始化（通常为空），仅用于循环检测。顶层调用
    /// 持有本容器的解析守卫，同一容器同一时刻只有一条解析链
    pub async fn load_service(
        &self,
        service_name: &str,
        fork_mode: bool,
        dependency_stack: &mut Vec<String>,
    ) -> DependencyResult<()> {
        let guard = self.resolution_guard()?;
        let _guard = guard.lock().await;

        resolver::load_service_inner(&self.arena, self.id, service_name, fork_mode, dependency_stack)
            .await
    }
}

impl ServiceProvider for Container {
    fn container_name(&self) -> String {
        self.name()
    }

    fn options(&self) -> ConfigMap {
        self.options()
    }

    fn lookup(&self, reference: &str, args: &[ServiceValue]) -> Option<ServiceInstance> {
        self.lookup(reference, args)
    }

    fn has_service(&self, name: &str) -> bool {
        self.has_service(name)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("services", &self.service_names())
            .finish()
    }
}
