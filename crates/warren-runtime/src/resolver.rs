//! 递归服务解析器
//!
//! 按名称加载服务：定位加载器、确定创建策略、合并配置、深度优先
//! 解析依赖闭包（带循环检测）、调用创建能力并把结果写入容器的
//! 服务表。所有失败立即向上传播，不重试、不回滚。

use crate::arena::{ContainerArena, ContainerId};
use crate::container::Container;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::info;
use warren_core::{
    defaults_deep, DependencyError, DependencyResult, ForkBehavior, LogCallback, ServiceContext,
    ServiceInstance, ServiceLoader, ServiceProvider, CREATE_CAPABILITY,
};

/// 创建策略
///
/// 每次加载调用只确定一次，取代对能力值形态的反复分支判断
#[derive(Debug, Clone, PartialEq, Eq)]
enum CreationStrategy {
    /// 调用指定名称的能力
    Direct(String),
    /// 强制调用 `create`
    AlwaysCreate,
    /// 跳过创建，服务保持未设置状态
    Skip,
    /// 父容器已解析该服务时原样复用，否则调用 `create`
    InheritFromParent,
}

/// 从分叉行为映射创建策略
///
/// 普通模式恒为 `create`；分叉模式由加载器的分叉声明决定
fn resolve_strategy(
    loader: &ServiceLoader,
    fork_mode: bool,
    service_name: &str,
) -> DependencyResult<CreationStrategy> {
    // create 能力始终是必需的，即使分叉声明指向其它能力
    if !loader.has_capability(CREATE_CAPABILITY) {
        return Err(DependencyError::capability_not_found(
            CREATE_CAPABILITY,
            service_name,
        ));
    }

    if !fork_mode {
        return Ok(CreationStrategy::Direct(CREATE_CAPABILITY.to_string()));
    }

    match loader.fork() {
        ForkBehavior::Inherit => Ok(CreationStrategy::InheritFromParent),
        ForkBehavior::Create => Ok(CreationStrategy::AlwaysCreate),
        ForkBehavior::Skip => Ok(CreationStrategy::Skip),
        ForkBehavior::Capability(name) => {
            if !loader.has_capability(name) {
                return Err(DependencyError::capability_not_found(name, service_name));
            }
            Ok(CreationStrategy::Direct(name.clone()))
        }
    }
}

/// 调用加载器的指定能力
async fn invoke_capability(
    loader: &Arc<ServiceLoader>,
    capability: &str,
    ctx: ServiceContext,
    service_name: &str,
) -> DependencyResult<Option<ServiceInstance>> {
    let factory = loader
        .capability(capability)
        .cloned()
        .ok_or_else(|| DependencyError::capability_not_found(capability, service_name))?;

    factory
        .invoke(ctx)
        .await
        .map_err(|source| DependencyError::creation_failed(service_name, source))
}

/// 递归加载服务（内部入口，不获取解析守卫）
///
/// 同一逻辑解析链通过这里递归；守卫只在顶层公共入口获取一次
pub(crate) fn load_service_inner<'a>(
    arena: &'a Arc<ContainerArena>,
    id: ContainerId,
    service_name: &'a str,
    fork_mode: bool,
    dependency_stack: &'a mut Vec<String>,
) -> BoxFuture<'a, DependencyResult<()>> {
    Box::pin(async move {
        if service_name.is_empty() {
            return Err(DependencyError::InvalidServiceName);
        }

        let (container_name, log, parent) = arena
            .with_node(id, |node| {
                (node.name.clone(), node.log.clone(), node.parent)
            })
            .ok_or_else(|| DependencyError::invalid_container("容器节点不存在"))?;

        // 幂等：已解析的名称（含显式空值）直接返回，不再触发创建
        let already_resolved = arena
            .with_node(id, |node| node.services.contains_key(service_name))
            .unwrap_or(false);
        if already_resolved {
            return Ok(());
        }

        let loader = arena
            .with_node(id, |node| {
                node.schema
                    .get(&node.name)
                    .map(|schema| schema.find_loader(service_name).cloned())
            })
            .ok_or_else(|| DependencyError::invalid_container("容器节点不存在"))?
            .ok_or_else(|| {
                DependencyError::invalid_container(format!(
                    "容器模式中缺少 \"{container_name}\" 条目"
                ))
            })?
            .ok_or_else(|| DependencyError::loader_not_found(service_name))?;

        let strategy = resolve_strategy(&loader, fork_mode, service_name)?;

        // 尽力而为的日志，从不阻塞解析
        if let Some(log) = &log {
            emit_log(log, service_name, &container_name);
        }
        info!("加载服务: {} (容器: {})", service_name, container_name);

        // 配置合并：模式条目的值优先，加载器默认值填充空缺；
        // 合并结果写回本容器的模式条目，供同一容器的后续解析使用
        let config_snapshot = arena
            .with_node_mut(id, |node| {
                let own_name = node.name.clone();
                let Some(schema) = node.schema.get_mut(&own_name) else {
                    return loader.config().clone();
                };
                match schema.config.get_mut(service_name) {
                    Some(entry) => {
                        defaults_deep(entry, loader.config());
                        entry.clone()
                    }
                    None => loader.config().clone(),
                }
            })
            .ok_or_else(|| DependencyError::invalid_container("容器节点不存在"))?;

        // 依赖按声明顺序深度优先解析，全部先于自身创建完成
        for dependency in loader.requires().as_slice() {
            let present = arena
                .with_node(id, |node| node.services.contains_key(dependency))
                .unwrap_or(false);
            if present {
                continue;
            }

            if dependency_stack.iter().any(|name| name == dependency) {
                return Err(DependencyError::circular_dependency(
                    service_name,
                    dependency,
                ));
            }

            dependency_stack.push(dependency.clone());
            let result =
                load_service_inner(arena, id, dependency, fork_mode, dependency_stack).await;
            dependency_stack.pop();
            result?;
        }

        // 按策略实例化
        let provider: Arc<dyn ServiceProvider> =
            Arc::new(Container::from_parts(Arc::clone(arena), id));
        let ctx = ServiceContext::new(provider, service_name, config_snapshot);

        let outcome: Option<Option<ServiceInstance>> = match &strategy {
            CreationStrategy::Direct(capability) => {
                Some(invoke_capability(&loader, capability, ctx, service_name).await?)
            }
            CreationStrategy::AlwaysCreate => {
                Some(invoke_capability(&loader, CREATE_CAPABILITY, ctx, service_name).await?)
            }
            CreationStrategy::Skip => None,
            CreationStrategy::InheritFromParent => {
                let inherited = parent.and_then(|parent_id| {
                    arena
                        .with_node(parent_id, |node| node.services.get(service_name).cloned())
                        .flatten()
                });
                match inherited {
                    // 父容器的条目原样复用，显式空值同样继承
                    Some(entry) => Some(entry),
                    None => Some(
                        invoke_capability(&loader, CREATE_CAPABILITY, ctx, service_name).await?,
                    ),
                }
            }
        };

        // 结果写入服务表；创建返回的空缺归一化为显式空值条目
        if let Some(entry) = outcome {
            arena
                .with_node_mut(id, |node| {
                    node.services.insert(service_name.to_string(), entry);
                })
                .ok_or_else(|| DependencyError::invalid_container("容器节点不存在"))?;
        }

        Ok(())
    })
}

/// 通过注入的回调输出日志
fn emit_log(log: &LogCallback, service_name: &str, container_name: &str) {
    log(&format!(
        "正在从容器 \"{container_name}\" 加载服务 \"{service_name}\"..."
    ));
}

/// 供分叉与根构建循环使用：容器的服务表是否已有该名称
pub(crate) fn service_present(
    arena: &Arc<ContainerArena>,
    id: ContainerId,
    service_name: &str,
) -> bool {
    arena
        .with_node(id, |node| node.services.contains_key(service_name))
        .unwrap_or(false)
}
