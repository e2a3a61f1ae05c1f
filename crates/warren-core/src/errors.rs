//! 错误类型定义

use thiserror::Error;

/// 工厂函数返回的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 依赖解析错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("无效的容器句柄: {reason}")]
    InvalidContainer { reason: String },

    #[error("无效的服务名称")]
    InvalidServiceName,

    #[error("找不到服务加载器: {service}")]
    LoaderNotFound { service: String },

    #[error("服务加载器 {service} 中不存在 {capability}() 创建函数")]
    CapabilityNotFound { capability: String, service: String },

    #[error("检测到循环依赖: 服务 \"{service}\" 依赖 \"{dependency}\", 而 \"{dependency}\" 又依赖 \"{service}\"")]
    CircularDependency { service: String, dependency: String },

    #[error("服务创建失败: {service}, 原因: {source}")]
    CreationFailed { service: String, source: BoxError },
}

impl DependencyError {
    /// 创建无效容器错误
    pub fn invalid_container(reason: impl Into<String>) -> Self {
        Self::InvalidContainer {
            reason: reason.into(),
        }
    }

    /// 创建加载器缺失错误
    pub fn loader_not_found(service: impl Into<String>) -> Self {
        Self::LoaderNotFound {
            service: service.into(),
        }
    }

    /// 创建创建函数缺失错误
    pub fn capability_not_found(
        capability: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self::CapabilityNotFound {
            capability: capability.into(),
            service: service.into(),
        }
    }

    /// 创建循环依赖错误
    pub fn circular_dependency(
        service: impl Into<String>,
        dependency: impl Into<String>,
    ) -> Self {
        Self::CircularDependency {
            service: service.into(),
            dependency: dependency.into(),
        }
    }

    /// 创建服务创建失败错误
    pub fn creation_failed(service: impl Into<String>, source: BoxError) -> Self {
        Self::CreationFailed {
            service: service.into(),
            source,
        }
    }
}

/// 结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;
