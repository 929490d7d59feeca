//! 错误类型定义

use thiserror::Error;

/// 可传递的装箱错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 依赖解析错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("能力未注册: {capability}")]
    UnresolvedCapability { capability: String },

    #[error("组件创建失败: {type_name}, 原因: {source}")]
    ComponentCreationFailed { type_name: String, source: BoxError },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("解析深度超过上限 {max_depth}: {dependency_chain}")]
    MaxDepthExceeded {
        max_depth: usize,
        dependency_chain: String,
    },

    #[error("没有匹配的逻辑上下文: {type_name}")]
    NoMatchingContext { type_name: String },

    #[error("作用域已释放: {scope}")]
    ScopeDisposed { scope: String },

    #[error("能力类型不匹配: {capability} 无法由 {implementation} 提供")]
    TypeMismatch {
        capability: String,
        implementation: String,
    },
}

impl DependencyError {
    /// 将构造函数中的任意错误包装为组件创建失败
    pub fn creation_failed(type_name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ComponentCreationFailed {
            type_name: type_name.into(),
            source: source.into(),
        }
    }
}

/// 组件组合错误类型
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("插件扫描失败: {message}")]
    ScanError { message: String },

    #[error("主程序集缺失: {name}")]
    PrimaryAssemblyMissing { name: String },

    #[error("无效的导出声明: {type_name}, 原因: {message}")]
    InvalidExport { type_name: String, message: String },

    #[error("不支持的生命周期: {lifetime}{}", .type_name.as_deref().map(|t| format!(" (组件 {t})")).unwrap_or_default())]
    UnsupportedLifetime {
        lifetime: String,
        type_name: Option<String>,
    },

    #[error("组件注册失败: {type_name}, 原因: {message}")]
    RegistrationError { type_name: String, message: String },

    #[error("注册模块失败: {module}, 原因: {message}")]
    ModuleFailed { module: String, message: String },

    #[error("组合阶段失败: {phase}, 原因: {source}")]
    PhaseFailed {
        phase: String,
        #[source]
        source: Box<ComponentError>,
    },
}

impl ComponentError {
    /// 包装为指定阶段的失败
    pub fn in_phase(self, phase: impl Into<String>) -> Self {
        match self {
            already @ Self::PhaseFailed { .. } => already,
            other => Self::PhaseFailed {
                phase: phase.into(),
                source: Box::new(other),
            },
        }
    }

    /// 去掉阶段包装后的根因
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::PhaseFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// 缓存错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("缓存工厂执行失败: {key}, 原因: {source}")]
    FactoryFailed { key: String, source: BoxError },

    #[error("缓存值类型不匹配: {key}, 期望 {expected}")]
    TypeMismatch { key: String, expected: String },

    #[error("缓存键无效: {message}")]
    InvalidKey { message: String },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("依赖解析错误: {0}")]
    Dependency(#[from] DependencyError),

    #[error("组件错误: {0}")]
    Component(#[from] ComponentError),

    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),

    #[error("启动服务失败: {service}, 原因: {source}")]
    StartupServiceFailed { service: String, source: BoxError },

    #[error("事件处理失败: {event} ({handler}), 原因: {source}")]
    EventHandlerFailed {
        event: String,
        handler: String,
        source: BoxError,
    },

    #[error("基础设施状态无效: {message}")]
    InvalidState { message: String },
}

/// 配置操作结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 依赖解析结果类型
pub type DependencyResult<T> = Result<T, DependencyError>;

/// 组件组合结果类型
pub type ComponentResult<T> = Result<T, ComponentError>;

/// 缓存操作结果类型
pub type CacheResult<T> = Result<T, CacheError>;

/// 基础设施操作结果类型
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
