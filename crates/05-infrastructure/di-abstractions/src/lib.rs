//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义插件单元、导出声明和依赖解析的核心接口。
//!
//! ## 核心接口
//!
//! - [`CapabilityBinding`] / [`capability!`] - 实现到能力的显式绑定
//! - [`PluginAssembly`] / [`PluginType`] / [`PluginCatalog`] - 插件单元模型
//! - [`ExportMarker`] / [`ExportDescriptor`] - 导出声明
//! - [`ComponentBatch`] / [`RegistryModule`] - 组合阶段的注册批次
//! - [`ComponentResolver`] - 构造函数使用的依赖解析接口
//! - [`PluginScanner`] - 插件扫描器接口

pub mod assembly;
pub mod capability;
pub mod export;
pub mod factory;
pub mod registry;
pub mod resolver;
pub mod scanner;

pub use assembly::*;
pub use capability::*;
pub use export::*;
pub use factory::*;
pub use registry::*;
pub use resolver::*;
pub use scanner::*;
