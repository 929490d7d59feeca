//! # Infrastructure Common
//!
//! 论坛组合根基础设施层的公共类型。
//!
//! ## 核心组件
//!
//! - [`LifetimeScope`] - 六种对象生命周期策略
//! - [`TypeInfo`] - 类型元数据（能力和实现的标识）
//! - [`Disposable`] / [`HaveServiceLocator`] / [`HaveLocalization`] - 结构化能力
//! - 错误类型：[`ComponentError`]、[`DependencyError`]、[`CacheError`]、[`ConfigError`]、[`InfrastructureError`]
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的编译时安全
//! - 组合阶段快速失败，不发布部分注册表

pub mod component;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use component::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
