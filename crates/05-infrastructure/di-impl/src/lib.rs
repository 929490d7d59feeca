//! # 依赖注入具体实现
//!
//! 提供生命周期解析、分阶段合并的服务注册表，以及基于作用域的解析引擎。
//!
//! - [`LifetimeScopeResolver`] - 生命周期到实例化策略的映射
//! - [`Registry`] - 保留首个注册者为默认提供者的注册表
//! - [`Container`] / [`Scope`] - 解析与实例归属

pub mod container;
pub mod context;
pub mod lifetime;
pub mod registry;

pub use container::*;
pub use context::*;
pub use lifetime::*;
pub use registry::*;
