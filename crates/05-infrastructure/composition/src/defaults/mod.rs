//! 内置绑定
//!
//! 论坛组合根自带的默认实现，保证注册表在没有任何插件时也能完整解析。

pub mod general;
pub mod membership;
pub mod primary;
pub mod services;

pub use general::{register_general, OBJECT_STORE};
pub use membership::register_membership;
pub use primary::{core_assembly, StartupInitializeDb, CORE_ASSEMBLY};
pub use services::register_services;
