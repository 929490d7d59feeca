//! # Caching Abstractions
//!
//! 论坛数据缓存的抽象接口。
//!
//! - [`DataCache`] - 按键取值或创建、按谓词批量失效
//! - [`DataCacheExt`] - 类型化的取值或创建
//! - [`CacheKeyTemplate`] / [`TreatCacheKey`] / [`BoardCacheKey`] - 按版块隔离的缓存键

pub mod cache;
pub mod key;

pub use cache::*;
pub use key::*;
