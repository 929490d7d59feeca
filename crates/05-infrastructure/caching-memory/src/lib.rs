//! # In-memory Data Cache
//!
//! 进程内 [`DataCache`](caching_abstractions::DataCache) 实现。

pub mod memory;

pub use memory::*;
