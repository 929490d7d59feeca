//! 元数据定义
//!
//! 提供能力和实现类型的元数据信息

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 类型信息
///
/// 相等性和哈希只取决于 [`TypeId`]，名称仅用于日志和报告。
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// 类型名称（不含模块路径）
    pub name: String,
    /// 类型ID
    pub id: TypeId,
    /// 完整类型路径
    pub module_path: String,
}

impl TypeInfo {
    /// 从类型获取类型信息，支持 `dyn Trait`
    pub fn of<T: ?Sized + 'static>() -> Self {
        let full = std::any::type_name::<T>();
        Self {
            name: short_type_name(full),
            id: TypeId::of::<T>(),
            module_path: full.to_string(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        &self.name
    }

    /// 判断是否为指定类型
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// `dyn a::B + core::marker::Send` → `B`，`alloc::vec::Vec<x::Y>` → `Vec<x::Y>`
fn short_type_name(full: &str) -> String {
    let head = full.trim_start_matches("dyn ");
    let head = head.split(" + ").next().unwrap_or(head);
    let (path, generics) = match head.find('<') {
        Some(pos) => head.split_at(pos),
        None => (head, ""),
    };
    let base = path.rsplit("::").next().unwrap_or(path);
    format!("{base}{generics}")
}
