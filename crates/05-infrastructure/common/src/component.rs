//! 结构化能力
//!
//! 这些能力由容器按结构处理（释放、服务定位、本地化），
//! 永远不会从组件实现的接口集合中自动推导为可解析的服务。

use std::any::TypeId;

/// 可释放组件
///
/// 由拥有该实例的作用域在结束时按创建的逆序调用。
pub trait Disposable: Send + Sync {
    /// 释放组件持有的资源
    fn dispose(&self);
}

/// 持有服务定位器的组件
pub trait HaveServiceLocator: Send + Sync {}

/// 持有本地化上下文的组件
pub trait HaveLocalization: Send + Sync {
    /// 当前使用的语言文化
    fn culture(&self) -> &str;
}

/// 结构化能力的类型标识，导出推导时排除
pub fn structural_capabilities() -> [TypeId; 3] {
    [
        TypeId::of::<dyn Disposable>(),
        TypeId::of::<dyn HaveServiceLocator>(),
        TypeId::of::<dyn HaveLocalization>(),
    ]
}

/// 判断能力是否属于结构化能力
pub fn is_structural_capability(id: TypeId) -> bool {
    structural_capabilities().contains(&id)
}
