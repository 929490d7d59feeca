//! 组件构造函数

use crate::capability::AnyInstance;
use crate::resolver::ComponentResolver;
use infrastructure_common::DependencyError;
use std::sync::Arc;

/// 类型擦除的构造函数，依赖通过解析器获取
pub type Constructor =
    Arc<dyn Fn(&mut dyn ComponentResolver) -> Result<AnyInstance, DependencyError> + Send + Sync>;

/// 将类型化构造函数擦除为 [`Constructor`]
pub fn erase_constructor<T, F>(constructor: F) -> Constructor
where
    T: Send + Sync + 'static,
    F: Fn(&mut dyn ComponentResolver) -> Result<T, DependencyError> + Send + Sync + 'static,
{
    Arc::new(move |resolver: &mut dyn ComponentResolver| {
        constructor(resolver).map(|instance| Arc::new(instance) as AnyInstance)
    })
}

/// 始终返回同一个实例的构造函数
pub fn instance_constructor<T: Send + Sync + 'static>(instance: Arc<T>) -> Constructor {
    Arc::new(move |_: &mut dyn ComponentResolver| Ok(Arc::clone(&instance) as AnyInstance))
}
