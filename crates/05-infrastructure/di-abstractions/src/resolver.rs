//! 组件解析器抽象接口
//!
//! 构造函数通过 [`ComponentResolver`] 获取自身依赖。该 trait 保持对象安全，
//! 类型化的便捷方法由 [`ResolverExt`] 提供。

use crate::capability::ProjectedInstance;
use crate::registry::ServiceKey;
use infrastructure_common::DependencyError;
use std::sync::Arc;

/// 组件解析器 trait
///
/// 负责按服务键解析组件并返回投影后的能力句柄
pub trait ComponentResolver: Send {
    /// 解析服务键的默认提供者（最先注册者）
    fn resolve_service(&mut self, key: &ServiceKey) -> Result<ProjectedInstance, DependencyError>;

    /// 按注册顺序解析服务键的全部提供者
    fn resolve_all_services(&mut self, key: &ServiceKey) -> Result<Vec<ProjectedInstance>, DependencyError>;

    /// 检查服务键是否已注册
    fn contains_service(&self, key: &ServiceKey) -> bool;
}

/// 类型化解析方法
pub trait ResolverExt: ComponentResolver {
    /// 解析能力的默认提供者
    fn resolve<C: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<C>, DependencyError> {
        let key = ServiceKey::of::<C>();
        let projected = self.resolve_service(&key)?;
        unbox_projected(projected, &key)
    }

    /// 按名称解析能力
    fn resolve_named<C: ?Sized + Send + Sync + 'static>(&mut self, name: &str) -> Result<Arc<C>, DependencyError> {
        let key = ServiceKey::named::<C>(name);
        let projected = self.resolve_service(&key)?;
        unbox_projected(projected, &key)
    }

    /// 按注册顺序解析能力的全部提供者
    fn resolve_all<C: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Vec<Arc<C>>, DependencyError> {
        let key = ServiceKey::of::<C>();
        self.resolve_all_services(&key)?
            .into_iter()
            .map(|projected| unbox_projected(projected, &key))
            .collect()
    }

    /// 能力未注册时返回 `None`，其他错误照常返回
    fn try_resolve<C: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Option<Arc<C>>, DependencyError> {
        if !self.contains_service(&ServiceKey::of::<C>()) {
            return Ok(None);
        }
        self.resolve::<C>().map(Some)
    }

    /// 检查能力是否已注册
    fn is_registered<C: ?Sized + 'static>(&self) -> bool {
        self.contains_service(&ServiceKey::of::<C>())
    }
}

impl<R: ComponentResolver + ?Sized> ResolverExt for R {}

/// 取出投影结果中的 `Arc<C>`
pub fn unbox_projected<C: ?Sized + Send + Sync + 'static>(
    projected: ProjectedInstance,
    key: &ServiceKey,
) -> Result<Arc<C>, DependencyError> {
    projected
        .downcast::<Arc<C>>()
        .map(|boxed| *boxed)
        .map_err(|_| DependencyError::TypeMismatch {
            capability: key.to_string(),
            implementation: std::any::type_name::<C>().to_string(),
        })
}

/// 解析选项
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// 最大递归深度
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

impl ResolveOptions {
    /// 设置最大递归深度
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
