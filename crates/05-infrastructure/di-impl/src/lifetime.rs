//! 生命周期解析
//!
//! 将 [`LifetimeScope`] 映射为具体的实例化策略。

use infrastructure_common::{ComponentError, LifetimeScope};
use std::collections::BTreeSet;
use tracing::debug;

/// 实例共享范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// 根作用域（进程级）共享
    Root,
    /// 解析时所在作用域共享
    Scope,
    /// 最近的逻辑上下文共享
    LogicalContext,
    /// 不共享，每次解析新建
    None,
}

/// 实例归属（谁负责释放）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// 容器（根作用域）
    Container,
    /// 外部调用方，注册表从不释放
    External,
    /// 所属作用域
    Scope,
    /// 所属逻辑上下文
    LogicalContext,
}

/// 实例化策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantiationPolicy {
    /// 共享范围
    pub sharing: Sharing,
    /// 实例归属
    pub ownership: Ownership,
}

impl InstantiationPolicy {
    /// 注册表是否负责释放
    pub fn is_owned(&self) -> bool {
        self.ownership != Ownership::External
    }
}

/// 进程级单例，容器拥有
pub fn singleton_policy() -> InstantiationPolicy {
    InstantiationPolicy {
        sharing: Sharing::Root,
        ownership: Ownership::Container,
    }
}

/// 每次新建，调用方拥有
pub fn transient_policy() -> InstantiationPolicy {
    InstantiationPolicy {
        sharing: Sharing::None,
        ownership: Ownership::External,
    }
}

/// 每次新建，作用域拥有
pub fn owned_by_scope_policy() -> InstantiationPolicy {
    InstantiationPolicy {
        sharing: Sharing::None,
        ownership: Ownership::Scope,
    }
}

/// 作用域内共享
pub fn per_scope_policy() -> InstantiationPolicy {
    InstantiationPolicy {
        sharing: Sharing::Scope,
        ownership: Ownership::Scope,
    }
}

/// 每个依赖新建，作用域拥有。与 owned-by-scope 的实例化行为相同
pub fn per_dependency_policy() -> InstantiationPolicy {
    InstantiationPolicy {
        sharing: Sharing::None,
        ownership: Ownership::Scope,
    }
}

/// 逻辑上下文内共享
pub fn per_logical_context_policy() -> InstantiationPolicy {
    InstantiationPolicy {
        sharing: Sharing::LogicalContext,
        ownership: Ownership::LogicalContext,
    }
}

/// 生命周期解析器
///
/// 可以只支持部分策略，例如没有请求上下文的后台宿主禁用 `per-logical-context`。
#[derive(Debug, Clone)]
pub struct LifetimeScopeResolver {
    supported: BTreeSet<LifetimeScope>,
}

impl LifetimeScopeResolver {
    /// 支持全部策略
    pub fn new() -> Self {
        Self {
            supported: LifetimeScope::ALL.into_iter().collect(),
        }
    }

    /// 仅支持指定策略
    pub fn with_supported(lifetimes: impl IntoIterator<Item = LifetimeScope>) -> Self {
        Self {
            supported: lifetimes.into_iter().collect(),
        }
    }

    /// 禁用一个策略
    pub fn without(mut self, lifetime: LifetimeScope) -> Self {
        self.supported.remove(&lifetime);
        self
    }

    /// 按配置中的名称禁用策略，未知名称立即失败
    pub fn from_disabled_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ComponentError> {
        names.iter().try_fold(Self::new(), |resolver, name| {
            let lifetime: LifetimeScope = name.as_ref().parse()?;
            debug!("禁用生命周期策略: {}", lifetime);
            Ok(resolver.without(lifetime))
        })
    }

    /// 是否支持
    pub fn supports(&self, lifetime: LifetimeScope) -> bool {
        self.supported.contains(&lifetime)
    }

    /// 支持的策略
    pub fn supported(&self) -> impl Iterator<Item = LifetimeScope> + '_ {
        self.supported.iter().copied()
    }

    /// 解析组件的实例化策略
    pub fn resolve(&self, lifetime: LifetimeScope, type_name: &str) -> Result<InstantiationPolicy, ComponentError> {
        if !self.supports(lifetime) {
            return Err(ComponentError::UnsupportedLifetime {
                lifetime: lifetime.to_string(),
                type_name: Some(type_name.to_string()),
            });
        }

        Ok(match lifetime {
            LifetimeScope::Singleton => singleton_policy(),
            LifetimeScope::Transient => transient_policy(),
            LifetimeScope::OwnedByScope => owned_by_scope_policy(),
            LifetimeScope::PerScope => per_scope_policy(),
            LifetimeScope::PerDependency => per_dependency_policy(),
            LifetimeScope::PerLogicalContext => per_logical_context_policy(),
        })
    }
}

impl Default for LifetimeScopeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_policy() {
        let policy = singleton_policy();
        assert_eq!(policy.sharing, Sharing::Root);
        assert_eq!(policy.ownership, Ownership::Container);
        assert!(policy.is_owned());
    }

    #[test]
    fn test_transient_policy() {
        let policy = transient_policy();
        assert_eq!(policy.sharing, Sharing::None);
        assert!(!policy.is_owned());
    }

    #[test]
    fn test_owned_by_scope_policy() {
        let policy = owned_by_scope_policy();
        assert_eq!(policy.sharing, Sharing::None);
        assert_eq!(policy.ownership, Ownership::Scope);
    }

    #[test]
    fn test_per_scope_policy() {
        let policy = per_scope_policy();
        assert_eq!(policy.sharing, Sharing::Scope);
        assert_eq!(policy.ownership, Ownership::Scope);
    }

    #[test]
    fn test_per_dependency_policy() {
        let policy = per_dependency_policy();
        assert_eq!(policy.sharing, Sharing::None);
        assert_eq!(policy, owned_by_scope_policy());
    }

    #[test]
    fn test_per_logical_context_policy() {
        let policy = per_logical_context_policy();
        assert_eq!(policy.sharing, Sharing::LogicalContext);
        assert_eq!(policy.ownership, Ownership::LogicalContext);
    }

    #[test]
    fn test_resolver_is_total_over_supported_lifetimes() {
        let resolver = LifetimeScopeResolver::new();
        for lifetime in LifetimeScope::ALL {
            assert!(resolver.resolve(lifetime, "Component").is_ok());
        }
    }

    #[test]
    fn test_disabled_lifetime_fails_fast() {
        let resolver = LifetimeScopeResolver::from_disabled_names(&["per-logical-context"]).unwrap();
        assert!(!resolver.supports(LifetimeScope::PerLogicalContext));

        let err = resolver
            .resolve(LifetimeScope::PerLogicalContext, "StopWatch")
            .unwrap_err();
        assert!(matches!(
            err,
            ComponentError::UnsupportedLifetime { type_name: Some(ref t), .. } if t == "StopWatch"
        ));
    }

    #[test]
    fn test_unknown_disabled_name_is_rejected() {
        let err = LifetimeScopeResolver::from_disabled_names(&["per-request"]).unwrap_err();
        assert!(matches!(err, ComponentError::UnsupportedLifetime { .. }));
    }
}
