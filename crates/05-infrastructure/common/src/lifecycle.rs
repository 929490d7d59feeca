//! 组件生命周期策略

use crate::errors::ComponentError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 组件生命周期类型
///
/// 封闭枚举，配置中使用 kebab-case 名称。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifetimeScope {
    /// 单例模式 - 进程内只构造一次，首次解析时延迟构造
    Singleton,
    /// 瞬时模式 - 注册表不持有，调用方负责释放
    Transient,
    /// 作用域拥有 - 每次解析新建，随所属作用域结束而释放
    OwnedByScope,
    /// 作用域共享 - 每个作用域一个实例
    PerScope,
    /// 按依赖 - 每次解析新建
    PerDependency,
    /// 逻辑上下文共享 - 每个逻辑上下文（请求等价物）一个实例
    PerLogicalContext,
}

impl LifetimeScope {
    /// 全部生命周期策略
    pub const ALL: [Self; 6] = [
        Self::Singleton,
        Self::Transient,
        Self::OwnedByScope,
        Self::PerScope,
        Self::PerDependency,
        Self::PerLogicalContext,
    ];

    /// 配置中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Transient => "transient",
            Self::OwnedByScope => "owned-by-scope",
            Self::PerScope => "per-scope",
            Self::PerDependency => "per-dependency",
            Self::PerLogicalContext => "per-logical-context",
        }
    }
}

impl fmt::Display for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifetimeScope {
    type Err = ComponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|lifetime| lifetime.as_str() == normalized)
            .ok_or_else(|| ComponentError::UnsupportedLifetime {
                lifetime: s.to_string(),
                type_name: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lifetime_names() {
        assert_eq!("singleton".parse::<LifetimeScope>().unwrap(), LifetimeScope::Singleton);
        assert_eq!(
            "per_logical_context".parse::<LifetimeScope>().unwrap(),
            LifetimeScope::PerLogicalContext
        );
        assert_eq!(" Owned-By-Scope ".parse::<LifetimeScope>().unwrap(), LifetimeScope::OwnedByScope);

        for lifetime in LifetimeScope::ALL {
            assert_eq!(lifetime.to_string().parse::<LifetimeScope>().unwrap(), lifetime);
        }
    }

    #[test]
    fn test_unknown_lifetime_is_rejected() {
        let err = "instance-per-request".parse::<LifetimeScope>().unwrap_err();
        assert!(matches!(
            err,
            ComponentError::UnsupportedLifetime { ref lifetime, .. } if lifetime == "instance-per-request"
        ));
    }
}
