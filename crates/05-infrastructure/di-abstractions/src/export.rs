//! 导出声明模型

use crate::capability::CapabilityBinding;
use crate::factory::Constructor;
use infrastructure_common::{LifetimeScope, TypeInfo};
use std::fmt;

/// 导出标记
///
/// 类型携带该标记即参与动态导出阶段。
#[derive(Debug, Clone)]
pub struct ExportMarker {
    /// 显式能力列表；`None` 或空列表时从实现的接口集合推导
    pub explicit_capabilities: Option<Vec<CapabilityBinding>>,
    /// 注册名称；设置后只按 (名称, 能力) 注册
    pub name: Option<String>,
    /// 生命周期
    pub lifetime: LifetimeScope,
}

impl ExportMarker {
    /// 创建导出标记
    pub fn new(lifetime: LifetimeScope) -> Self {
        Self {
            explicit_capabilities: None,
            name: None,
            lifetime,
        }
    }

    /// 单例导出
    pub fn singleton() -> Self {
        Self::new(LifetimeScope::Singleton)
    }

    /// 设置注册名称
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 显式指定能力
    pub fn with_capabilities(mut self, capabilities: Vec<CapabilityBinding>) -> Self {
        self.explicit_capabilities = Some(capabilities);
        self
    }

    /// 追加一个显式能力
    pub fn with_capability(mut self, capability: CapabilityBinding) -> Self {
        self.explicit_capabilities.get_or_insert_with(Vec::new).push(capability);
        self
    }
}

/// 导出描述
///
/// 能力集合在构造后非空，且不含重复能力。
#[derive(Clone)]
pub struct ExportDescriptor {
    /// 实现类型
    pub implementation: TypeInfo,
    /// 暴露的能力
    pub capabilities: Vec<CapabilityBinding>,
    /// 注册名称
    pub name: Option<String>,
    /// 生命周期
    pub lifetime: LifetimeScope,
    /// 构造函数
    pub constructor: Constructor,
    /// 实现自身的绑定
    pub self_binding: CapabilityBinding,
    /// 结构化释放能力
    pub disposer: Option<CapabilityBinding>,
    /// 来源插件单元
    pub origin: String,
}

impl ExportDescriptor {
    /// 能力名称列表
    pub fn capability_names(&self) -> Vec<String> {
        self.capabilities.iter().map(|c| c.capability().name.clone()).collect()
    }

    /// 是否暴露指定能力
    pub fn exposes<C: ?Sized + 'static>(&self) -> bool {
        self.capabilities.iter().any(CapabilityBinding::is::<C>)
    }
}

impl fmt::Debug for ExportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportDescriptor")
            .field("implementation", &self.implementation.name)
            .field("capabilities", &self.capability_names())
            .field("name", &self.name)
            .field("lifetime", &self.lifetime)
            .field("origin", &self.origin)
            .finish()
    }
}
