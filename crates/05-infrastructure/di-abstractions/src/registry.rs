//! 组件注册批次抽象
//!
//! 每个组合阶段在本地批次 [`ComponentBatch`] 中累积注册，阶段结束后整体合并进注册表。

use crate::assembly::PluginType;
use crate::capability::CapabilityBinding;
use crate::export::ExportDescriptor;
use crate::factory::{erase_constructor, instance_constructor, Constructor};
use crate::resolver::ComponentResolver;
use crate::capability;
use infrastructure_common::{ComponentError, DependencyError, Disposable, LifetimeScope, TypeInfo};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// 服务键：能力 + 可选名称
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    /// 能力类型
    pub capability: TypeInfo,
    /// 注册名称，`None` 表示按裸能力注册
    pub name: Option<String>,
}

impl ServiceKey {
    /// 裸能力键
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            capability: TypeInfo::of::<C>(),
            name: None,
        }
    }

    /// 命名能力键
    pub fn named<C: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            capability: TypeInfo::of::<C>(),
            name: Some(name.into()),
        }
    }

    /// 从绑定和名称构造
    pub fn for_binding(binding: &CapabilityBinding, name: Option<&str>) -> Self {
        Self {
            capability: binding.capability().clone(),
            name: name.map(str::to_string),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[{}]", self.capability, name),
            None => write!(f, "{}", self.capability),
        }
    }
}

/// 一条服务绑定：在键下以某个能力投影实例
#[derive(Debug, Clone)]
pub struct ServiceBinding {
    /// 服务键
    pub key: ServiceKey,
    /// 能力投影
    pub binding: CapabilityBinding,
}

/// 单个组件的注册声明
#[derive(Clone)]
pub struct RegistrationSpec {
    implementation: TypeInfo,
    constructor: Constructor,
    self_binding: CapabilityBinding,
    services: Vec<ServiceBinding>,
    lifetime: LifetimeScope,
    disposer: Option<CapabilityBinding>,
}

impl RegistrationSpec {
    fn new(implementation: TypeInfo, constructor: Constructor, self_binding: CapabilityBinding) -> Self {
        Self {
            implementation,
            constructor,
            self_binding,
            services: Vec::new(),
            lifetime: LifetimeScope::PerDependency,
            disposer: None,
        }
    }

    /// 以裸能力暴露
    pub fn as_service(&mut self, binding: CapabilityBinding) -> &mut Self {
        self.push(ServiceKey::for_binding(&binding, None), binding)
    }

    /// 以命名能力暴露
    pub fn as_named(&mut self, name: impl Into<String>, binding: CapabilityBinding) -> &mut Self {
        let name = name.into();
        self.push(ServiceKey::for_binding(&binding, Some(&name)), binding)
    }

    /// 以实现类型自身暴露
    pub fn as_self(&mut self) -> &mut Self {
        let binding = self.self_binding.clone();
        self.as_service(binding)
    }

    /// 设置生命周期
    pub fn with_lifetime(&mut self, lifetime: LifetimeScope) -> &mut Self {
        self.lifetime = lifetime;
        self
    }

    /// 设置释放能力，作用域结束时通过它释放实例
    pub fn disposed_with(&mut self, binding: CapabilityBinding) -> &mut Self {
        self.disposer = Some(binding);
        self
    }

    fn push(&mut self, key: ServiceKey, binding: CapabilityBinding) -> &mut Self {
        if !self.services.iter().any(|existing| existing.key == key) {
            self.services.push(ServiceBinding { key, binding });
        }
        self
    }

    /// 实现类型
    pub fn implementation(&self) -> &TypeInfo {
        &self.implementation
    }

    /// 构造函数
    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// 暴露的服务绑定；未声明任何服务时以自身暴露
    pub fn services(&self) -> Vec<ServiceBinding> {
        if self.services.is_empty() {
            vec![ServiceBinding {
                key: ServiceKey::for_binding(&self.self_binding, None),
                binding: self.self_binding.clone(),
            }]
        } else {
            self.services.clone()
        }
    }

    /// 生命周期
    pub fn lifetime(&self) -> LifetimeScope {
        self.lifetime
    }

    /// 释放能力
    pub fn disposer(&self) -> Option<&CapabilityBinding> {
        self.disposer.as_ref()
    }

    /// 校验绑定都属于该实现类型
    pub fn validate(&self) -> Result<(), ComponentError> {
        let foreign = self
            .services
            .iter()
            .map(|service| &service.binding)
            .chain(self.disposer.iter())
            .find(|binding| binding.implementation() != &self.implementation);

        match foreign {
            Some(binding) => Err(ComponentError::RegistrationError {
                type_name: self.implementation.name.clone(),
                message: format!(
                    "能力 {} 的绑定声明于其他实现 {}",
                    binding.capability(),
                    binding.implementation()
                ),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RegistrationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationSpec")
            .field("implementation", &self.implementation.name)
            .field("services", &self.services.iter().map(|s| s.key.to_string()).collect::<Vec<_>>())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// 组件注册批次
///
/// 类似容器构建器：只收集声明，不做任何实例化。
#[derive(Debug, Default)]
pub struct ComponentBatch {
    specs: Vec<RegistrationSpec>,
}

impl ComponentBatch {
    /// 创建空批次
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类型及其构造函数
    pub fn register<T, F>(&mut self, constructor: F) -> &mut RegistrationSpec
    where
        T: Send + Sync + 'static,
        F: Fn(&mut dyn ComponentResolver) -> Result<T, DependencyError> + Send + Sync + 'static,
    {
        let spec = RegistrationSpec::new(TypeInfo::of::<T>(), erase_constructor(constructor), capability!(T));
        self.push(spec)
    }

    /// 注册现成实例，默认单例
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) -> &mut RegistrationSpec {
        let spec = RegistrationSpec::new(TypeInfo::of::<T>(), instance_constructor(instance), capability!(T));
        let spec = self.push(spec);
        spec.with_lifetime(LifetimeScope::Singleton);
        spec
    }

    /// 按导出描述注册
    pub fn register_descriptor(&mut self, descriptor: &ExportDescriptor) -> &mut RegistrationSpec {
        let mut spec = RegistrationSpec::new(
            descriptor.implementation.clone(),
            Arc::clone(&descriptor.constructor),
            descriptor.self_binding.clone(),
        );
        spec.lifetime = descriptor.lifetime;
        spec.disposer = descriptor.disposer.clone();
        for binding in &descriptor.capabilities {
            match &descriptor.name {
                Some(name) => spec.as_named(name.clone(), binding.clone()),
                None => spec.as_service(binding.clone()),
            };
        }
        self.push(spec)
    }

    /// 按插件单元中声明的类型注册，尚未暴露任何服务
    ///
    /// 类型实现了 [`Disposable`] 时自动设置释放能力。
    pub fn register_type(&mut self, plugin_type: &PluginType) -> &mut RegistrationSpec {
        let mut spec = RegistrationSpec::new(
            plugin_type.type_info().clone(),
            Arc::clone(plugin_type.constructor()),
            plugin_type.self_binding().clone(),
        );
        spec.disposer = plugin_type.binding_for(TypeId::of::<dyn Disposable>()).cloned();
        self.push(spec)
    }

    fn push(&mut self, spec: RegistrationSpec) -> &mut RegistrationSpec {
        self.specs.push(spec);
        let last = self.specs.len() - 1;
        &mut self.specs[last]
    }

    /// 批次中的注册声明
    pub fn specs(&self) -> &[RegistrationSpec] {
        &self.specs
    }

    /// 取出全部注册声明
    pub fn into_specs(self) -> Vec<RegistrationSpec> {
        self.specs
    }

    /// 注册数量
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// 注册模块
///
/// 插件单元提供的命令式注册逻辑，在外部模块阶段执行。
pub trait RegistryModule: Send + Sync {
    /// 模块名称
    fn name(&self) -> &str;

    /// 向批次添加注册
    fn configure(&self, registry: &mut ComponentBatch) -> Result<(), ComponentError>;
}
