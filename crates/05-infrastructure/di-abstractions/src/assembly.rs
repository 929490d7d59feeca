//! 插件单元模型
//!
//! 插件作者在代码中构造 [`PluginAssembly`]，声明其类型、导出标记和注册模块，
//! 并在加载时贡献给 [`PluginCatalog`]。

use crate::capability::CapabilityBinding;
use crate::export::ExportMarker;
use crate::factory::{erase_constructor, Constructor};
use crate::registry::RegistryModule;
use crate::resolver::ComponentResolver;
use crate::capability;
use infrastructure_common::{ComponentError, DependencyError, TypeInfo};
use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// 插件单元中声明的类型
#[derive(Clone)]
pub struct PluginType {
    type_info: TypeInfo,
    constructor: Constructor,
    self_binding: CapabilityBinding,
    implements: Vec<CapabilityBinding>,
    export: Option<ExportMarker>,
}

impl PluginType {
    /// 声明类型及其构造函数
    pub fn new<T, F>(constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut dyn ComponentResolver) -> Result<T, DependencyError> + Send + Sync + 'static,
    {
        Self {
            type_info: TypeInfo::of::<T>(),
            constructor: erase_constructor(constructor),
            self_binding: capability!(T),
            implements: Vec::new(),
            export: None,
        }
    }

    /// 声明实现的能力（接口集合）
    pub fn implements(mut self, binding: CapabilityBinding) -> Self {
        if !self.implements.iter().any(|b| b.capability() == binding.capability()) {
            self.implements.push(binding);
        }
        self
    }

    /// 附加导出标记
    pub fn exported(mut self, marker: ExportMarker) -> Self {
        self.export = Some(marker);
        self
    }

    /// 类型信息
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 构造函数
    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// 自身绑定
    pub fn self_binding(&self) -> &CapabilityBinding {
        &self.self_binding
    }

    /// 实现的能力
    pub fn implemented_capabilities(&self) -> &[CapabilityBinding] {
        &self.implements
    }

    /// 导出标记
    pub fn export_marker(&self) -> Option<&ExportMarker> {
        self.export.as_ref()
    }

    /// 查找指定能力的绑定
    pub fn binding_for(&self, capability: TypeId) -> Option<&CapabilityBinding> {
        self.implements.iter().find(|b| b.capability().id == capability)
    }

    /// 是否实现指定能力
    pub fn implements_capability<C: ?Sized + 'static>(&self) -> bool {
        self.binding_for(TypeId::of::<C>()).is_some()
    }
}

impl fmt::Debug for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginType")
            .field("type", &self.type_info.name)
            .field("implements", &self.implements)
            .field("exported", &self.export.is_some())
            .finish()
    }
}

/// 插件单元的描述信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyInfo {
    /// 名称
    pub name: String,
    /// 排序优先级，越大越先
    pub priority: i32,
    /// 描述
    pub description: String,
    /// 作者
    pub author: String,
}

/// 插件单元
#[derive(Clone)]
pub struct PluginAssembly {
    info: AssemblyInfo,
    types: Vec<PluginType>,
    modules: Vec<Arc<dyn RegistryModule>>,
}

impl PluginAssembly {
    /// 创建插件单元
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            info: AssemblyInfo {
                name: name.into(),
                priority,
                description: String::new(),
                author: String::new(),
            },
            types: Vec::new(),
            modules: Vec::new(),
        }
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    /// 设置作者
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.info.author = author.into();
        self
    }

    /// 添加类型
    pub fn with_type(mut self, plugin_type: PluginType) -> Self {
        self.types.push(plugin_type);
        self
    }

    /// 添加注册模块
    pub fn with_module(mut self, module: impl RegistryModule + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// 覆盖优先级（来自插件清单）
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.info.priority = priority;
        self
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// 优先级
    pub fn priority(&self) -> i32 {
        self.info.priority
    }

    /// 描述信息
    pub fn info(&self) -> &AssemblyInfo {
        &self.info
    }

    /// 声明的类型
    pub fn types(&self) -> &[PluginType] {
        &self.types
    }

    /// 注册模块
    pub fn modules(&self) -> &[Arc<dyn RegistryModule>] {
        &self.modules
    }
}

impl fmt::Debug for PluginAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginAssembly")
            .field("info", &self.info)
            .field("types", &self.types.len())
            .field("modules", &self.modules.iter().map(|m| m.name().to_string()).collect::<Vec<_>>())
            .finish()
    }
}

/// 进程内插件目录
///
/// 按贡献顺序保存插件单元，名称唯一。
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    assemblies: Vec<Arc<PluginAssembly>>,
}

impl PluginCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 贡献插件单元
    pub fn contribute(&mut self, assembly: PluginAssembly) -> Result<(), ComponentError> {
        if self.get(assembly.name()).is_some() {
            return Err(ComponentError::RegistrationError {
                type_name: assembly.name().to_string(),
                message: "插件单元名称重复".to_string(),
            });
        }
        self.assemblies.push(Arc::new(assembly));
        Ok(())
    }

    /// 链式贡献
    pub fn with(mut self, assembly: PluginAssembly) -> Result<Self, ComponentError> {
        self.contribute(assembly)?;
        Ok(self)
    }

    /// 按名称查找
    pub fn get(&self, name: &str) -> Option<&Arc<PluginAssembly>> {
        self.assemblies.iter().find(|a| a.name() == name)
    }

    /// 按贡献顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PluginAssembly>> {
        self.assemblies.iter()
    }

    /// 单元数量
    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}
