//! 导出提取
//!
//! 遍历插件单元中带导出标记的类型，为每个类型生成一个 [`ExportDescriptor`]。

use di_abstractions::{CapabilityBinding, ExportDescriptor, ExportMarker, PluginAssembly, PluginType};
use infrastructure_common::{structural_capabilities, ComponentError, Disposable};
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, trace};

/// 导出提取器
#[derive(Debug, Clone)]
pub struct ExportExtractor {
    excluded: Vec<TypeId>,
}

impl ExportExtractor {
    /// 默认排除结构化能力（释放、服务定位、本地化）
    pub fn new() -> Self {
        Self {
            excluded: structural_capabilities().to_vec(),
        }
    }

    /// 从一组插件单元提取导出描述，保持单元和类型的声明顺序
    pub fn extract<'a, I>(&self, assemblies: I) -> Result<Vec<ExportDescriptor>, ComponentError>
    where
        I: IntoIterator<Item = &'a Arc<PluginAssembly>>,
    {
        let mut descriptors = Vec::new();
        for assembly in assemblies {
            descriptors.extend(self.extract_from(assembly)?);
        }
        Ok(descriptors)
    }

    /// 从单个插件单元提取导出描述
    pub fn extract_from(&self, assembly: &PluginAssembly) -> Result<Vec<ExportDescriptor>, ComponentError> {
        let descriptors = assembly
            .types()
            .iter()
            .filter_map(|plugin_type| {
                let marker = plugin_type.export_marker()?;
                Some(self.describe(plugin_type, marker, assembly.name()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("插件单元 {} 导出 {} 个类型", assembly.name(), descriptors.len());
        Ok(descriptors)
    }

    fn describe(
        &self,
        plugin_type: &PluginType,
        marker: &ExportMarker,
        origin: &str,
    ) -> Result<ExportDescriptor, ComponentError> {
        let implementation = plugin_type.type_info();
        let capabilities = match marker.explicit_capabilities.as_deref() {
            Some(explicit) if !explicit.is_empty() => dedup(explicit.iter()),
            _ => dedup(
                plugin_type
                    .implemented_capabilities()
                    .iter()
                    .filter(|binding| !self.excluded.contains(&binding.capability().id)),
            ),
        };

        if capabilities.is_empty() {
            return Err(ComponentError::InvalidExport {
                type_name: implementation.name.clone(),
                message: "导出标记没有可解析的能力".to_string(),
            });
        }
        if let Some(foreign) = capabilities.iter().find(|b| b.implementation() != implementation) {
            return Err(ComponentError::InvalidExport {
                type_name: implementation.name.clone(),
                message: format!("能力 {} 绑定到了其他实现 {}", foreign.capability(), foreign.implementation()),
            });
        }

        trace!("导出 {} -> {:?}", implementation, capabilities);
        Ok(ExportDescriptor {
            implementation: implementation.clone(),
            capabilities,
            name: marker.name.clone(),
            lifetime: marker.lifetime,
            constructor: Arc::clone(plugin_type.constructor()),
            self_binding: plugin_type.self_binding().clone(),
            disposer: plugin_type.binding_for(TypeId::of::<dyn Disposable>()).cloned(),
            origin: origin.to_string(),
        })
    }
}

impl Default for ExportExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup<'a>(bindings: impl Iterator<Item = &'a CapabilityBinding>) -> Vec<CapabilityBinding> {
    let mut unique: Vec<CapabilityBinding> = Vec::new();
    for binding in bindings {
        if !unique.iter().any(|b| b.capability() == binding.capability()) {
            unique.push(binding.clone());
        }
    }
    unique
}
