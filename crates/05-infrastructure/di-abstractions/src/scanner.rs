//! 插件扫描器抽象接口
//!
//! 按命名模式定位插件单元，并按声明的优先级降序排列。

use crate::assembly::PluginAssembly;
use async_trait::async_trait;
use infrastructure_common::ComponentError;
use std::sync::Arc;

/// 插件扫描器 trait
#[async_trait]
pub trait PluginScanner: Send + Sync {
    /// 扫描与模式匹配的插件单元
    async fn scan(&self, pattern: &str) -> Result<ScanReport, ComponentError>;

    /// 获取扫描器名称
    fn name(&self) -> &str;
}

/// 被跳过的插件单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    /// 单元标识（文件名或目录名）
    pub unit: String,
    /// 跳过原因
    pub reason: String,
}

/// 扫描结果
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// 按优先级降序排列的插件单元，同优先级保持发现顺序
    pub assemblies: Vec<Arc<PluginAssembly>>,
    /// 无法加载而被跳过的单元
    pub skipped: Vec<SkippedUnit>,
}

impl ScanReport {
    /// 由发现顺序的单元构造，完成稳定排序
    pub fn ordered(mut assemblies: Vec<Arc<PluginAssembly>>, skipped: Vec<SkippedUnit>) -> Self {
        assemblies.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self { assemblies, skipped }
    }

    /// 单元名称（按顺序）
    pub fn names(&self) -> Vec<&str> {
        self.assemblies.iter().map(|a| a.name()).collect()
    }
}
