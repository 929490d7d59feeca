//! 插件扫描器实现
//!
//! - [`CatalogScanner`] 按名称模式匹配进程内目录中的插件单元
//! - [`DirectoryScanner`] 按文件名模式匹配插件目录中的清单文件，清单激活目录中的单元

use async_trait::async_trait;
use di_abstractions::{PluginAssembly, PluginCatalog, PluginScanner, ScanReport, SkippedUnit};
use glob::Pattern;
use infrastructure_common::ComponentError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn compile_pattern(pattern: &str) -> Result<Pattern, ComponentError> {
    Pattern::new(pattern).map_err(|e| ComponentError::ScanError {
        message: format!("无效的扫描模式 {pattern}: {e}"),
    })
}

fn primary_unit(catalog: &PluginCatalog, primary: &str) -> Result<Arc<PluginAssembly>, ComponentError> {
    catalog
        .get(primary)
        .cloned()
        .ok_or_else(|| ComponentError::PrimaryAssemblyMissing {
            name: primary.to_string(),
        })
}

/// 进程内目录扫描器
#[derive(Debug, Clone)]
pub struct CatalogScanner {
    catalog: Arc<PluginCatalog>,
    primary: String,
}

impl CatalogScanner {
    /// 创建扫描器，`primary` 为主程序集名称
    pub fn new(catalog: Arc<PluginCatalog>, primary: impl Into<String>) -> Self {
        Self {
            catalog,
            primary: primary.into(),
        }
    }
}

#[async_trait]
impl PluginScanner for CatalogScanner {
    async fn scan(&self, pattern: &str) -> Result<ScanReport, ComponentError> {
        let matcher = compile_pattern(pattern)?;
        primary_unit(&self.catalog, &self.primary)?;

        let found: Vec<Arc<PluginAssembly>> = self
            .catalog
            .iter()
            .filter(|assembly| assembly.name() == self.primary || matcher.matches(assembly.name()))
            .cloned()
            .collect();

        let report = ScanReport::ordered(found, Vec::new());
        info!("目录扫描完成: 模式 {}, 单元 {:?}", pattern, report.names());
        Ok(report)
    }

    fn name(&self) -> &str {
        "catalog"
    }
}

/// 插件清单
///
/// ```toml
/// assembly = "forum.greetings"
/// priority = 10
/// enabled = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    /// 激活的插件单元名称
    pub assembly: String,
    /// 覆盖单元声明的优先级
    #[serde(default)]
    pub priority: Option<i32>,
    /// 是否启用
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl PluginManifest {
    /// 读取并解析清单文件
    pub async fn load(path: &Path) -> Result<Self, String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("读取失败: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("解析失败: {e}"))
    }
}

/// 插件目录扫描器
///
/// 目录按文件名排序枚举，保证同优先级单元的顺序确定。
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    catalog: Arc<PluginCatalog>,
    directory: PathBuf,
    primary: String,
}

impl DirectoryScanner {
    /// 创建扫描器
    pub fn new(catalog: Arc<PluginCatalog>, directory: impl Into<PathBuf>, primary: impl Into<String>) -> Self {
        Self {
            catalog,
            directory: directory.into(),
            primary: primary.into(),
        }
    }

    /// 插件目录
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn matching_files(&self, matcher: &Pattern) -> Result<Vec<(String, PathBuf)>, ComponentError> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| ComponentError::ScanError {
                message: format!("无法读取插件目录 {}: {e}", self.directory.display()),
            })?;

        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(ComponentError::ScanError {
                        message: format!("枚举插件目录失败: {e}"),
                    })
                }
            };
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !matcher.matches(&file_name) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                files.push((file_name, entry.path()));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    fn activate(
        &self,
        manifest: &PluginManifest,
        found: &[Arc<PluginAssembly>],
        primary_configured: bool,
    ) -> Result<Activation, String> {
        // 主程序集总是被加载，清单只能调整它的优先级
        if manifest.assembly == self.primary {
            if primary_configured {
                return Err(format!("主程序集 {} 已由其他清单配置", self.primary));
            }
            if !manifest.enabled {
                warn!("主程序集不能被禁用, 忽略 enabled = false: {}", self.primary);
            }
            return Ok(Activation::Primary(with_manifest_priority(&found[0], manifest.priority)));
        }

        if !manifest.enabled {
            return Ok(Activation::Disabled);
        }
        let assembly = self
            .catalog
            .get(&manifest.assembly)
            .ok_or_else(|| format!("未知的插件单元 {}", manifest.assembly))?;
        if found.iter().any(|existing| existing.name() == assembly.name()) {
            return Err(format!("插件单元 {} 已被激活", assembly.name()));
        }
        Ok(Activation::Unit(with_manifest_priority(assembly, manifest.priority)))
    }
}

/// 清单的激活结果
enum Activation {
    Unit(Arc<PluginAssembly>),
    Primary(Arc<PluginAssembly>),
    Disabled,
}

fn with_manifest_priority(assembly: &Arc<PluginAssembly>, priority: Option<i32>) -> Arc<PluginAssembly> {
    match priority {
        Some(priority) if priority != assembly.priority() => {
            debug!("清单覆盖优先级: {} {} -> {}", assembly.name(), assembly.priority(), priority);
            Arc::new(assembly.as_ref().clone().with_priority(priority))
        }
        _ => Arc::clone(assembly),
    }
}

#[async_trait]
impl PluginScanner for DirectoryScanner {
    async fn scan(&self, pattern: &str) -> Result<ScanReport, ComponentError> {
        let matcher = compile_pattern(pattern)?;
        let mut found = vec![primary_unit(&self.catalog, &self.primary)?];
        let mut skipped = Vec::new();
        let mut primary_configured = false;

        if !tokio::fs::try_exists(&self.directory).await.unwrap_or(false) {
            warn!("插件目录不存在，仅加载主程序集: {}", self.directory.display());
            return Ok(ScanReport::ordered(found, skipped));
        }

        for (file_name, path) in self.matching_files(&matcher).await? {
            let activated = match PluginManifest::load(&path).await {
                Ok(manifest) => self.activate(&manifest, &found, primary_configured),
                Err(reason) => Err(reason),
            };
            match activated {
                Ok(Activation::Unit(assembly)) => {
                    debug!("激活插件单元: {} ({})", assembly.name(), file_name);
                    found.push(assembly);
                }
                Ok(Activation::Primary(primary)) => {
                    debug!("清单配置主程序集: {} ({})", primary.name(), file_name);
                    found[0] = primary;
                    primary_configured = true;
                }
                Ok(Activation::Disabled) => debug!("插件清单已禁用: {}", file_name),
                Err(reason) => {
                    warn!("跳过插件单元 {}: {}", file_name, reason);
                    skipped.push(SkippedUnit { unit: file_name, reason });
                }
            }
        }

        let report = ScanReport::ordered(found, skipped);
        info!(
            "插件目录扫描完成: {}, 单元 {:?}, 跳过 {} 个",
            self.directory.display(),
            report.names(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn name(&self) -> &str {
        "directory"
    }
}
