//! 注册表组合
//!
//! 按固定顺序执行八个阶段，每个阶段在本地批次中累积注册，
//! 合并进共享注册表后才开始下一阶段。任一阶段失败即中止，不发布部分注册表。

use crate::capabilities::{ForumEditor, ForumModule, LocatablePage, StartupService};
use crate::defaults::{register_general, register_membership, register_services, StartupInitializeDb};
use crate::events::register_event_bindings;
use crate::extractor::ExportExtractor;
use crate::settings::ForumSettings;
use chrono::{DateTime, Utc};
use di_abstractions::{ComponentBatch, ExportDescriptor, PluginAssembly, ScanReport};
use di_impl::{LifetimeScopeResolver, Registry};
use infrastructure_common::{is_structural_capability, ComponentError, LifetimeScope};
use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// 组合阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositionPhase {
    /// 1. 外部插件单元的注册模块
    ExternalModules,
    /// 2. 外部插件单元的动态导出
    ExternalExports,
    /// 3. 主程序集的动态导出
    PrimaryExports,
    /// 4. 通用绑定
    General,
    /// 5. 领域服务
    DomainServices,
    /// 6. 成员提供者
    Membership,
    /// 7. 启动服务
    StartupServices,
    /// 8. 论坛模块、编辑器和页面
    ForumModules,
}

impl CompositionPhase {
    /// 按执行顺序排列的全部阶段
    pub const ALL: [CompositionPhase; 8] = [
        Self::ExternalModules,
        Self::ExternalExports,
        Self::PrimaryExports,
        Self::General,
        Self::DomainServices,
        Self::Membership,
        Self::StartupServices,
        Self::ForumModules,
    ];

    /// 阶段序号，从 1 开始
    pub fn number(self) -> usize {
        self as usize + 1
    }

    /// 阶段标签
    pub fn label(self) -> &'static str {
        match self {
            Self::ExternalModules => "external-modules",
            Self::ExternalExports => "external-exports",
            Self::PrimaryExports => "primary-exports",
            Self::General => "general",
            Self::DomainServices => "domain-services",
            Self::Membership => "membership",
            Self::StartupServices => "startup-services",
            Self::ForumModules => "forum-modules",
        }
    }
}

impl fmt::Display for CompositionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 单个阶段的结果
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    /// 阶段
    pub phase: CompositionPhase,
    /// 新增注册数量
    pub registrations: usize,
    /// 成为默认的服务键数量
    pub new_defaults: usize,
    /// 被已有默认遮蔽的服务键数量
    pub shadowed: usize,
    /// 耗时（微秒）
    pub duration_us: u64,
}

/// 组合报告
#[derive(Debug, Clone, Serialize)]
pub struct CompositionReport {
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 参与组合的插件单元，按优先级降序
    pub assemblies: Vec<String>,
    /// 各阶段结果
    pub phases: Vec<PhaseReport>,
    /// 注册总数
    pub total_registrations: usize,
    /// 服务键总数
    pub service_count: usize,
}

impl CompositionReport {
    /// 指定阶段的结果
    pub fn phase(&self, phase: CompositionPhase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 注册表组合器
#[derive(Debug, Clone)]
pub struct RegistryComposer {
    settings: Arc<ForumSettings>,
    lifetimes: LifetimeScopeResolver,
    extractor: ExportExtractor,
    last_phase: CompositionPhase,
}

struct Units<'a> {
    primary: &'a Arc<PluginAssembly>,
    external: Vec<&'a Arc<PluginAssembly>>,
    all: &'a [Arc<PluginAssembly>],
    external_exports: Vec<ExportDescriptor>,
    primary_exports: Vec<ExportDescriptor>,
}

impl RegistryComposer {
    /// 创建组合器，默认执行全部阶段
    pub fn new(settings: Arc<ForumSettings>, lifetimes: LifetimeScopeResolver) -> Self {
        Self {
            settings,
            lifetimes,
            extractor: ExportExtractor::new(),
            last_phase: CompositionPhase::ForumModules,
        }
    }

    /// 只执行到指定阶段（含）
    pub fn through(mut self, phase: CompositionPhase) -> Self {
        self.last_phase = phase;
        self
    }

    /// 最后执行的阶段
    pub fn last_phase(&self) -> CompositionPhase {
        self.last_phase
    }

    /// 组合注册表
    ///
    /// 导出提取先于任何阶段完成，无效导出在第一个阶段开始前就中止组合。
    pub fn compose(&self, scan: &ScanReport) -> Result<(Registry, CompositionReport), ComponentError> {
        let started_at = Utc::now();
        let primary_name = self.settings.plugins.primary.as_str();
        let primary = scan
            .assemblies
            .iter()
            .find(|a| a.name() == primary_name)
            .ok_or_else(|| ComponentError::PrimaryAssemblyMissing {
                name: primary_name.to_string(),
            })?;
        let external: Vec<&Arc<PluginAssembly>> = scan.assemblies.iter().filter(|a| a.name() != primary_name).collect();

        let units = Units {
            external_exports: self.extractor.extract(external.iter().copied())?,
            primary_exports: self.extractor.extract_from(primary)?,
            primary,
            external,
            all: &scan.assemblies,
        };
        info!(
            "开始组合注册表: {} 个插件单元, {} 个外部导出, {} 个主程序集导出",
            units.all.len(),
            units.external_exports.len(),
            units.primary_exports.len()
        );

        let mut registry = Registry::new();
        let mut phases = Vec::new();
        for phase in CompositionPhase::ALL.into_iter().take_while(|p| *p <= self.last_phase) {
            let timer = Instant::now();
            let outcome = self
                .batch_for(phase, &units)
                .and_then(|batch| registry.merge(batch, phase.label(), &self.lifetimes))
                .map_err(|e| {
                    error!("组合阶段 {} 失败: {}", phase, e);
                    e.in_phase(phase.label())
                })?;

            let report = PhaseReport {
                phase,
                registrations: outcome.registrations,
                new_defaults: outcome.new_defaults,
                shadowed: outcome.shadowed,
                duration_us: u64::try_from(timer.elapsed().as_micros()).unwrap_or(u64::MAX),
            };
            debug!("阶段 {}. {} 完成: {:?}", phase.number(), phase, report);
            phases.push(report);
        }

        let report = CompositionReport {
            started_at,
            assemblies: units.all.iter().map(|a| a.name().to_string()).collect(),
            phases,
            total_registrations: registry.len(),
            service_count: registry.service_count(),
        };
        info!(
            "注册表组合完成: {} 个注册, {} 个服务",
            report.total_registrations, report.service_count
        );
        Ok((registry, report))
    }

    fn batch_for(&self, phase: CompositionPhase, units: &Units<'_>) -> Result<ComponentBatch, ComponentError> {
        let mut batch = ComponentBatch::new();
        match phase {
            CompositionPhase::ExternalModules => {
                for assembly in &units.external {
                    for module in assembly.modules() {
                        debug!("执行注册模块: {} ({})", module.name(), assembly.name());
                        module.configure(&mut batch).map_err(|e| ComponentError::ModuleFailed {
                            module: module.name().to_string(),
                            message: e.to_string(),
                        })?;
                    }
                }
            }
            CompositionPhase::ExternalExports => {
                for descriptor in &units.external_exports {
                    batch.register_descriptor(descriptor);
                }
            }
            CompositionPhase::PrimaryExports => {
                for descriptor in &units.primary_exports {
                    batch.register_descriptor(descriptor);
                }
            }
            CompositionPhase::General => {
                let extensions = units.all.iter().map(|a| a.info().clone()).collect();
                register_general(&mut batch, &self.settings, extensions);
            }
            CompositionPhase::DomainServices => {
                register_services(&mut batch);
                register_event_bindings(&mut batch);
            }
            CompositionPhase::Membership => register_membership(&mut batch),
            CompositionPhase::StartupServices => register_startup_services(&mut batch, units.primary),
            CompositionPhase::ForumModules => register_forum_modules(&mut batch, units.all),
        }
        Ok(batch)
    }
}

fn register_startup_services(batch: &mut ComponentBatch, primary: &PluginAssembly) {
    for plugin_type in primary.types() {
        let Some(binding) = plugin_type.binding_for(TypeId::of::<dyn StartupService>()) else {
            continue;
        };
        let spec = batch.register_type(plugin_type);
        spec.as_service(binding.clone()).with_lifetime(LifetimeScope::PerScope);
        if plugin_type.type_info().is::<StartupInitializeDb>() {
            spec.as_self();
        }
    }
}

fn register_forum_modules(batch: &mut ComponentBatch, assemblies: &[Arc<PluginAssembly>]) {
    for plugin_type in assemblies.iter().flat_map(|a| a.types()) {
        if let Some(binding) = plugin_type.binding_for(TypeId::of::<dyn ForumModule>()) {
            batch
                .register_type(plugin_type)
                .as_service(binding.clone())
                .with_lifetime(LifetimeScope::PerScope);
        }
        if let Some(binding) = plugin_type.binding_for(TypeId::of::<dyn ForumEditor>()) {
            batch
                .register_type(plugin_type)
                .as_service(binding.clone())
                .with_lifetime(LifetimeScope::PerScope);
        }
        if plugin_type.implements_capability::<dyn LocatablePage>() {
            let spec = batch.register_type(plugin_type);
            for binding in plugin_type
                .implemented_capabilities()
                .iter()
                .filter(|b| !is_structural_capability(b.capability().id))
            {
                spec.as_service(binding.clone());
            }
            spec.with_lifetime(LifetimeScope::Singleton);
        }
    }
}
