//! 论坛基础设施主入口

use crate::builder::ForumInfrastructureBuilder;
use crate::capabilities::{ForumModule, StartupService};
use crate::composer::{CompositionReport, RegistryComposer};
use crate::events::{EventRaiser, ForumInitEvent};
use crate::settings::ForumSettings;
use di_abstractions::{PluginCatalog, PluginScanner, ResolveOptions, ScanReport};
use di_impl::{BindingSummary, Container, Scope};
use infrastructure_common::{ComponentError, InfrastructureError};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// 一次组合的产物
struct Composed {
    container: Arc<Container>,
    report: Arc<CompositionReport>,
    scan: Arc<ScanReport>,
    /// 启动服务是否已在该容器上执行
    started: AtomicBool,
}

/// 论坛基础设施
///
/// 持有组合完成的容器。启动服务在 `start` 中按优先级执行，
/// `reload` 会重新扫描并组合出新容器，成功后才替换旧容器。
pub struct ForumInfrastructure {
    /// 生效的配置
    settings: Arc<ForumSettings>,
    /// 插件目录
    catalog: Arc<PluginCatalog>,
    /// 插件扫描器
    scanner: Arc<dyn PluginScanner>,
    /// 注册表组合器
    composer: RegistryComposer,
    /// 解析选项
    options: ResolveOptions,
    /// 当前容器
    state: parking_lot::RwLock<Composed>,
    /// 运行状态
    status: Arc<RwLock<InfrastructureStatus>>,
    /// 统计信息
    metrics: Arc<RwLock<InfrastructureMetrics>>,
}

impl ForumInfrastructure {
    /// 创建基础设施构建器
    pub fn builder() -> ForumInfrastructureBuilder {
        ForumInfrastructureBuilder::new()
    }

    /// 扫描并组合，得到处于 `Initialized` 状态的基础设施
    pub(crate) async fn compose(
        settings: Arc<ForumSettings>,
        catalog: Arc<PluginCatalog>,
        scanner: Arc<dyn PluginScanner>,
        composer: RegistryComposer,
        options: ResolveOptions,
    ) -> Result<Self, InfrastructureError> {
        let state = Self::compose_state(&settings, scanner.as_ref(), &composer, &options).await?;
        let metrics = InfrastructureMetrics {
            registrations: state.report.total_registrations,
            services: state.report.service_count,
            ..InfrastructureMetrics::default()
        };
        Ok(Self {
            settings,
            catalog,
            scanner,
            composer,
            options,
            state: parking_lot::RwLock::new(state),
            status: Arc::new(RwLock::new(InfrastructureStatus::Initialized)),
            metrics: Arc::new(RwLock::new(metrics)),
        })
    }

    async fn compose_state(
        settings: &ForumSettings,
        scanner: &dyn PluginScanner,
        composer: &RegistryComposer,
        options: &ResolveOptions,
    ) -> Result<Composed, InfrastructureError> {
        let pattern = settings.plugins.effective_pattern();
        info!("扫描插件单元: 扫描器 {}, 模式 {}", scanner.name(), pattern);
        let scan = scanner.scan(pattern).await?;
        let (registry, report) = composer.compose(&scan)?;
        let container = Container::with_options(registry, options.clone());
        Ok(Composed {
            container: Arc::new(container),
            report: Arc::new(report),
            scan: Arc::new(scan),
            started: AtomicBool::new(false),
        })
    }

    /// 按优先级降序执行启动服务，返回执行数量
    ///
    /// 全部成功后分发 [`ForumInitEvent`]。
    async fn run_startup(container: &Container, settings: &ForumSettings) -> Result<usize, InfrastructureError> {
        let scope = container.begin_scope("startup");
        let result = Self::run_startup_in(&scope, settings).await;
        scope.dispose();
        result
    }

    async fn run_startup_in(scope: &Scope, settings: &ForumSettings) -> Result<usize, InfrastructureError> {
        let mut services = scope.resolve_all::<dyn StartupService>()?;
        // 稳定排序，同优先级保持注册顺序
        services.sort_by_key(|service| Reverse(service.priority()));

        for service in &services {
            debug!("执行启动服务: {} (优先级 {})", service.name(), service.priority());
            if let Err(source) = service.run(scope).await {
                error!("启动服务失败: {}: {}", service.name(), source);
                return Err(InfrastructureError::StartupServiceFailed {
                    service: service.name().to_string(),
                    source,
                });
            }
        }

        // 只组合到领域服务之前时没有分发器
        if let Some(raiser) = scope.try_resolve::<EventRaiser>()? {
            let handled = raiser.raise(&ForumInitEvent {
                board_name: settings.board.name.clone(),
                startup_services: services.len(),
                raised_at: chrono::Utc::now(),
            })?;
            debug!("初始化事件已分发: {} 个处理器", handled);
        }
        Ok(services.len())
    }

    async fn set_status(&self, status: InfrastructureStatus) {
        *self.status.write().await = status;
    }

    /// 启动基础设施
    ///
    /// 每个容器上的启动服务只执行一次；容器已由 `reload` 启动过时只更新状态。
    pub async fn start(&self) -> Result<(), InfrastructureError> {
        let status = self.get_status().await;
        if matches!(status, InfrastructureStatus::Stopping | InfrastructureStatus::Stopped) {
            return Err(InfrastructureError::InvalidState {
                message: format!("基础设施已停止, 无法启动: {status:?}"),
            });
        }
        let (container, already_started) = {
            let state = self.state.read();
            (Arc::clone(&state.container), state.started.swap(true, Ordering::SeqCst))
        };
        if already_started {
            warn!("当前容器的启动服务已执行, 跳过");
            if status == InfrastructureStatus::Starting {
                return Ok(());
            }
            {
                let mut metrics = self.metrics.write().await;
                metrics.start_time.get_or_insert_with(chrono::Utc::now);
                metrics.stop_time = None;
            }
            self.set_status(InfrastructureStatus::Running).await;
            return Ok(());
        }

        info!("启动论坛基础设施");
        self.set_status(InfrastructureStatus::Starting).await;

        let count = match Self::run_startup(&container, &self.settings).await {
            Ok(count) => count,
            Err(e) => {
                // 失败后允许再次启动同一容器
                {
                    let state = self.state.read();
                    if Arc::ptr_eq(&state.container, &container) {
                        state.started.store(false, Ordering::SeqCst);
                    }
                }
                self.set_status(InfrastructureStatus::Failed).await;
                return Err(e);
            }
        };

        {
            let mut metrics = self.metrics.write().await;
            metrics.start_time = Some(chrono::Utc::now());
            metrics.stop_time = None;
            metrics.startup_services_run += count;
        }
        self.set_status(InfrastructureStatus::Running).await;

        info!("论坛基础设施启动完成, 执行了 {} 个启动服务", count);
        Ok(())
    }

    /// 开始一个请求，返回逻辑上下文作用域
    pub fn begin_request(&self, name: &str) -> Scope {
        self.container().begin_logical_context(name)
    }

    /// 从根作用域解析默认实现
    pub fn resolve<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, InfrastructureError> {
        Ok(self.container().resolve::<C>()?)
    }

    /// 按名称从根作用域解析
    pub fn resolve_named<C: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<C>, InfrastructureError> {
        Ok(self.container().resolve_named::<C>(name)?)
    }

    /// 在给定作用域内按排序初始化论坛模块
    pub fn initialize_forum_modules(&self, scope: &Scope) -> Result<Vec<String>, InfrastructureError> {
        let mut modules = scope.resolve_all::<dyn ForumModule>()?;
        modules.sort_by_key(|module| module.sort_order());

        let mut initialized = Vec::with_capacity(modules.len());
        for module in &modules {
            module.init().map_err(|e| ComponentError::ModuleFailed {
                module: module.module_name().to_string(),
                message: e.to_string(),
            })?;
            debug!("论坛模块已初始化: {}", module.module_name());
            initialized.push(module.module_name().to_string());
        }
        Ok(initialized)
    }

    /// 当前容器
    pub fn container(&self) -> Arc<Container> {
        Arc::clone(&self.state.read().container)
    }

    /// 当前绑定摘要
    pub fn bindings(&self) -> Vec<BindingSummary> {
        self.container().registry().describe()
    }

    /// 最近一次组合的报告
    pub fn report(&self) -> Arc<CompositionReport> {
        Arc::clone(&self.state.read().report)
    }

    /// 最近一次扫描的结果
    pub fn scan_report(&self) -> Arc<ScanReport> {
        Arc::clone(&self.state.read().scan)
    }

    /// 生效的配置
    pub fn settings(&self) -> &Arc<ForumSettings> {
        &self.settings
    }

    /// 插件目录
    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    /// 重新扫描并组合
    ///
    /// 新容器执行完启动服务后才替换旧容器；任一步失败时保留旧容器。
    pub async fn reload(&self) -> Result<(), InfrastructureError> {
        let status = self.get_status().await;
        if matches!(status, InfrastructureStatus::Stopping | InfrastructureStatus::Stopped) {
            return Err(InfrastructureError::InvalidState {
                message: format!("基础设施已停止, 无法重新组合: {status:?}"),
            });
        }
        info!("重新组合论坛基础设施");

        let next = Self::compose_state(&self.settings, self.scanner.as_ref(), &self.composer, &self.options).await?;
        let count = match Self::run_startup(&next.container, &self.settings).await {
            Ok(count) => count,
            Err(e) => {
                warn!("新容器启动失败, 保留当前容器: {}", e);
                next.container.dispose();
                return Err(e);
            }
        };
        next.started.store(true, Ordering::SeqCst);

        let registrations = next.report.total_registrations;
        let services = next.report.service_count;
        let previous = std::mem::replace(&mut *self.state.write(), next);
        previous.container.dispose();

        {
            let mut metrics = self.metrics.write().await;
            metrics.reload_count += 1;
            metrics.startup_services_run += count;
            metrics.registrations = registrations;
            metrics.services = services;
        }

        info!("重新组合完成: {} 个注册, {} 个服务", registrations, services);
        Ok(())
    }

    /// 停止基础设施并释放容器
    pub async fn stop(&self) -> Result<(), InfrastructureError> {
        info!("停止论坛基础设施");
        self.set_status(InfrastructureStatus::Stopping).await;

        self.container().dispose();

        self.set_status(InfrastructureStatus::Stopped).await;
        self.metrics.write().await.stop_time = Some(chrono::Utc::now());

        info!("论坛基础设施停止完成");
        Ok(())
    }

    /// 获取运行状态
    pub async fn get_status(&self) -> InfrastructureStatus {
        *self.status.read().await
    }

    /// 获取统计信息
    pub async fn get_metrics(&self) -> InfrastructureMetrics {
        self.metrics.read().await.clone()
    }
}

/// 基础设施运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfrastructureStatus {
    /// 已组合，尚未启动
    Initialized,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 失败
    Failed,
}

/// 基础设施统计信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfrastructureMetrics {
    /// 启动时间
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 停止时间
    pub stop_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 当前注册数量
    pub registrations: usize,
    /// 当前服务键数量
    pub services: usize,
    /// 累计执行的启动服务
    pub startup_services_run: usize,
    /// 重新组合次数
    pub reload_count: u64,
}

impl InfrastructureMetrics {
    /// 计算运行时间
    pub fn uptime(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => Some(stop - start),
            (Some(start), None) => Some(chrono::Utc::now() - start),
            _ => None,
        }
    }
}
