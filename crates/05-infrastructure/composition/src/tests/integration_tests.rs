//! 论坛基础设施生命周期集成测试

use crate::builder::ForumInfrastructureBuilder;
use crate::capabilities::{ForumModule, StartupService, EXTENSION_ASSEMBLIES};
use crate::defaults::{core_assembly, StartupInitializeDb};
use crate::events::{EventRaiser, ForumInitEvent, HandleEvent};
use crate::forum::{DbAccessProvider, StopWatch};
use crate::infrastructure::InfrastructureStatus;
use crate::settings::ForumSettings;
use async_trait::async_trait;
use di_abstractions::{capability, AssemblyInfo, ExportMarker, PluginAssembly, PluginCatalog, PluginType};
use di_impl::Scope;
use infrastructure_common::{BoxError, InfrastructureError};
use parking_lot::Mutex;
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init()
            .ok(); // 忽略初始化失败的错误
    });
}

fn builder() -> ForumInfrastructureBuilder {
    init_test_logger();
    ForumInfrastructureBuilder::new().with_settings(ForumSettings::default())
}

/// 记录执行顺序的启动服务
struct RecordingStartup {
    name: &'static str,
    priority: i32,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl StartupService for RecordingStartup {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn run(&self, _scope: &Scope) -> Result<(), BoxError> {
        self.log.lock().push(self.name);
        Ok(())
    }
}

struct AlwaysFails;

#[async_trait]
impl StartupService for AlwaysFails {
    fn name(&self) -> &str {
        "always-fails"
    }

    fn priority(&self) -> i32 {
        2000
    }

    async fn run(&self, _scope: &Scope) -> Result<(), BoxError> {
        Err("磁盘已满".into())
    }
}

struct GalleryModule;

impl ForumModule for GalleryModule {
    fn module_name(&self) -> &str {
        "Gallery"
    }

    fn init(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

fn gallery_plugin() -> PluginAssembly {
    PluginAssembly::new("forum.gallery", 10).with_type(
        PluginType::new::<GalleryModule, _>(|_| Ok(GalleryModule))
            .implements(capability!(GalleryModule => dyn ForumModule)),
    )
}

/// 测试构建并启动后数据库已初始化
#[tokio::test]
async fn test_build_and_start_initializes_database() {
    let infrastructure = builder().build().await.unwrap();
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Initialized);

    infrastructure.start().await.unwrap();
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Running);

    let metrics = infrastructure.get_metrics().await;
    assert_eq!(metrics.startup_services_run, 3);
    assert!(metrics.uptime().is_some());

    let initializer = infrastructure.resolve::<StartupInitializeDb>().unwrap();
    assert!(initializer.is_initialized());
    assert!(infrastructure.resolve::<dyn DbAccessProvider>().unwrap().is_initialized());
}

/// 测试启动服务按优先级降序执行，同优先级保持注册顺序
#[tokio::test]
async fn test_startup_services_run_by_priority() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut primary = core_assembly();
    for (name, priority) in [("low", -5), ("first-tie", 700), ("second-tie", 700), ("top", 5000)] {
        let log = Arc::clone(&log);
        primary = primary.with_type(
            PluginType::new::<RecordingStartup, _>(move |_| {
                Ok(RecordingStartup {
                    name,
                    priority,
                    log: Arc::clone(&log),
                })
            })
            .implements(capability!(RecordingStartup => dyn StartupService)),
        );
    }
    let catalog = PluginCatalog::new().with(primary).unwrap();

    let infrastructure = builder().with_catalog(catalog).build().await.unwrap();
    infrastructure.start().await.unwrap();

    assert_eq!(*log.lock(), vec!["top", "first-tie", "second-tie", "low"]);
    assert_eq!(infrastructure.get_metrics().await.startup_services_run, 7);
}

/// 测试启动服务失败时状态变为 Failed
#[tokio::test]
async fn test_failing_startup_service_marks_failed() {
    let primary = core_assembly().with_type(
        PluginType::new::<AlwaysFails, _>(|_| Ok(AlwaysFails))
            .implements(capability!(AlwaysFails => dyn StartupService)),
    );
    let catalog = PluginCatalog::new().with(primary).unwrap();
    let infrastructure = builder().with_catalog(catalog).build().await.unwrap();

    let err = infrastructure.start().await.unwrap_err();
    match err {
        InfrastructureError::StartupServiceFailed { service, .. } => assert_eq!(service, "always-fails"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Failed);
    // 最高优先级失败，数据库初始化不会执行
    assert!(!infrastructure.resolve::<dyn DbAccessProvider>().unwrap().is_initialized());
}

/// 测试同一请求内的嵌套作用域共享计时器
#[tokio::test]
async fn test_request_scope_shares_stopwatch() {
    let infrastructure = builder().build().await.unwrap();
    infrastructure.start().await.unwrap();

    let request = infrastructure.begin_request("GET /topics");
    let inner = request.begin_scope("render");
    let outer_watch = request.resolve::<dyn StopWatch>().unwrap();
    let inner_watch = inner.resolve::<dyn StopWatch>().unwrap();
    assert!(Arc::ptr_eq(&outer_watch, &inner_watch));

    let other = infrastructure.begin_request("GET /forum");
    let other_watch = other.resolve::<dyn StopWatch>().unwrap();
    assert!(!Arc::ptr_eq(&outer_watch, &other_watch));

    inner.dispose();
    request.dispose();
    other.dispose();
}

/// 测试论坛模块按排序初始化，插件模块也参与
#[tokio::test]
async fn test_forum_modules_initialized_in_sort_order() {
    let infrastructure = builder().with_plugin(gallery_plugin()).build().await.unwrap();
    infrastructure.start().await.unwrap();

    let request = infrastructure.begin_request("modules");
    let initialized = infrastructure.initialize_forum_modules(&request).unwrap();
    assert_eq!(initialized, vec!["Gallery".to_string(), "Mobile Theme Module".to_string()]);

    let extensions = infrastructure
        .resolve_named::<Vec<AssemblyInfo>>(EXTENSION_ASSEMBLIES)
        .unwrap();
    let names: Vec<&str> = extensions.iter().map(|info| info.name.as_str()).collect();
    assert_eq!(names, vec!["forum.gallery", "forum.core"]);
}

/// 测试重新组合替换容器并释放旧容器
#[tokio::test]
async fn test_reload_swaps_container() {
    let infrastructure = builder().build().await.unwrap();
    infrastructure.start().await.unwrap();
    let before = infrastructure.container();

    infrastructure.reload().await.unwrap();
    let after = infrastructure.container();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(before.root().is_disposed());
    assert!(!after.root().is_disposed());

    let metrics = infrastructure.get_metrics().await;
    assert_eq!(metrics.reload_count, 1);
    assert_eq!(metrics.startup_services_run, 6);
    assert_eq!(metrics.registrations, infrastructure.report().total_registrations);
}

fn catalog_with_recorder(log: &Arc<Mutex<Vec<&'static str>>>) -> PluginCatalog {
    let log = Arc::clone(log);
    let primary = core_assembly().with_type(
        PluginType::new::<RecordingStartup, _>(move |_| {
            Ok(RecordingStartup {
                name: "seed-board",
                priority: 10,
                log: Arc::clone(&log),
            })
        })
        .implements(capability!(RecordingStartup => dyn StartupService)),
    );
    PluginCatalog::new().with(primary).unwrap()
}

/// 测试重复启动不会再次执行启动服务
#[tokio::test]
async fn test_start_twice_runs_startup_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let infrastructure = builder().with_catalog(catalog_with_recorder(&log)).build().await.unwrap();

    infrastructure.start().await.unwrap();
    infrastructure.start().await.unwrap();

    assert_eq!(*log.lock(), vec!["seed-board"]);
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Running);
    assert_eq!(infrastructure.get_metrics().await.startup_services_run, 4);
}

/// 测试重新组合后再启动不会在新容器上重复执行
#[tokio::test]
async fn test_start_after_reload_skips_started_container() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let infrastructure = builder().with_catalog(catalog_with_recorder(&log)).build().await.unwrap();

    infrastructure.reload().await.unwrap();
    assert_eq!(log.lock().len(), 1);

    infrastructure.start().await.unwrap();
    assert_eq!(*log.lock(), vec!["seed-board"]);
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Running);
    assert!(infrastructure.get_metrics().await.start_time.is_some());
}

/// 测试启动失败后可以再次启动
#[tokio::test]
async fn test_start_retries_after_failure() {
    let primary = core_assembly().with_type(
        PluginType::new::<AlwaysFails, _>(|_| Ok(AlwaysFails))
            .implements(capability!(AlwaysFails => dyn StartupService)),
    );
    let catalog = PluginCatalog::new().with(primary).unwrap();
    let infrastructure = builder().with_catalog(catalog).build().await.unwrap();

    assert!(infrastructure.start().await.is_err());
    assert!(infrastructure.start().await.is_err());
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Failed);
}

/// 记录初始化事件的处理器
struct WelcomeBanner {
    label: &'static str,
    order: i32,
    log: Arc<Mutex<Vec<String>>>,
}

impl HandleEvent<ForumInitEvent> for WelcomeBanner {
    fn order(&self) -> i32 {
        self.order
    }

    fn handle(&self, event: &ForumInitEvent) -> Result<(), BoxError> {
        self.log
            .lock()
            .push(format!("{}:{}:{}", self.label, event.board_name, event.startup_services));
        Ok(())
    }
}

fn banner_plugin(log: &Arc<Mutex<Vec<String>>>) -> PluginAssembly {
    let mut plugin = PluginAssembly::new("forum.banner", 3);
    for (label, order) in [("late", 50), ("early", -1)] {
        let log = Arc::clone(log);
        plugin = plugin.with_type(
            PluginType::new::<WelcomeBanner, _>(move |_| {
                Ok(WelcomeBanner {
                    label,
                    order,
                    log: Arc::clone(&log),
                })
            })
            .implements(capability!(WelcomeBanner => dyn HandleEvent<ForumInitEvent>))
            .exported(ExportMarker::singleton()),
        );
    }
    plugin
}

/// 测试启动后分发初始化事件，请求作用域内也可分发
#[tokio::test]
async fn test_start_raises_init_event() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let infrastructure = builder().with_plugin(banner_plugin(&log)).build().await.unwrap();

    infrastructure.start().await.unwrap();
    assert_eq!(*log.lock(), vec!["early:Forum:3", "late:Forum:3"]);

    let binding = infrastructure
        .bindings()
        .into_iter()
        .find(|b| b.service.contains("EventRaiser"))
        .unwrap();
    assert_eq!(binding.phase, "domain-services");

    let request = infrastructure.begin_request("GET /");
    let raiser = request.resolve::<EventRaiser>().unwrap();
    let handled = raiser
        .raise(&ForumInitEvent {
            board_name: "Manual".to_string(),
            startup_services: 0,
            raised_at: chrono::Utc::now(),
        })
        .unwrap();
    assert_eq!(handled, 2);
    assert_eq!(log.lock().len(), 4);
    request.dispose();
}

/// 测试停止后不能重新组合
#[tokio::test]
async fn test_stop_disposes_and_blocks_reload() {
    let infrastructure = builder().build().await.unwrap();
    infrastructure.start().await.unwrap();
    infrastructure.stop().await.unwrap();

    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Stopped);
    assert!(infrastructure.container().root().is_disposed());
    assert!(infrastructure.get_metrics().await.stop_time.is_some());

    let err = infrastructure.reload().await.unwrap_err();
    assert!(matches!(err, InfrastructureError::InvalidState { .. }));
    let err = infrastructure.start().await.unwrap_err();
    assert!(matches!(err, InfrastructureError::InvalidState { .. }));
}

/// 测试绑定摘要覆盖所有服务键
#[tokio::test]
async fn test_bindings_cover_every_service() {
    let infrastructure = builder().build().await.unwrap();
    let bindings = infrastructure.bindings();
    assert_eq!(bindings.len(), infrastructure.report().service_count);
    assert!(bindings.iter().any(|b| b.phase == "startup-services"));
    assert_eq!(infrastructure.scan_report().names(), vec!["forum.core"]);
}
