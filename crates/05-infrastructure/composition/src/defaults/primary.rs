//! 主程序集 `forum.core`
//!
//! 启动服务、内置论坛模块、编辑器和页面，以及导出的用户显示名服务。

use crate::capabilities::{ForumEditor, ForumModule, LocatablePage, StartupService};
use crate::forum::{DbAccessProvider, LocalizationProvider, MembershipProvider, ReplaceRulesProvider, UserDisplayName};
use crate::settings::ForumSettings;
use async_trait::async_trait;
use caching_abstractions::{keys, DataCache, DataCacheExt, TreatCacheKey};
use di_abstractions::{capability, ExportMarker, PluginAssembly, PluginType, ResolverExt};
use di_impl::Scope;
use infrastructure_common::{BoxError, CacheError, Disposable, HaveLocalization, LifetimeScope};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// 主程序集名称
pub const CORE_ASSEMBLY: &str = "forum.core";

/// 数据库初始化，最先执行的启动服务
pub struct StartupInitializeDb {
    db: Arc<dyn DbAccessProvider>,
}

impl StartupInitializeDb {
    /// 数据库是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.db.is_initialized()
    }
}

#[async_trait]
impl StartupService for StartupInitializeDb {
    fn name(&self) -> &str {
        "initialize-db"
    }

    fn priority(&self) -> i32 {
        1000
    }

    async fn run(&self, _scope: &Scope) -> Result<(), BoxError> {
        if self.db.is_initialized() {
            debug!("数据库已初始化，跳过");
            return Ok(());
        }
        info!(
            "初始化数据库: 提供者 {}, 连接 {}",
            self.db.provider_name(),
            self.db.connection_string().unwrap_or("<内存>")
        );
        self.db.mark_initialized();
        Ok(())
    }
}

/// 加载本地化资源
#[derive(Debug, Default)]
pub struct StartupLoadLocalization;

#[async_trait]
impl StartupService for StartupLoadLocalization {
    fn name(&self) -> &str {
        "load-localization"
    }

    fn priority(&self) -> i32 {
        500
    }

    async fn run(&self, scope: &Scope) -> Result<(), BoxError> {
        let localization = scope.resolve::<dyn LocalizationProvider>()?;
        info!("加载本地化资源: {}", localization.culture());
        Ok(())
    }
}

/// 预热默认标志组合的替换规则
#[derive(Debug, Default)]
pub struct StartupWarmReplaceRules;

#[async_trait]
impl StartupService for StartupWarmReplaceRules {
    fn name(&self) -> &str {
        "warm-replace-rules"
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn run(&self, scope: &Scope) -> Result<(), BoxError> {
        let provider = scope.resolve::<dyn ReplaceRulesProvider>()?;
        let rules = provider.rules_for(&[]).await?;
        debug!("替换规则已预热: 标志 {}", rules.flags);
        Ok(())
    }
}

/// 移动端主题模块
#[derive(Debug, Default)]
pub struct MobileThemeModule {
    active: AtomicBool,
}

impl MobileThemeModule {
    /// 是否已初始化
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl ForumModule for MobileThemeModule {
    fn module_name(&self) -> &str {
        "Mobile Theme Module"
    }

    fn sort_order(&self) -> i32 {
        1
    }

    fn init(&self) -> Result<(), BoxError> {
        self.active.store(true, Ordering::Release);
        Ok(())
    }
}

impl Disposable for MobileThemeModule {
    fn dispose(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// 纯文本编辑器
#[derive(Debug, Default)]
pub struct PlainTextEditor;

impl ForumEditor for PlainTextEditor {
    fn editor_id(&self) -> &str {
        "text"
    }

    fn description(&self) -> &str {
        "Plain Text Editor"
    }

    fn allows_html(&self) -> bool {
        false
    }
}

/// 版块首页
#[derive(Debug, Default)]
pub struct BoardIndexPage;

impl LocatablePage for BoardIndexPage {
    fn page_name(&self) -> &str {
        "forum"
    }
}

/// 主题列表页
#[derive(Debug, Default)]
pub struct TopicListPage;

impl LocatablePage for TopicListPage {
    fn page_name(&self) -> &str {
        "topics"
    }
}

/// 默认的用户显示名，按版块缓存
pub struct DefaultUserDisplayName {
    cache: Arc<dyn DataCache>,
    keys: Arc<dyn TreatCacheKey>,
    membership: Arc<dyn MembershipProvider>,
    culture: String,
    timeout: std::time::Duration,
}

#[async_trait]
impl UserDisplayName for DefaultUserDisplayName {
    async fn display_name(&self, user_id: i64) -> Result<Option<String>, CacheError> {
        let key = self.keys.key_for(keys::USER_DISPLAY_NAME, &user_id);
        let membership = Arc::clone(&self.membership);
        let name = self
            .cache
            .get_or_create(&key, self.timeout, move || async move {
                Ok::<_, Infallible>(membership.find_user(user_id).map(|user| user.name))
            })
            .await?;
        Ok((*name).clone())
    }
}

impl HaveLocalization for DefaultUserDisplayName {
    fn culture(&self) -> &str {
        &self.culture
    }
}

/// 构造主程序集
pub fn core_assembly() -> PluginAssembly {
    PluginAssembly::new(CORE_ASSEMBLY, 0)
        .with_description("论坛核心服务")
        .with_author("Forum Platform Team")
        .with_type(
            PluginType::new::<StartupInitializeDb, _>(|r| {
                Ok(StartupInitializeDb {
                    db: r.resolve::<dyn DbAccessProvider>()?,
                })
            })
            .implements(capability!(StartupInitializeDb => dyn StartupService)),
        )
        .with_type(
            PluginType::new::<StartupLoadLocalization, _>(|_| Ok(StartupLoadLocalization))
                .implements(capability!(StartupLoadLocalization => dyn StartupService)),
        )
        .with_type(
            PluginType::new::<StartupWarmReplaceRules, _>(|_| Ok(StartupWarmReplaceRules))
                .implements(capability!(StartupWarmReplaceRules => dyn StartupService)),
        )
        .with_type(
            PluginType::new::<MobileThemeModule, _>(|_| Ok(MobileThemeModule::default()))
                .implements(capability!(MobileThemeModule => dyn ForumModule))
                .implements(capability!(MobileThemeModule => dyn Disposable)),
        )
        .with_type(
            PluginType::new::<PlainTextEditor, _>(|_| Ok(PlainTextEditor))
                .implements(capability!(PlainTextEditor => dyn ForumEditor)),
        )
        .with_type(
            PluginType::new::<BoardIndexPage, _>(|_| Ok(BoardIndexPage))
                .implements(capability!(BoardIndexPage => dyn LocatablePage)),
        )
        .with_type(
            PluginType::new::<TopicListPage, _>(|_| Ok(TopicListPage))
                .implements(capability!(TopicListPage => dyn LocatablePage)),
        )
        .with_type(
            PluginType::new::<DefaultUserDisplayName, _>(|r| {
                let settings = r.resolve::<ForumSettings>()?;
                Ok(DefaultUserDisplayName {
                    cache: r.resolve::<dyn DataCache>()?,
                    keys: r.resolve::<dyn TreatCacheKey>()?,
                    membership: r.resolve::<dyn MembershipProvider>()?,
                    culture: settings.board.culture.clone(),
                    timeout: settings.cache.user_display_name_timeout(),
                })
            })
            .implements(capability!(DefaultUserDisplayName => dyn UserDisplayName))
            .implements(capability!(DefaultUserDisplayName => dyn HaveLocalization))
            .exported(ExportMarker::new(LifetimeScope::PerScope)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExportExtractor;

    #[test]
    fn test_core_assembly_exports_display_name_only() {
        let assembly = core_assembly();
        let descriptors = ExportExtractor::new().extract_from(&assembly).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].exposes::<dyn UserDisplayName>());
        assert!(!descriptors[0].exposes::<dyn HaveLocalization>());
    }

    #[test]
    fn test_core_assembly_declares_startup_services() {
        let startup = core_assembly()
            .types()
            .iter()
            .filter(|t| t.implements_capability::<dyn StartupService>())
            .count();
        assert_eq!(startup, 3);
    }

    #[tokio::test]
    async fn test_display_name_uses_own_cache_timeout() {
        let mut settings = ForumSettings::default();
        settings.cache.user_display_name_timeout_secs = 0;
        settings.cache.online_status_timeout_secs = 3600;
        let infrastructure = crate::ForumInfrastructure::builder()
            .with_settings(settings)
            .build()
            .await
            .unwrap();

        let request = infrastructure.begin_request("profile");
        let names = request.resolve::<dyn UserDisplayName>().unwrap();
        assert_eq!(names.display_name(1).await.unwrap(), None);

        let membership = request.resolve::<dyn MembershipProvider>().unwrap();
        let user = membership.create_user("alice", "alice@example.com").unwrap();
        assert_eq!(user.id, 1);
        // 零秒缓存立即过期，重新读取
        assert_eq!(names.display_name(1).await.unwrap(), Some("alice".to_string()));
        request.dispose();
    }

    #[test]
    fn test_mobile_theme_module_lifecycle() {
        let module = MobileThemeModule::default();
        module.init().unwrap();
        assert!(module.is_active());
        module.dispose();
        assert!(!module.is_active());
    }
}
