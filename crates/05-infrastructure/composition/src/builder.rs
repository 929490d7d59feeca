//! 论坛基础设施构建器

use crate::composer::{CompositionPhase, RegistryComposer};
use crate::defaults::core_assembly;
use crate::infrastructure::ForumInfrastructure;
use crate::scanner::{CatalogScanner, DirectoryScanner};
use crate::settings::ForumSettings;
use di_abstractions::{PluginAssembly, PluginCatalog, PluginScanner, ResolveOptions};
use di_impl::LifetimeScopeResolver;
use infrastructure_common::{ComponentError, InfrastructureError, LifetimeScope};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// 论坛基础设施构建器
///
/// 使用建造者模式收集插件单元、配置和生命周期约束，`build` 时完成扫描和组合。
pub struct ForumInfrastructureBuilder {
    /// 进程内插件目录，默认包含主程序集
    catalog: PluginCatalog,
    /// 贡献插件时遇到的第一个错误，构建时返回
    catalog_error: Option<ComponentError>,
    /// 显式配置，设置后不再从文件和环境变量加载
    settings: Option<ForumSettings>,
    /// 配置文件
    config_file: Option<PathBuf>,
    /// 覆盖插件目录
    plugins_dir: Option<PathBuf>,
    /// 覆盖扫描模式
    pattern: Option<String>,
    /// 额外禁用的生命周期
    disabled_lifetimes: Vec<LifetimeScope>,
    /// 最后执行的组合阶段
    last_phase: CompositionPhase,
    /// 自定义扫描器
    scanner: Option<Arc<dyn PluginScanner>>,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 日志配置
    logging_config: LoggingConfig,
}

impl ForumInfrastructureBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        let mut catalog = PluginCatalog::new();
        let catalog_error = catalog.contribute(core_assembly()).err();
        Self {
            catalog,
            catalog_error,
            settings: None,
            config_file: None,
            plugins_dir: None,
            pattern: None,
            disabled_lifetimes: Vec::new(),
            last_phase: CompositionPhase::ForumModules,
            scanner: None,
            logging_enabled: false, // 默认不启用日志初始化
            logging_config: LoggingConfig::default(),
        }
    }

    /// 贡献插件单元
    pub fn with_plugin(mut self, assembly: PluginAssembly) -> Self {
        debug!("贡献插件单元: {}", assembly.name());
        if let Err(e) = self.catalog.contribute(assembly) {
            self.catalog_error.get_or_insert(e);
        }
        self
    }

    /// 替换整个插件目录（需自行包含主程序集）
    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self.catalog_error = None;
        self
    }

    /// 使用显式配置
    pub fn with_settings(mut self, settings: ForumSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// 从 TOML 文件加载配置
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        info!("使用配置文件: {}", path.display());
        self.config_file = Some(path.to_path_buf());
        self
    }

    /// 覆盖插件目录
    pub fn with_plugins_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.plugins_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// 覆盖扫描模式
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// 禁用生命周期策略
    pub fn disable_lifetime(mut self, lifetime: LifetimeScope) -> Self {
        self.disabled_lifetimes.push(lifetime);
        self
    }

    /// 只组合到指定阶段（含）
    pub fn compose_through(mut self, phase: CompositionPhase) -> Self {
        self.last_phase = phase;
        self
    }

    /// 使用自定义扫描器
    pub fn with_scanner<S: PluginScanner + 'static>(mut self, scanner: S) -> Self {
        info!("使用自定义扫描器: {}", scanner.name());
        self.scanner = Some(Arc::new(scanner));
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true; // 启用日志初始化
        self
    }

    fn resolve_settings(&mut self) -> Result<ForumSettings, InfrastructureError> {
        let mut settings = match self.settings.take() {
            Some(settings) => settings,
            None => ForumSettings::load(self.config_file.as_deref())?,
        };
        if let Some(dir) = self.plugins_dir.take() {
            settings.plugins.directory = Some(dir);
        }
        if let Some(pattern) = self.pattern.take() {
            if settings.plugins.directory.is_some() {
                settings.plugins.pattern = pattern;
            } else {
                settings.plugins.catalog_pattern = pattern;
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    /// 构建基础设施：扫描插件、组合注册表并创建容器
    pub async fn build(mut self) -> Result<ForumInfrastructure, InfrastructureError> {
        // 只有在明确配置了日志时才初始化日志
        if self.logging_enabled {
            self.logging_config.initialize()?;
        }
        info!("开始构建论坛基础设施");

        if let Some(e) = self.catalog_error.take() {
            return Err(e.into());
        }

        let settings = Arc::new(self.resolve_settings()?);
        let lifetimes = self
            .disabled_lifetimes
            .iter()
            .try_fold(
                LifetimeScopeResolver::from_disabled_names(settings.composition.disabled_lifetimes.as_slice())?,
                |resolver, lifetime| Ok::<_, ComponentError>(resolver.without(*lifetime)),
            )?;

        let catalog = Arc::new(self.catalog);
        let scanner: Arc<dyn PluginScanner> = match (self.scanner, &settings.plugins.directory) {
            (Some(scanner), _) => scanner,
            (None, Some(dir)) => Arc::new(DirectoryScanner::new(
                Arc::clone(&catalog),
                dir.clone(),
                settings.plugins.primary.clone(),
            )),
            (None, None) => Arc::new(CatalogScanner::new(Arc::clone(&catalog), settings.plugins.primary.clone())),
        };
        debug!("使用扫描器: {}", scanner.name());

        let composer = RegistryComposer::new(Arc::clone(&settings), lifetimes).through(self.last_phase);
        let options = ResolveOptions::default().with_max_depth(settings.composition.max_resolve_depth);
        let infrastructure = ForumInfrastructure::compose(settings, catalog, scanner, composer, options).await?;

        info!("论坛基础设施构建完成");
        Ok(infrastructure)
    }
}

impl Default for ForumInfrastructureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 设置时以环境变量为准
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 设置日志级别
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// 设置是否输出 JSON
    pub fn with_json(mut self, json_format: bool) -> Self {
        self.json_format = json_format;
        self
    }

    /// 初始化全局日志订阅者
    pub fn initialize(&self) -> Result<(), InfrastructureError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string().to_lowercase()));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| InfrastructureError::InvalidState {
            message: format!("日志初始化失败: {e}"),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_presets() {
        let development = LoggingConfig::development();
        assert_eq!(development.level, tracing::Level::DEBUG);
        assert!(development.show_line_number);
        assert!(!development.json_format);

        let production = LoggingConfig::production().with_level(tracing::Level::WARN);
        assert_eq!(production.level, tracing::Level::WARN);
        assert!(production.json_format);
    }

    #[test]
    fn test_pattern_override_follows_scan_mode() {
        let mut builder = ForumInfrastructureBuilder::new()
            .with_settings(ForumSettings::default())
            .with_pattern("forum.g*");
        let settings = builder.resolve_settings().unwrap();
        assert_eq!(settings.plugins.catalog_pattern, "forum.g*");

        let mut builder = ForumInfrastructureBuilder::new()
            .with_settings(ForumSettings::default())
            .with_plugins_dir("/srv/forum/plugins")
            .with_pattern("*.toml");
        let settings = builder.resolve_settings().unwrap();
        assert_eq!(settings.plugins.pattern, "*.toml");
        assert_eq!(settings.plugins.effective_pattern(), "*.toml");
    }

    #[tokio::test]
    async fn test_duplicate_plugin_fails_build() {
        let err = ForumInfrastructureBuilder::new()
            .with_settings(ForumSettings::default())
            .with_plugin(PluginAssembly::new("forum.core", 3))
            .build()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, InfrastructureError::Component(ComponentError::RegistrationError { .. })));
    }
}
