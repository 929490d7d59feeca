//! 论坛配置
//!
//! 加载顺序：内置默认值 → 可选 TOML 文件 → `FORUM_` 前缀的环境变量（层级分隔符 `__`）。

use config::{Config, Environment, File, FileFormat};
use infrastructure_common::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_SETTINGS_TOML: &str = r#"
[plugins]
pattern = "forum*.plugin.toml"
catalog_pattern = "forum*"
primary = "forum.core"

[composition]
disabled_lifetimes = []
max_resolve_depth = 64

[cache]
replace_rules_timeout_secs = 600
online_status_timeout_secs = 60
user_display_name_timeout_secs = 300

[board]
default_board_id = 1
name = "Forum"
theme = "default"
culture = "en-US"

[database]
provider = "memory"
"#;

/// 插件发现配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// 插件清单目录；未设置时直接扫描进程内插件目录
    pub directory: Option<PathBuf>,
    /// 插件清单文件名模式
    pub pattern: String,
    /// 进程内插件单元名称模式
    pub catalog_pattern: String,
    /// 主程序集名称
    pub primary: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            directory: None,
            pattern: "forum*.plugin.toml".to_string(),
            catalog_pattern: "forum*".to_string(),
            primary: "forum.core".to_string(),
        }
    }
}

impl PluginSettings {
    /// 当前扫描方式使用的模式
    pub fn effective_pattern(&self) -> &str {
        if self.directory.is_some() {
            &self.pattern
        } else {
            &self.catalog_pattern
        }
    }
}

/// 组合配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionSettings {
    /// 禁用的生命周期策略名称
    pub disabled_lifetimes: Vec<String>,
    /// 最大解析深度
    pub max_resolve_depth: usize,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            disabled_lifetimes: Vec::new(),
            max_resolve_depth: 64,
        }
    }
}

/// 缓存配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// 替换规则缓存时间（秒）
    pub replace_rules_timeout_secs: u64,
    /// 在线状态缓存时间（秒）
    pub online_status_timeout_secs: u64,
    /// 用户显示名缓存时间（秒）
    pub user_display_name_timeout_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            replace_rules_timeout_secs: 600,
            online_status_timeout_secs: 60,
            user_display_name_timeout_secs: 300,
        }
    }
}

impl CacheSettings {
    /// 替换规则缓存时间
    pub fn replace_rules_timeout(&self) -> Duration {
        Duration::from_secs(self.replace_rules_timeout_secs)
    }

    /// 在线状态缓存时间
    pub fn online_status_timeout(&self) -> Duration {
        Duration::from_secs(self.online_status_timeout_secs)
    }

    /// 用户显示名缓存时间
    pub fn user_display_name_timeout(&self) -> Duration {
        Duration::from_secs(self.user_display_name_timeout_secs)
    }
}

/// 版块配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    /// 默认版块ID
    pub default_board_id: i32,
    /// 论坛名称
    pub name: String,
    /// 主题
    pub theme: String,
    /// 语言文化
    pub culture: String,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            default_board_id: 1,
            name: "Forum".to_string(),
            theme: "default".to_string(),
            culture: "en-US".to_string(),
        }
    }
}

/// 数据访问配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// 数据访问提供者名称
    pub provider: String,
    /// 连接字符串
    pub connection_string: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            connection_string: None,
        }
    }
}

/// 论坛配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumSettings {
    /// 插件发现
    pub plugins: PluginSettings,
    /// 组合
    pub composition: CompositionSettings,
    /// 缓存
    pub cache: CacheSettings,
    /// 版块
    pub board: BoardSettings,
    /// 数据访问
    pub database: DatabaseSettings,
}

impl ForumSettings {
    /// 加载配置，`path` 为可选的 TOML 文件
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(File::from_str(DEFAULT_SETTINGS_TOML, FileFormat::Toml));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            info!("加载配置文件: {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("FORUM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("composition.disabled_lifetimes"),
        );

        let settings: Self = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| {
                error!("配置构建失败: {}", e);
                ConfigError::ParseError { source: Box::new(e) }
            })?;

        settings.validate()?;
        debug!("配置加载完成: {:?}", settings);
        Ok(settings)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.plugins.primary.trim().is_empty() {
            errors.push("plugins.primary 不能为空".to_string());
        }
        for (key, pattern) in [
            ("plugins.pattern", &self.plugins.pattern),
            ("plugins.catalog_pattern", &self.plugins.catalog_pattern),
        ] {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(format!("{key} 不是有效的通配模式: {e}"));
            }
        }
        if self.composition.max_resolve_depth == 0 {
            errors.push("composition.max_resolve_depth 必须大于 0".to_string());
        }
        if self.board.default_board_id < 0 {
            errors.push("board.default_board_id 不能为负数".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError {
                message: errors.join("; "),
            })
        }
    }
}
