//! 缓存键
//!
//! 原始模板填充区分值后，再由 [`TreatCacheKey`] 加上版块前缀，
//! 避免多版块部署中的跨租户数据泄露。

use std::fmt;

/// 含一个 `{}` 占位符的缓存键模板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKeyTemplate(&'static str);

impl CacheKeyTemplate {
    /// 创建模板
    pub const fn new(template: &'static str) -> Self {
        Self(template)
    }

    /// 模板原文
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// 用区分值填充占位符；没有占位符时原样返回
    pub fn fill(&self, discriminator: impl fmt::Display) -> String {
        if self.0.contains("{}") {
            self.0.replacen("{}", &discriminator.to_string(), 1)
        } else {
            self.0.to_string()
        }
    }

    /// 占位符之前的固定部分，所有填充实例都以它开头
    pub fn prefix(&self) -> &'static str {
        self.0.split("{}").next().unwrap_or(self.0)
    }
}

impl fmt::Display for CacheKeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// 常用缓存键
pub mod keys {
    use super::CacheKeyTemplate;

    /// 按标志组合缓存的替换规则
    pub const REPLACE_RULES: CacheKeyTemplate = CacheKeyTemplate::new("ReplaceRules{}");
    /// 在线用户状态
    pub const USERS_ONLINE_STATUS: CacheKeyTemplate = CacheKeyTemplate::new("UsersOnlineStatus");
    /// 版块设置
    pub const BOARD_SETTINGS: CacheKeyTemplate = CacheKeyTemplate::new("BoardSettings");
    /// 用户显示名
    pub const USER_DISPLAY_NAME: CacheKeyTemplate = CacheKeyTemplate::new("UserDisplayName{}");
}

/// 缓存键处理
pub trait TreatCacheKey: Send + Sync {
    /// 处理原始键
    fn treat(&self, key: &str) -> String;

    /// 填充模板并处理
    fn key_for(&self, template: CacheKeyTemplate, discriminator: &dyn fmt::Display) -> String {
        self.treat(&template.fill(discriminator))
    }

    /// 模板所有实例在处理后的公共前缀
    fn treated_prefix(&self, template: CacheKeyTemplate) -> String {
        self.treat(template.prefix())
    }
}

/// 按版块隔离的缓存键：`board:{id}:{key}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardCacheKey {
    board_id: i32,
}

impl BoardCacheKey {
    /// 为版块创建键处理
    pub fn new(board_id: i32) -> Self {
        Self { board_id }
    }

    /// 版块ID
    pub fn board_id(&self) -> i32 {
        self.board_id
    }

    /// 匹配该版块下模板所有实例的谓词
    pub fn matching(&self, template: CacheKeyTemplate) -> impl Fn(&str) -> bool + Send + Sync + 'static {
        let prefix = self.treated_prefix(template);
        move |key: &str| key.starts_with(&prefix)
    }
}

impl TreatCacheKey for BoardCacheKey {
    fn treat(&self, key: &str) -> String {
        format!("board:{}:{}", self.board_id, key)
    }
}
