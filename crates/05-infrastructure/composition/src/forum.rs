//! 论坛服务契约
//!
//! 注册表默认绑定的服务接口。这里只定义组合根需要绑定的最小接口，
//! 具体的页面、数据访问和文本处理由外部组件提供。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use infrastructure_common::{BoxError, CacheError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// 当前版块
pub trait HaveBoardId: Send + Sync {
    /// 版块ID
    fn board_id(&self) -> i32;
}

/// 命名锁
pub trait LockProvider: Send + Sync {
    /// 取得键对应的锁，同一键总是返回同一把锁
    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>>;
}

/// 数据访问提供者
pub trait DbAccessProvider: Send + Sync {
    /// 提供者名称
    fn provider_name(&self) -> &str;

    /// 连接字符串
    fn connection_string(&self) -> Option<&str>;

    /// 标记数据库已初始化
    fn mark_initialized(&self);

    /// 数据库是否已初始化
    fn is_initialized(&self) -> bool;
}

/// 单个实体类型的仓储
pub trait Repository: Send + Sync {
    /// 实体名称
    fn entity(&self) -> &str;

    /// 保存实体
    fn upsert(&self, id: i64, value: serde_json::Value);

    /// 读取实体
    fn get(&self, id: i64) -> Option<serde_json::Value>;

    /// 删除实体
    fn delete(&self, id: i64) -> bool;

    /// 实体数量
    fn count(&self) -> usize;
}

/// 按实体类型提供仓储
pub trait RepositoryProvider: Send + Sync {
    /// 取得实体类型的仓储，同一实体名称共享存储
    fn repository(&self, entity: &str) -> Arc<dyn Repository>;
}

/// 邮件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    /// 发件人
    pub from: String,
    /// 收件人
    pub to: String,
    /// 主题
    pub subject: String,
    /// 正文
    pub body: String,
}

/// 邮件发送
pub trait SendMail: Send + Sync {
    /// 发送邮件
    fn send(&self, message: MailMessage) -> Result<(), BoxError>;

    /// 已发送数量
    fn sent_count(&self) -> usize;
}

/// 用户通知
pub trait SendNotification: Send + Sync {
    /// 通知用户
    fn notify_user(&self, user_name: &str, subject: &str, body: &str) -> Result<(), BoxError>;
}

/// 摘要邮件
pub trait Digest: Send + Sync {
    /// 生成用户的摘要内容
    fn digest_for(&self, user_name: &str) -> String;
}

/// 权限检查
pub trait Permissions: Send + Sync {
    /// 用户是否属于任一角色
    fn is_in_any_role(&self, user_name: &str, roles: &[&str]) -> bool;

    /// 用户是否为管理员
    fn is_admin(&self, user_name: &str) -> bool {
        self.is_in_any_role(user_name, &["Administrators"])
    }
}

/// 主题
pub trait ThemeProvider: Send + Sync {
    /// 当前主题名称
    fn theme(&self) -> &str;
}

/// 本地化
pub trait LocalizationProvider: Send + Sync {
    /// 当前语言文化
    fn culture(&self) -> &str;

    /// 取得本地化文本，缺失时返回 `[page.tag]`
    fn text(&self, page: &str, tag: &str) -> String;
}

/// 编译后的替换规则集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceRules {
    /// 规则标志组合
    pub flags: u64,
    /// 规则名称
    pub rules: Vec<String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 替换规则提供者
#[async_trait]
pub trait ReplaceRulesProvider: Send + Sync {
    /// 取得标志组合对应的规则，按版块缓存
    async fn rules_for(&self, flags: &[bool]) -> Result<Arc<ReplaceRules>, CacheError>;

    /// 清除当前版块缓存的全部规则，返回清除数量
    fn clear_cache(&self) -> usize;
}

/// 计时器
pub trait StopWatch: Send + Sync {
    /// 开始计时
    fn start(&self);

    /// 已经过的时间
    fn elapsed(&self) -> Duration;
}

/// 在线状态
#[async_trait]
pub trait OnlineStatus: Send + Sync {
    /// 用户是否在线
    async fn is_online(&self, user_name: &str) -> Result<bool, CacheError>;
}

/// 用户显示名
#[async_trait]
pub trait UserDisplayName: Send + Sync {
    /// 用户的显示名
    async fn display_name(&self, user_id: i64) -> Result<Option<String>, CacheError>;
}

/// 论坛用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumUser {
    /// 用户ID
    pub id: i64,
    /// 用户名
    pub name: String,
    /// 邮箱
    pub email: String,
}

/// 用户提供者
pub trait MembershipProvider: Send + Sync {
    /// 创建用户，用户名已存在时失败
    fn create_user(&self, name: &str, email: &str) -> Result<ForumUser, BoxError>;

    /// 按ID查找
    fn find_user(&self, id: i64) -> Option<ForumUser>;

    /// 按用户名查找
    fn find_by_name(&self, name: &str) -> Option<ForumUser>;

    /// 设置在线状态
    fn set_online(&self, name: &str, online: bool);

    /// 在线用户名
    fn online_users(&self) -> Vec<String>;
}

/// 角色提供者
pub trait RoleProvider: Send + Sync {
    /// 将用户加入角色
    fn add_to_role(&self, user_name: &str, role: &str);

    /// 用户的角色
    fn roles_for(&self, user_name: &str) -> Vec<String>;
}

/// 资料提供者
pub trait ProfileProvider: Send + Sync {
    /// 设置资料项
    fn set_value(&self, user_name: &str, key: &str, value: &str);

    /// 读取资料项
    fn value(&self, user_name: &str, key: &str) -> Option<String>;
}
