//! 领域服务（阶段 5）

use crate::forum::{
    Digest, HaveBoardId, LocalizationProvider, MailMessage, MembershipProvider, OnlineStatus, Permissions,
    ReplaceRules, ReplaceRulesProvider, RoleProvider, SendMail, SendNotification, StopWatch, ThemeProvider,
};
use crate::settings::ForumSettings;
use async_trait::async_trait;
use caching_abstractions::{keys, BoardCacheKey, DataCache, DataCacheExt, TreatCacheKey};
use chrono::Utc;
use di_abstractions::{capability, ComponentBatch, ResolverExt};
use infrastructure_common::{BoxError, CacheError, HaveLocalization, LifetimeScope};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 只记录日志的邮件发送
#[derive(Debug, Default)]
pub struct LoggingMailSender {
    sent: AtomicUsize,
}

impl SendMail for LoggingMailSender {
    fn send(&self, message: MailMessage) -> Result<(), BoxError> {
        if message.to.trim().is_empty() {
            return Err("收件人为空".into());
        }
        info!("发送邮件: {} -> {}, 主题: {}", message.from, message.to, message.subject);
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn sent_count(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

/// 通过邮件通知用户
pub struct MailNotification {
    mail: Arc<dyn SendMail>,
    membership: Arc<dyn MembershipProvider>,
    from: String,
}

impl SendNotification for MailNotification {
    fn notify_user(&self, user_name: &str, subject: &str, body: &str) -> Result<(), BoxError> {
        let user = self
            .membership
            .find_by_name(user_name)
            .ok_or_else(|| format!("用户不存在: {user_name}"))?;
        self.mail.send(MailMessage {
            from: self.from.clone(),
            to: user.email,
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }
}

/// 版块摘要
pub struct BoardDigest {
    board_id: i32,
    board_name: String,
}

impl Digest for BoardDigest {
    fn digest_for(&self, user_name: &str) -> String {
        format!("{} (#{}) 摘要: {}", self.board_name, self.board_id, user_name)
    }
}

/// 基于角色的权限
pub struct RolePermissions {
    roles: Arc<dyn RoleProvider>,
}

impl Permissions for RolePermissions {
    fn is_in_any_role(&self, user_name: &str, roles: &[&str]) -> bool {
        self.roles
            .roles_for(user_name)
            .iter()
            .any(|role| roles.iter().any(|wanted| role.eq_ignore_ascii_case(wanted)))
    }
}

/// 版块配置的主题
pub struct BoardTheme {
    theme: String,
}

impl ThemeProvider for BoardTheme {
    fn theme(&self) -> &str {
        &self.theme
    }
}

/// 内置资源的本地化
pub struct BoardLocalization {
    culture: String,
    resources: HashMap<(String, String), String>,
}

impl BoardLocalization {
    /// 为语言文化加载内置资源
    pub fn new(culture: impl Into<String>) -> Self {
        let culture = culture.into();
        let entries: &[(&str, &str, &str)] = if culture.starts_with("zh") {
            &[("DEFAULT", "FORUM_TITLE", "论坛"), ("TOPICS", "NEW_TOPIC", "发表新主题")]
        } else {
            &[("DEFAULT", "FORUM_TITLE", "Forum"), ("TOPICS", "NEW_TOPIC", "New Topic")]
        };
        let resources = entries
            .iter()
            .map(|(page, tag, text)| (((*page).to_string(), (*tag).to_string()), (*text).to_string()))
            .collect();
        Self { culture, resources }
    }

    /// 资源条目数
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

impl LocalizationProvider for BoardLocalization {
    fn culture(&self) -> &str {
        &self.culture
    }

    fn text(&self, page: &str, tag: &str) -> String {
        self.resources
            .get(&(page.to_uppercase(), tag.to_uppercase()))
            .cloned()
            .unwrap_or_else(|| format!("[{page}.{tag}]"))
    }
}

impl HaveLocalization for BoardLocalization {
    fn culture(&self) -> &str {
        &self.culture
    }
}

/// 替换规则标志的最大位数
pub const MAX_REPLACE_FLAGS: usize = u64::BITS as usize;

/// 将标志数组转换为整数，第 i 个标志对应第 i 位
///
/// 超出位数的标志全部为 `false` 时不影响结果，否则返回 `None`。
pub fn flags_to_int(flags: &[bool]) -> Option<u64> {
    if flags.iter().skip(MAX_REPLACE_FLAGS).any(|&set| set) {
        return None;
    }
    Some(
        flags
            .iter()
            .take(MAX_REPLACE_FLAGS)
            .enumerate()
            .fold(0_u64, |acc, (bit, &set)| if set { acc | (1_u64 << bit) } else { acc }),
    )
}

/// 按版块缓存的替换规则
pub struct CachedReplaceRules {
    cache: Arc<dyn DataCache>,
    keys: Arc<dyn TreatCacheKey>,
    timeout: Duration,
}

#[async_trait]
impl ReplaceRulesProvider for CachedReplaceRules {
    async fn rules_for(&self, flags: &[bool]) -> Result<Arc<ReplaceRules>, CacheError> {
        let flags = flags_to_int(flags).ok_or_else(|| {
            warn!("替换规则标志过多: {} 个", flags.len());
            CacheError::InvalidKey {
                message: format!("替换规则标志超过 {MAX_REPLACE_FLAGS} 位: {} 个", flags.len()),
            }
        })?;
        let key = self.keys.key_for(keys::REPLACE_RULES, &flags);
        self.cache
            .get_or_create(&key, self.timeout, move || async move {
                debug!("编译替换规则: 标志 {}", flags);
                Ok::<_, Infallible>(ReplaceRules {
                    flags,
                    rules: Vec::new(),
                    created_at: Utc::now(),
                })
            })
            .await
    }

    fn clear_cache(&self) -> usize {
        let prefix = self.keys.treated_prefix(keys::REPLACE_RULES);
        let removed = self.cache.remove(&|key: &str| key.starts_with(&prefix));
        info!("清除替换规则缓存: {} 个", removed);
        removed
    }
}

/// 逻辑上下文计时器
pub struct ContextStopWatch {
    started: Mutex<Instant>,
}

impl ContextStopWatch {
    /// 创建并开始计时
    pub fn started() -> Self {
        Self {
            started: Mutex::new(Instant::now()),
        }
    }
}

impl StopWatch for ContextStopWatch {
    fn start(&self) {
        *self.started.lock() = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.started.lock().elapsed()
    }
}

/// 缓存的在线状态
pub struct CachedOnlineStatus {
    cache: Arc<dyn DataCache>,
    keys: Arc<dyn TreatCacheKey>,
    membership: Arc<dyn MembershipProvider>,
    timeout: Duration,
}

#[async_trait]
impl OnlineStatus for CachedOnlineStatus {
    async fn is_online(&self, user_name: &str) -> Result<bool, CacheError> {
        let key = self.keys.key_for(keys::USERS_ONLINE_STATUS, &"");
        let membership = Arc::clone(&self.membership);
        let online = self
            .cache
            .get_or_create(&key, self.timeout, move || async move {
                Ok::<_, Infallible>(membership.online_users())
            })
            .await?;
        Ok(online.iter().any(|name| name == user_name))
    }
}

/// 注册领域服务
pub fn register_services(batch: &mut ComponentBatch) {
    batch
        .register::<LoggingMailSender, _>(|_| Ok(LoggingMailSender::default()))
        .as_service(capability!(LoggingMailSender => dyn SendMail))
        .with_lifetime(LifetimeScope::Singleton);

    batch
        .register::<MailNotification, _>(|r| {
            let settings = r.resolve::<ForumSettings>()?;
            Ok(MailNotification {
                mail: r.resolve::<dyn SendMail>()?,
                membership: r.resolve::<dyn MembershipProvider>()?,
                from: format!("noreply@{}", settings.board.name.to_lowercase().replace(' ', "-")),
            })
        })
        .as_service(capability!(MailNotification => dyn SendNotification))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<BoardDigest, _>(|r| {
            let settings = r.resolve::<ForumSettings>()?;
            Ok(BoardDigest {
                board_id: r.resolve::<dyn HaveBoardId>()?.board_id(),
                board_name: settings.board.name.clone(),
            })
        })
        .as_service(capability!(BoardDigest => dyn Digest))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<RolePermissions, _>(|r| {
            Ok(RolePermissions {
                roles: r.resolve::<dyn RoleProvider>()?,
            })
        })
        .as_service(capability!(RolePermissions => dyn Permissions))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<BoardTheme, _>(|r| {
            Ok(BoardTheme {
                theme: r.resolve::<ForumSettings>()?.board.theme.clone(),
            })
        })
        .as_service(capability!(BoardTheme => dyn ThemeProvider))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<BoardLocalization, _>(|r| {
            Ok(BoardLocalization::new(r.resolve::<ForumSettings>()?.board.culture.clone()))
        })
        .as_service(capability!(BoardLocalization => dyn LocalizationProvider))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<BoardCacheKey, _>(|r| Ok(BoardCacheKey::new(r.resolve::<dyn HaveBoardId>()?.board_id())))
        .as_service(capability!(BoardCacheKey => dyn TreatCacheKey))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<CachedReplaceRules, _>(|r| {
            let settings = r.resolve::<ForumSettings>()?;
            Ok(CachedReplaceRules {
                cache: r.resolve::<dyn DataCache>()?,
                keys: r.resolve::<dyn TreatCacheKey>()?,
                timeout: settings.cache.replace_rules_timeout(),
            })
        })
        .as_service(capability!(CachedReplaceRules => dyn ReplaceRulesProvider))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<ContextStopWatch, _>(|_| Ok(ContextStopWatch::started()))
        .as_service(capability!(ContextStopWatch => dyn StopWatch))
        .with_lifetime(LifetimeScope::PerLogicalContext);

    batch
        .register::<CachedOnlineStatus, _>(|r| {
            let settings = r.resolve::<ForumSettings>()?;
            Ok(CachedOnlineStatus {
                cache: r.resolve::<dyn DataCache>()?,
                keys: r.resolve::<dyn TreatCacheKey>()?,
                membership: r.resolve::<dyn MembershipProvider>()?,
                timeout: settings.cache.online_status_timeout(),
            })
        })
        .as_service(capability!(CachedOnlineStatus => dyn OnlineStatus))
        .with_lifetime(LifetimeScope::PerScope);
}

#[cfg(test)]
mod tests {
    use super::*;
    use caching_memory::MemoryDataCache;

    #[test]
    fn test_flags_to_int() {
        assert_eq!(flags_to_int(&[]), Some(0));
        assert_eq!(flags_to_int(&[true, false, true]), Some(5));
        assert_eq!(flags_to_int(&[false, false, false, false, true]), Some(16));

        let mut high = vec![false; 41];
        high[40] = true;
        assert_eq!(flags_to_int(&high), Some(1 << 40));

        let mut padded = vec![false; 80];
        padded[63] = true;
        assert_eq!(flags_to_int(&padded), Some(1 << 63));
        padded[70] = true;
        assert_eq!(flags_to_int(&padded), None);
    }

    #[tokio::test]
    async fn test_replace_rules_distinguish_high_flags() {
        let cache: Arc<dyn DataCache> = Arc::new(MemoryDataCache::new("test"));
        let provider = CachedReplaceRules {
            cache: Arc::clone(&cache),
            keys: Arc::new(BoardCacheKey::new(1)),
            timeout: Duration::from_secs(60),
        };

        let base = vec![true; 33];
        let mut extended = base.clone();
        extended[32] = false;
        let first = provider.rules_for(&base).await.unwrap();
        let second = provider.rules_for(&extended).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.flags, second.flags);
        assert_eq!(cache.len(), 2);

        let mut too_many = vec![false; 65];
        too_many[64] = true;
        let err = provider.rules_for(&too_many).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey { .. }));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_localization_falls_back_to_tag() {
        let localization = BoardLocalization::new("en-US");
        assert_eq!(localization.text("default", "forum_title"), "Forum");
        assert_eq!(localization.text("POSTS", "REPLY"), "[POSTS.REPLY]");
        assert_eq!(BoardLocalization::new("zh-CN").text("TOPICS", "NEW_TOPIC"), "发表新主题");
    }

    #[tokio::test]
    async fn test_replace_rules_are_cached_per_board_and_flags() {
        let cache: Arc<dyn DataCache> = Arc::new(MemoryDataCache::new("test"));
        let provider = |board_id| CachedReplaceRules {
            cache: Arc::clone(&cache),
            keys: Arc::new(BoardCacheKey::new(board_id)),
            timeout: Duration::from_secs(60),
        };
        let board_one = provider(1);
        let board_two = provider(2);

        let first = board_one.rules_for(&[true, false, true]).await.unwrap();
        let again = board_one.rules_for(&[true, false, true]).await.unwrap();
        let other_flags = board_one.rules_for(&[false]).await.unwrap();
        let other_board = board_two.rules_for(&[true, false, true]).await.unwrap();

        assert_eq!(first.flags, 5);
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other_flags));
        assert!(!Arc::ptr_eq(&first, &other_board));
        assert_eq!(cache.len(), 3);

        assert_eq!(board_one.clear_cache(), 2);
        assert_eq!(cache.len(), 1);
        let rebuilt = board_one.rules_for(&[true, false, true]).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
    }
}
