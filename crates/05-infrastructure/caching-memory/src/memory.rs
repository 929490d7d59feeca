//! 内存数据缓存
//!
//! 每个键对应一个槽位，槽位内是 `tokio::sync::OnceCell`：
//! 同一键的未命中串行执行，不同键互不竞争。过期的槽位在下次访问时被替换。

use async_trait::async_trait;
use caching_abstractions::{CacheFactory, CachedValue, DataCache, KeyPredicate};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use infrastructure_common::CacheError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

struct CachedEntry {
    value: CachedValue,
    expires_at: Option<Instant>,
}

impl CachedEntry {
    fn new(value: CachedValue, timeout: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(timeout),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |expires_at| now >= expires_at)
    }
}

#[derive(Default)]
struct CacheSlot {
    cell: OnceCell<CachedEntry>,
}

impl CacheSlot {
    fn is_filled(&self) -> bool {
        self.cell.initialized()
    }
}

/// 缓存统计信息
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数（工厂执行次数）
    pub misses: u64,
    /// 缓存项数量
    pub size: usize,
    /// 统计时间
    pub last_updated: DateTime<Utc>,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 内存数据缓存
pub struct MemoryDataCache {
    name: String,
    slots: DashMap<String, Arc<CacheSlot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryDataCache {
    /// 创建缓存
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
            last_updated: Utc::now(),
        }
    }

    fn slot_for(&self, key: &str) -> Arc<CacheSlot> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        let entry = self.slots.entry(key.to_string()).or_default();
        Arc::clone(entry.value())
    }

    /// 取得未过期或尚未初始化的槽位，替换掉过期槽位
    fn live_slot(&self, key: &str) -> Arc<CacheSlot> {
        loop {
            let slot = self.slot_for(key);
            match slot.cell.get() {
                Some(entry) if entry.is_expired(Instant::now()) => {
                    debug!("缓存项已过期: {}", key);
                    self.slots.remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
                }
                _ => return slot,
            }
        }
    }
}

impl Default for MemoryDataCache {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl DataCache for MemoryDataCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_or_create_erased(
        &self,
        key: &str,
        timeout: Duration,
        factory: CacheFactory,
    ) -> Result<CachedValue, CacheError> {
        let slot = self.live_slot(key);
        if let Some(entry) = slot.cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.value));
        }

        let created = slot
            .cell
            .get_or_try_init(|| async move {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("缓存未命中，执行工厂: {}", key);
                match factory().await {
                    Ok(value) => Ok(CachedEntry::new(value, timeout)),
                    Err(source) => {
                        warn!("缓存工厂失败: {}, 原因: {}", key, source);
                        Err(CacheError::FactoryFailed {
                            key: key.to_string(),
                            source,
                        })
                    }
                }
            })
            .await;
        match created {
            Ok(entry) => Ok(Arc::clone(&entry.value)),
            Err(e) => {
                // 失败的键不保留空槽位
                self.slots
                    .remove_if(key, |_, current| Arc::ptr_eq(current, &slot) && !current.is_filled());
                Err(e)
            }
        }
    }

    fn remove(&self, predicate: KeyPredicate<'_>) -> usize {
        let mut removed = 0;
        self.slots.retain(|key, slot| {
            let matched = predicate(key.as_str());
            if matched && slot.is_filled() {
                removed += 1;
            }
            !matched
        });
        debug!("按谓词删除缓存项: {} 个", removed);
        removed
    }

    fn remove_key(&self, key: &str) -> bool {
        self.slots.remove(key).map_or(false, |(_, slot)| slot.is_filled())
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().is_filled()).count()
    }

    fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caching_abstractions::DataCacheExt;

    #[tokio::test]
    async fn test_get_or_create_caches_value() {
        let cache = MemoryDataCache::new("test");
        let first = cache
            .get_or_create("k", Duration::from_secs(60), || async { Ok::<_, std::io::Error>(1_u32) })
            .await
            .unwrap();
        let second = cache
            .get_or_create("k", Duration::from_secs(60), || async { Ok::<_, std::io::Error>(2_u32) })
            .await
            .unwrap();

        assert_eq!(*first, 1);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recreated() {
        let cache = MemoryDataCache::new("test");
        let first = cache
            .get_or_create("k", Duration::ZERO, || async { Ok::<_, std::io::Error>(1_u32) })
            .await
            .unwrap();
        let second = cache
            .get_or_create("k", Duration::from_secs(60), || async { Ok::<_, std::io::Error>(2_u32) })
            .await
            .unwrap();

        assert_eq!(*first, 1);
        assert_eq!(*second, 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_factory_failure_is_not_cached() {
        let cache = MemoryDataCache::new("test");
        let err = cache
            .get_or_create::<u32, _, _, _>("k", Duration::from_secs(60), || async { Err("数据库不可用") })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::FactoryFailed { ref key, .. } if key == "k"));

        let value = cache
            .get_or_create("k", Duration::from_secs(60), || async { Ok::<_, std::io::Error>(7_u32) })
            .await
            .unwrap();
        assert_eq!(*value, 7);
    }

    #[tokio::test]
    async fn test_failed_factories_leave_no_slots() {
        let cache = MemoryDataCache::new("test");
        for i in 0..100 {
            let key = format!("user:{i}:DisplayName");
            let result = cache
                .get_or_create::<u32, _, _, _>(&key, Duration::from_secs(60), || async { Err("用户不存在") })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().size, 0);
        assert!(!cache.remove_key("user:0:DisplayName"));
        assert_eq!(cache.remove_prefix("user:"), 0);
        assert!(cache.slots.is_empty());
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let cache = MemoryDataCache::new("test");
        cache
            .get_or_create("k", Duration::from_secs(60), || async { Ok::<_, std::io::Error>(1_u32) })
            .await
            .unwrap();
        let err = cache
            .get_or_create("k", Duration::from_secs(60), || async { Ok::<_, std::io::Error>("text") })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_remove_by_predicate() {
        let cache = MemoryDataCache::new("test");
        for key in ["board:1:ReplaceRules0", "board:1:ReplaceRules3", "board:2:ReplaceRules0", "board:1:BoardSettings"] {
            cache
                .get_or_create(key, Duration::from_secs(60), || async { Ok::<_, std::io::Error>(()) })
                .await
                .unwrap();
        }

        let removed = cache.remove_prefix("board:1:ReplaceRules");
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.remove_key("board:2:ReplaceRules0"));
        assert!(!cache.remove_key("board:2:ReplaceRules0"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
