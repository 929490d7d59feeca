//! 数据缓存接口

use async_trait::async_trait;
use futures::future::BoxFuture;
use infrastructure_common::{BoxError, CacheError};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// 类型擦除的缓存值
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// 类型擦除的缓存工厂
pub type CacheFactory = Box<dyn FnOnce() -> BoxFuture<'static, Result<CachedValue, BoxError>> + Send>;

/// 键谓词
pub type KeyPredicate<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// 数据缓存 trait
///
/// 同一键的未命中在并发调用下只执行一次工厂；工厂失败不缓存。
#[async_trait]
pub trait DataCache: Send + Sync {
    /// 缓存名称
    fn name(&self) -> &str;

    /// 取值；缺失或过期时执行工厂并以超时时间保存
    async fn get_or_create_erased(
        &self,
        key: &str,
        timeout: Duration,
        factory: CacheFactory,
    ) -> Result<CachedValue, CacheError>;

    /// 删除所有匹配的键，返回删除数量
    fn remove(&self, predicate: KeyPredicate<'_>) -> usize;

    /// 删除单个键
    fn remove_key(&self, key: &str) -> bool;

    /// 缓存项数量（含已过期未清理的项）
    fn len(&self) -> usize;

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    fn clear(&self);
}

/// 类型化的缓存访问
pub trait DataCacheExt: DataCache {
    /// 取值或创建，值以 `Arc<V>` 共享
    fn get_or_create<'a, V, F, Fut, E>(
        &'a self,
        key: &'a str,
        timeout: Duration,
        factory: F,
    ) -> BoxFuture<'a, Result<Arc<V>, CacheError>>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let erased: CacheFactory = Box::new(move || -> BoxFuture<'static, Result<CachedValue, BoxError>> {
            Box::pin(async move {
                let created: Result<V, E> = factory().await;
                created
                    .map(|value| Arc::new(value) as CachedValue)
                    .map_err(Into::<BoxError>::into)
            })
        });

        Box::pin(async move {
            let value = self.get_or_create_erased(key, timeout, erased).await?;
            value.downcast::<V>().map_err(|_| CacheError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<V>().to_string(),
            })
        })
    }

    /// 删除所有以前缀开头的键
    fn remove_prefix(&self, prefix: &str) -> usize {
        self.remove(&|key: &str| key.starts_with(prefix))
    }
}

impl<T: DataCache + ?Sized> DataCacheExt for T {}
