//! 通用绑定（阶段 4）
//!
//! 扩展程序集列表、配置、当前版块、缓存与对象存储、命名锁、数据访问和仓储。

use crate::capabilities::EXTENSION_ASSEMBLIES;
use crate::forum::{DbAccessProvider, HaveBoardId, LockProvider, Repository, RepositoryProvider};
use crate::settings::ForumSettings;
use caching_abstractions::DataCache;
use caching_memory::MemoryDataCache;
use dashmap::DashMap;
use di_abstractions::{capability, AssemblyInfo, ComponentBatch, ResolverExt};
use infrastructure_common::LifetimeScope;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// 对象存储的注册名称
pub const OBJECT_STORE: &str = "ObjectStore";

/// 当前版块
#[derive(Debug, Clone, Copy)]
pub struct CurrentBoard {
    board_id: i32,
}

impl CurrentBoard {
    /// 创建
    pub fn new(board_id: i32) -> Self {
        Self { board_id }
    }
}

impl HaveBoardId for CurrentBoard {
    fn board_id(&self) -> i32 {
        self.board_id
    }
}

/// 进程内命名锁
#[derive(Debug, Default)]
pub struct NamedLocks {
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl LockProvider for NamedLocks {
    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.entry(key.to_string()).or_default().value())
    }
}

/// 按配置创建的数据访问提供者
#[derive(Debug)]
pub struct ConfiguredDbAccess {
    provider: String,
    connection_string: Option<String>,
    initialized: AtomicBool,
}

impl ConfiguredDbAccess {
    /// 从配置创建
    pub fn from_settings(settings: &ForumSettings) -> Self {
        Self {
            provider: settings.database.provider.clone(),
            connection_string: settings.database.connection_string.clone(),
            initialized: AtomicBool::new(false),
        }
    }
}

impl DbAccessProvider for ConfiguredDbAccess {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

/// 内存表集合，所有仓储共享
#[derive(Debug, Default)]
pub struct InMemoryTables {
    tables: DashMap<String, Arc<MemoryRepository>>,
}

impl InMemoryTables {
    fn table(&self, entity: &str) -> Arc<MemoryRepository> {
        let entry = self
            .tables
            .entry(entity.to_string())
            .or_insert_with(|| Arc::new(MemoryRepository::new(entity)));
        Arc::clone(entry.value())
    }
}

/// 单个实体的内存仓储
#[derive(Debug)]
pub struct MemoryRepository {
    entity: String,
    rows: RwLock<BTreeMap<i64, serde_json::Value>>,
}

impl MemoryRepository {
    fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Repository for MemoryRepository {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn upsert(&self, id: i64, value: serde_json::Value) {
        self.rows.write().insert(id, value);
    }

    fn get(&self, id: i64) -> Option<serde_json::Value> {
        self.rows.read().get(&id).cloned()
    }

    fn delete(&self, id: i64) -> bool {
        self.rows.write().remove(&id).is_some()
    }

    fn count(&self) -> usize {
        self.rows.read().len()
    }
}

/// 通用仓储提供者，每个依赖新建，数据保存在共享的 [`InMemoryTables`] 中
pub struct BasicRepositoryProvider {
    tables: Arc<InMemoryTables>,
}

impl RepositoryProvider for BasicRepositoryProvider {
    fn repository(&self, entity: &str) -> Arc<dyn Repository> {
        self.tables.table(entity)
    }
}

/// 注册通用绑定
pub fn register_general(batch: &mut ComponentBatch, settings: &Arc<ForumSettings>, extensions: Vec<AssemblyInfo>) {
    debug!("注册扩展程序集列表: {} 个", extensions.len());
    batch
        .register_instance(Arc::new(extensions))
        .as_named(EXTENSION_ASSEMBLIES, capability!(Vec<AssemblyInfo>));

    batch.register_instance(Arc::clone(settings)).as_self();

    batch
        .register::<CurrentBoard, _>(|r| {
            let settings = r.resolve::<ForumSettings>()?;
            Ok(CurrentBoard::new(settings.board.default_board_id))
        })
        .as_service(capability!(CurrentBoard => dyn HaveBoardId))
        .with_lifetime(LifetimeScope::PerScope);

    batch
        .register::<MemoryDataCache, _>(|_| Ok(MemoryDataCache::new("data-cache")))
        .as_service(capability!(MemoryDataCache => dyn DataCache))
        .with_lifetime(LifetimeScope::Singleton);

    batch
        .register::<MemoryDataCache, _>(|_| Ok(MemoryDataCache::new("object-store")))
        .as_named(OBJECT_STORE, capability!(MemoryDataCache => dyn DataCache))
        .with_lifetime(LifetimeScope::Singleton);

    batch
        .register::<NamedLocks, _>(|_| Ok(NamedLocks::default()))
        .as_service(capability!(NamedLocks => dyn LockProvider))
        .with_lifetime(LifetimeScope::Singleton);

    batch
        .register::<ConfiguredDbAccess, _>(|r| {
            let settings = r.resolve::<ForumSettings>()?;
            Ok(ConfiguredDbAccess::from_settings(&settings))
        })
        .as_service(capability!(ConfiguredDbAccess => dyn DbAccessProvider))
        .with_lifetime(LifetimeScope::Singleton);

    batch
        .register::<InMemoryTables, _>(|_| Ok(InMemoryTables::default()))
        .as_self()
        .with_lifetime(LifetimeScope::Singleton);

    batch
        .register::<BasicRepositoryProvider, _>(|r| {
            Ok(BasicRepositoryProvider {
                tables: r.resolve::<InMemoryTables>()?,
            })
        })
        .as_service(capability!(BasicRepositoryProvider => dyn RepositoryProvider))
        .with_lifetime(LifetimeScope::PerDependency);
}
