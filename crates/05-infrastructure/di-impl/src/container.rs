//! 容器与作用域
//!
//! [`Container`] 持有不可变注册表和根作用域。嵌套作用域和逻辑上下文作用域
//! 以显式值传递，不依赖任何全局状态。

use crate::context::ResolveContext;
use crate::registry::{Registration, RegistrationId, Registry};
use chrono::{DateTime, Utc};
use di_abstractions::{AnyInstance, ResolveOptions, ResolverExt, ServiceKey};
use infrastructure_common::{DependencyError, Disposable};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use uuid::Uuid;

/// 作用域种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// 根作用域（进程级）
    Root,
    /// 普通嵌套作用域
    Nested,
    /// 逻辑上下文（请求等价物）
    LogicalContext,
}

type SharedCell = Arc<OnceCell<AnyInstance>>;

struct OwnedInstance {
    implementation: String,
    instance: Arc<dyn Disposable>,
}

struct ScopeInner {
    id: Uuid,
    name: String,
    kind: ScopeKind,
    created_at: DateTime<Utc>,
    registry: Arc<Registry>,
    parent: Option<Scope>,
    options: ResolveOptions,
    shared: Mutex<HashMap<RegistrationId, SharedCell>>,
    owned: Mutex<Vec<OwnedInstance>>,
    disposed: AtomicBool,
}

impl ScopeInner {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let owned = std::mem::take(&mut *self.owned.lock());
        debug!("释放作用域 {}: {} 个实例", self.name, owned.len());
        for entry in owned.into_iter().rev() {
            debug!("释放组件: {}", entry.implementation);
            entry.instance.dispose();
        }
        self.shared.lock().clear();
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// 组件作用域
///
/// 克隆得到的是同一作用域的句柄；最后一个句柄释放时作用域自动结束。
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    fn create(
        name: String,
        kind: ScopeKind,
        registry: Arc<Registry>,
        parent: Option<Scope>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: Uuid::new_v4(),
                name,
                kind,
                created_at: Utc::now(),
                registry,
                parent,
                options,
                shared: Mutex::new(HashMap::new()),
                owned: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    fn child(&self, name: &str, kind: ScopeKind) -> Self {
        Self::create(
            format!("{}.{}", self.inner.name, name),
            kind,
            Arc::clone(&self.inner.registry),
            Some(self.clone()),
            self.inner.options.clone(),
        )
    }

    /// 开启嵌套作用域
    pub fn begin_scope(&self, name: &str) -> Scope {
        self.child(name, ScopeKind::Nested)
    }

    /// 开启逻辑上下文（一次请求等价的工作单元）
    pub fn begin_logical_context(&self, name: &str) -> Scope {
        self.child(name, ScopeKind::LogicalContext)
    }

    /// 作用域ID
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 作用域种类
    pub fn kind(&self) -> ScopeKind {
        self.inner.kind
    }

    /// 创建时间
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// 父作用域
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// 注册表
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// 根作用域
    pub fn root(&self) -> Scope {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.clone()
    }

    /// 自身或最近的逻辑上下文祖先
    pub fn nearest_logical_context(&self) -> Option<Scope> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if scope.kind() == ScopeKind::LogicalContext {
                return Some(scope.clone());
            }
            current = scope.parent();
        }
        None
    }

    /// 是否已释放
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// 确认作用域仍可解析
    pub fn ensure_active(&self) -> Result<(), DependencyError> {
        if self.is_disposed() {
            return Err(DependencyError::ScopeDisposed {
                scope: self.inner.name.clone(),
            });
        }
        Ok(())
    }

    /// 按创建逆序释放本作用域拥有的实例
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// 本作用域拥有的可释放实例数量
    pub fn owned_count(&self) -> usize {
        self.inner.owned.lock().len()
    }

    /// 不延长生存期的作用域句柄
    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle {
            inner: Arc::downgrade(&self.inner),
            name: self.inner.name.clone(),
        }
    }

    pub(crate) fn cell_for(&self, id: RegistrationId) -> SharedCell {
        let mut shared = self.inner.shared.lock();
        Arc::clone(shared.entry(id).or_default())
    }

    pub(crate) fn track(&self, registration: &Registration, instance: &AnyInstance) {
        if !registration.policy().is_owned() {
            return;
        }
        let Some(disposer) = registration.disposer() else {
            return;
        };
        if let Some(disposable) = disposer.project_as::<dyn Disposable>(Arc::clone(instance)) {
            self.inner.owned.lock().push(OwnedInstance {
                implementation: registration.implementation().name.clone(),
                instance: disposable,
            });
        }
    }

    fn context(&self) -> ResolveContext {
        ResolveContext::new(self.clone(), self.inner.options.clone())
    }

    /// 解析能力的默认提供者
    pub fn resolve<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, DependencyError> {
        self.context().resolve::<C>()
    }

    /// 按名称解析能力
    pub fn resolve_named<C: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<C>, DependencyError> {
        self.context().resolve_named::<C>(name)
    }

    /// 按注册顺序解析全部提供者
    pub fn resolve_all<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<C>>, DependencyError> {
        self.context().resolve_all::<C>()
    }

    /// 未注册时返回 `None`
    pub fn try_resolve<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<C>>, DependencyError> {
        self.context().try_resolve::<C>()
    }

    /// 能力是否已注册
    pub fn is_registered<C: ?Sized + 'static>(&self) -> bool {
        self.inner.registry.contains(&ServiceKey::of::<C>())
    }
}

/// 作用域的弱引用句柄
///
/// 构造函数解析 `ScopeHandle` 得到正在构造它的作用域，之后可在该作用域内延迟解析。
#[derive(Clone)]
pub struct ScopeHandle {
    inner: Weak<ScopeInner>,
    name: String,
}

impl ScopeHandle {
    /// 取得仍然有效的作用域
    pub fn upgrade(&self) -> Result<Scope, DependencyError> {
        let scope = self
            .inner
            .upgrade()
            .map(|inner| Scope { inner })
            .ok_or_else(|| DependencyError::ScopeDisposed {
                scope: self.name.clone(),
            })?;
        scope.ensure_active()?;
        Ok(scope)
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle").field("name", &self.name).finish()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// 依赖注入容器
pub struct Container {
    registry: Arc<Registry>,
    root: Scope,
}

impl Container {
    /// 用组合完成的注册表创建容器
    pub fn new(registry: Registry) -> Self {
        Self::with_options(registry, ResolveOptions::default())
    }

    /// 指定解析选项
    pub fn with_options(registry: Registry, options: ResolveOptions) -> Self {
        let registry = Arc::new(registry);
        info!(
            "创建容器: {} 个注册, {} 个服务",
            registry.len(),
            registry.service_count()
        );
        let root = Scope::create("root".to_string(), ScopeKind::Root, Arc::clone(&registry), None, options);
        Self { registry, root }
    }

    /// 注册表
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// 根作用域
    pub fn root(&self) -> &Scope {
        &self.root
    }

    /// 开启嵌套作用域
    pub fn begin_scope(&self, name: &str) -> Scope {
        self.root.begin_scope(name)
    }

    /// 开启逻辑上下文
    pub fn begin_logical_context(&self, name: &str) -> Scope {
        self.root.begin_logical_context(name)
    }

    /// 在根作用域解析
    pub fn resolve<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, DependencyError> {
        self.root.resolve::<C>()
    }

    /// 在根作用域按名称解析
    pub fn resolve_named<C: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<C>, DependencyError> {
        self.root.resolve_named::<C>(name)
    }

    /// 在根作用域解析全部提供者
    pub fn resolve_all<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<C>>, DependencyError> {
        self.root.resolve_all::<C>()
    }

    /// 能力是否已注册
    pub fn is_registered<C: ?Sized + 'static>(&self) -> bool {
        self.root.is_registered::<C>()
    }

    /// 释放容器拥有的单例
    pub fn dispose(&self) {
        info!("释放容器");
        self.root.dispose();
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.registry.len())
            .field("root", &self.root)
            .finish()
    }
}
