//! 解析上下文
//!
//! 一次顶层解析对应一个上下文，构造函数通过它递归解析依赖。
//! 解析链用于检测循环依赖。

use crate::container::{Scope, ScopeHandle};
use crate::lifetime::Sharing;
use crate::registry::Registration;
use di_abstractions::{AnyInstance, ComponentResolver, ProjectedInstance, ResolveOptions, ServiceKey};
use infrastructure_common::DependencyError;
use std::sync::Arc;
use tracing::trace;

/// 解析上下文
pub struct ResolveContext {
    scope: Scope,
    resolution_chain: Vec<Arc<Registration>>,
    options: ResolveOptions,
}

impl ResolveContext {
    /// 在指定作用域上创建解析上下文
    pub fn new(scope: Scope, options: ResolveOptions) -> Self {
        Self {
            scope,
            resolution_chain: Vec::new(),
            options,
        }
    }

    /// 当前作用域
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn chain_description(&self, next: &Registration) -> String {
        self.resolution_chain
            .iter()
            .map(|r| r.implementation().name.as_str())
            .chain(std::iter::once(next.implementation().name.as_str()))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn push(&mut self, registration: &Arc<Registration>) -> Result<(), DependencyError> {
        if self.resolution_chain.iter().any(|r| r.id() == registration.id()) {
            return Err(DependencyError::CircularDependency {
                dependency_chain: self.chain_description(registration),
            });
        }
        if self.resolution_chain.len() >= self.options.max_depth {
            return Err(DependencyError::MaxDepthExceeded {
                max_depth: self.options.max_depth,
                dependency_chain: self.chain_description(registration),
            });
        }
        self.resolution_chain.push(Arc::clone(registration));
        Ok(())
    }

    fn pop(&mut self) {
        self.resolution_chain.pop();
    }

    /// 在指定作用域下调用构造函数
    fn construct_in(&mut self, owner: &Scope, registration: &Arc<Registration>) -> Result<AnyInstance, DependencyError> {
        self.push(registration)?;
        let previous = std::mem::replace(&mut self.scope, owner.clone());
        trace!("构造组件: {} (作用域 {})", registration.implementation(), owner.name());
        let resolver: &mut dyn ComponentResolver = self;
        let result = (registration.constructor())(resolver);
        self.scope = previous;
        self.pop();

        let instance = result?;
        owner.track(registration, &instance);
        Ok(instance)
    }

    fn shared_in(&mut self, owner: &Scope, registration: &Arc<Registration>) -> Result<AnyInstance, DependencyError> {
        owner.ensure_active()?;
        let cell = owner.cell_for(registration.id());
        if let Some(existing) = cell.get() {
            return Ok(Arc::clone(existing));
        }
        // 构造前检查循环依赖，避免在同一个 OnceCell 上重入
        if self.resolution_chain.iter().any(|r| r.id() == registration.id()) {
            return Err(DependencyError::CircularDependency {
                dependency_chain: self.chain_description(registration),
            });
        }
        cell.get_or_try_init(|| self.construct_in(owner, registration)).map(Arc::clone)
    }

    /// 按注册的实例化策略取得实例
    pub fn activate(&mut self, registration: &Arc<Registration>) -> Result<AnyInstance, DependencyError> {
        self.scope.ensure_active()?;
        match registration.policy().sharing {
            Sharing::Root => {
                let root = self.scope.root();
                self.shared_in(&root, registration)
            }
            Sharing::Scope => {
                let current = self.scope.clone();
                self.shared_in(&current, registration)
            }
            Sharing::LogicalContext => {
                let context = self.scope.nearest_logical_context().ok_or_else(|| {
                    DependencyError::NoMatchingContext {
                        type_name: registration.implementation().name.clone(),
                    }
                })?;
                self.shared_in(&context, registration)
            }
            Sharing::None => {
                let current = self.scope.clone();
                self.construct_in(&current, registration)
            }
        }
    }
}

impl ComponentResolver for ResolveContext {
    fn resolve_service(&mut self, key: &ServiceKey) -> Result<ProjectedInstance, DependencyError> {
        // 当前作用域总是可解析
        if *key == ServiceKey::of::<ScopeHandle>() {
            return Ok(Box::new(Arc::new(self.scope.handle())) as ProjectedInstance);
        }
        let registry = Arc::clone(self.scope.registry());
        let entry = registry
            .default_for(key)
            .ok_or_else(|| DependencyError::UnresolvedCapability {
                capability: key.to_string(),
            })?;
        let instance = self.activate(entry.registration())?;
        entry.binding().project(instance).ok_or_else(|| DependencyError::TypeMismatch {
            capability: key.to_string(),
            implementation: entry.registration().implementation().name.clone(),
        })
    }

    fn resolve_all_services(&mut self, key: &ServiceKey) -> Result<Vec<ProjectedInstance>, DependencyError> {
        let registry = Arc::clone(self.scope.registry());
        registry
            .all_for(key)
            .iter()
            .map(|entry| {
                let instance = self.activate(entry.registration())?;
                entry.binding().project(instance).ok_or_else(|| DependencyError::TypeMismatch {
                    capability: key.to_string(),
                    implementation: entry.registration().implementation().name.clone(),
                })
            })
            .collect()
    }

    fn contains_service(&self, key: &ServiceKey) -> bool {
        *key == ServiceKey::of::<ScopeHandle>() || self.scope.registry().contains(key)
    }
}
