//! 服务注册表
//!
//! 组合期间只追加；同一服务键的后续注册被保留但永远不会成为默认提供者。
//! 组合完成后以 `Arc<Registry>` 发布，之后不可变。

use crate::lifetime::{InstantiationPolicy, LifetimeScopeResolver};
use di_abstractions::{CapabilityBinding, ComponentBatch, Constructor, ServiceKey};
use infrastructure_common::{ComponentError, LifetimeScope, TypeInfo};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 注册编号，按合并顺序递增
pub type RegistrationId = usize;

/// 已合并的注册
pub struct Registration {
    id: RegistrationId,
    implementation: TypeInfo,
    constructor: Constructor,
    lifetime: LifetimeScope,
    policy: InstantiationPolicy,
    disposer: Option<CapabilityBinding>,
    phase: String,
}

impl Registration {
    /// 注册编号
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// 实现类型
    pub fn implementation(&self) -> &TypeInfo {
        &self.implementation
    }

    /// 构造函数
    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// 声明的生命周期
    pub fn lifetime(&self) -> LifetimeScope {
        self.lifetime
    }

    /// 实例化策略
    pub fn policy(&self) -> InstantiationPolicy {
        self.policy
    }

    /// 释放能力
    pub fn disposer(&self) -> Option<&CapabilityBinding> {
        self.disposer.as_ref()
    }

    /// 来源阶段
    pub fn phase(&self) -> &str {
        &self.phase
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("implementation", &self.implementation.name)
            .field("lifetime", &self.lifetime)
            .field("phase", &self.phase)
            .finish()
    }
}

/// 服务键下的一个提供者
#[derive(Debug, Clone)]
pub struct ServiceEntry {
    registration: Arc<Registration>,
    binding: CapabilityBinding,
}

impl ServiceEntry {
    /// 提供者的注册
    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    /// 能力投影
    pub fn binding(&self) -> &CapabilityBinding {
        &self.binding
    }
}

/// 绑定摘要，用于报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSummary {
    /// 服务键
    pub service: String,
    /// 默认实现
    pub implementation: String,
    /// 生命周期
    pub lifetime: LifetimeScope,
    /// 默认实现的来源阶段
    pub phase: String,
    /// 提供者总数
    pub providers: usize,
}

/// 一次合并的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// 新增的注册
    pub registrations: usize,
    /// 作为新默认的服务键
    pub new_defaults: usize,
    /// 被已有默认遮蔽的服务键
    pub shadowed: usize,
}

/// 服务注册表
#[derive(Debug, Default)]
pub struct Registry {
    registrations: Vec<Arc<Registration>>,
    services: HashMap<ServiceKey, Vec<ServiceEntry>>,
    key_order: Vec<ServiceKey>,
}

impl Registry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个阶段的批次
    ///
    /// 先校验整批再追加，失败时注册表保持不变。
    pub fn merge(
        &mut self,
        batch: ComponentBatch,
        phase: &str,
        lifetimes: &LifetimeScopeResolver,
    ) -> Result<MergeOutcome, ComponentError> {
        let mut validated = Vec::with_capacity(batch.len());
        for spec in batch.into_specs() {
            spec.validate()?;
            let policy = lifetimes.resolve(spec.lifetime(), &spec.implementation().name)?;
            validated.push((spec, policy));
        }

        let mut outcome = MergeOutcome::default();
        for (spec, policy) in validated {
            let registration = Arc::new(Registration {
                id: self.registrations.len(),
                implementation: spec.implementation().clone(),
                constructor: Arc::clone(spec.constructor()),
                lifetime: spec.lifetime(),
                policy,
                disposer: spec.disposer().cloned(),
                phase: phase.to_string(),
            });
            self.registrations.push(Arc::clone(&registration));
            outcome.registrations += 1;

            for service in spec.services() {
                let entries = self.services.entry(service.key.clone()).or_default();
                if entries.is_empty() {
                    self.key_order.push(service.key.clone());
                    outcome.new_defaults += 1;
                } else {
                    debug!(
                        "保留已有默认: {} -> {}，追加 {}",
                        service.key,
                        entries[0].registration.implementation,
                        registration.implementation
                    );
                    outcome.shadowed += 1;
                }
                entries.push(ServiceEntry {
                    registration: Arc::clone(&registration),
                    binding: service.binding,
                });
            }
        }

        info!(
            "阶段 {} 合并完成: {} 个注册, {} 个新服务, {} 个被遮蔽",
            phase, outcome.registrations, outcome.new_defaults, outcome.shadowed
        );
        Ok(outcome)
    }

    /// 服务键的默认提供者（最先注册者）
    pub fn default_for(&self, key: &ServiceKey) -> Option<&ServiceEntry> {
        self.services.get(key).and_then(|entries| entries.first())
    }

    /// 服务键的全部提供者，按注册顺序
    pub fn all_for(&self, key: &ServiceKey) -> &[ServiceEntry] {
        self.services.get(key).map_or(&[], Vec::as_slice)
    }

    /// 是否注册了服务键
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.services.contains_key(key)
    }

    /// 全部注册，按合并顺序
    pub fn registrations(&self) -> &[Arc<Registration>] {
        &self.registrations
    }

    /// 注册数量
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// 服务键数量
    pub fn service_count(&self) -> usize {
        self.key_order.len()
    }

    /// 每个服务键的默认绑定摘要，按首次注册顺序
    pub fn describe(&self) -> Vec<BindingSummary> {
        self.key_order
            .iter()
            .filter_map(|key| {
                let entries = self.services.get(key)?;
                let default = entries.first()?;
                Some(BindingSummary {
                    service: key.to_string(),
                    implementation: default.registration.implementation.name.clone(),
                    lifetime: default.registration.lifetime,
                    phase: default.registration.phase.clone(),
                    providers: entries.len(),
                })
            })
            .collect()
    }
}
