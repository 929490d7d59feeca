//! 事件分发
//!
//! 处理器以 `dyn HandleEvent<E>` 能力注册。[`EventRaiser`] 按作用域共享，
//! 分发时在所属作用域内解析同一事件类型的全部处理器并按顺序调用。

use chrono::{DateTime, Utc};
use di_abstractions::{ComponentBatch, ResolverExt};
use di_impl::ScopeHandle;
use infrastructure_common::{BoxError, InfrastructureError, LifetimeScope};
use std::any::type_name;
use std::sync::Arc;
use tracing::{debug, warn};

/// 事件标记
pub trait ForumEvent: Send + Sync + 'static {}

/// 事件处理器
pub trait HandleEvent<E: ForumEvent>: Send + Sync {
    /// 处理器名称
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// 执行顺序，小的先执行
    fn order(&self) -> i32 {
        1000
    }

    /// 处理事件
    fn handle(&self, event: &E) -> Result<(), BoxError>;
}

/// 论坛初始化完成，启动服务全部执行后分发
#[derive(Debug, Clone)]
pub struct ForumInitEvent {
    /// 论坛名称
    pub board_name: String,
    /// 执行的启动服务数量
    pub startup_services: usize,
    /// 分发时间
    pub raised_at: DateTime<Utc>,
}

impl ForumEvent for ForumInitEvent {}

/// 作用域内的事件分发器
pub struct EventRaiser {
    scope: Arc<ScopeHandle>,
}

impl EventRaiser {
    /// 在句柄指向的作用域内分发
    pub fn new(scope: Arc<ScopeHandle>) -> Self {
        Self { scope }
    }

    /// 按顺序调用事件的全部处理器，返回处理器数量
    ///
    /// 同顺序的处理器保持注册顺序；任一处理器失败时停止分发。
    pub fn raise<E: ForumEvent>(&self, event: &E) -> Result<usize, InfrastructureError> {
        let scope = self.scope.upgrade()?;
        let mut handlers = scope.resolve_all::<dyn HandleEvent<E>>()?;
        handlers.sort_by_key(|handler| handler.order());

        let event_name = type_name::<E>();
        for handler in &handlers {
            debug!("分发事件 {} -> {}", event_name, handler.name());
            if let Err(source) = handler.handle(event) {
                warn!("事件处理失败: {} ({}): {}", event_name, handler.name(), source);
                return Err(InfrastructureError::EventHandlerFailed {
                    event: event_name.to_string(),
                    handler: handler.name().to_string(),
                    source,
                });
            }
        }
        Ok(handlers.len())
    }
}

/// 注册事件绑定
pub fn register_event_bindings(batch: &mut ComponentBatch) {
    batch
        .register::<EventRaiser, _>(|r| Ok(EventRaiser::new(r.resolve::<ScopeHandle>()?)))
        .as_self()
        .with_lifetime(LifetimeScope::PerScope);
}
