//! 能力绑定
//!
//! 能力以 `dyn Trait` 的类型标识区分。实现到能力的转换由作者显式声明，
//! 之后被擦除为可存储在注册表中的投影函数。

use infrastructure_common::TypeInfo;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 类型擦除后的组件实例
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// 投影结果：内部装着 `Arc<C>`
pub type ProjectedInstance = Box<dyn Any + Send + Sync>;

type ProjectFn = Arc<dyn Fn(AnyInstance) -> Option<ProjectedInstance> + Send + Sync>;

/// 实现类型到某个能力的绑定
#[derive(Clone)]
pub struct CapabilityBinding {
    capability: TypeInfo,
    implementation: TypeInfo,
    project: ProjectFn,
}

impl CapabilityBinding {
    /// 由转换函数创建绑定，通常通过 [`capability!`](crate::capability) 宏调用
    pub fn of<T, C>(cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        T: Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
    {
        let project: ProjectFn = Arc::new(move |instance: AnyInstance| {
            let typed = instance.downcast::<T>().ok()?;
            Some(Box::new(cast(typed)) as ProjectedInstance)
        });

        Self {
            capability: TypeInfo::of::<C>(),
            implementation: TypeInfo::of::<T>(),
            project,
        }
    }

    /// 能力类型
    pub fn capability(&self) -> &TypeInfo {
        &self.capability
    }

    /// 实现类型
    pub fn implementation(&self) -> &TypeInfo {
        &self.implementation
    }

    /// 是否绑定到指定能力
    pub fn is<C: ?Sized + 'static>(&self) -> bool {
        self.capability.is::<C>()
    }

    /// 将实例投影为能力，实例类型不符时返回 `None`
    pub fn project(&self, instance: AnyInstance) -> Option<ProjectedInstance> {
        (self.project)(instance)
    }

    /// 将实例投影为具体的能力句柄
    pub fn project_as<C: ?Sized + Send + Sync + 'static>(&self, instance: AnyInstance) -> Option<Arc<C>> {
        if !self.is::<C>() {
            return None;
        }
        self.project(instance)?.downcast::<Arc<C>>().ok().map(|boxed| *boxed)
    }
}

impl fmt::Debug for CapabilityBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityBinding")
            .field("capability", &self.capability.name)
            .field("implementation", &self.implementation.name)
            .finish()
    }
}

/// 声明实现类型提供的能力
///
/// ```ignore
/// let binding = capability!(EnglishGreeter => dyn Greeter);
/// let self_binding = capability!(EnglishGreeter);
/// ```
#[macro_export]
macro_rules! capability {
    ($implementation:ty => $capability:ty) => {
        $crate::CapabilityBinding::of::<$implementation, $capability>(
            |instance: ::std::sync::Arc<$implementation>| -> ::std::sync::Arc<$capability> { instance },
        )
    };
    ($implementation:ty) => {
        $crate::CapabilityBinding::of::<$implementation, $implementation>(
            |instance: ::std::sync::Arc<$implementation>| -> ::std::sync::Arc<$implementation> { instance },
        )
    };
}
