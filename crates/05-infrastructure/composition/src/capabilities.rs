//! 组合阶段按类型收集的能力
//!
//! 启动服务只从主程序集收集（阶段 7），论坛模块、编辑器和页面从全部插件单元收集（阶段 8）。

use async_trait::async_trait;
use di_impl::Scope;
use infrastructure_common::BoxError;

/// 扩展程序集列表的注册名称
pub const EXTENSION_ASSEMBLIES: &str = "ExtensionAssemblies";

/// 启动服务
///
/// 组合完成后按优先级降序各执行一次。
#[async_trait]
pub trait StartupService: Send + Sync {
    /// 服务名称
    fn name(&self) -> &str;

    /// 优先级，越大越先执行
    fn priority(&self) -> i32 {
        0
    }

    /// 执行启动逻辑，`scope` 为本次启动的作用域
    async fn run(&self, scope: &Scope) -> Result<(), BoxError>;
}

/// 论坛模块
pub trait ForumModule: Send + Sync {
    /// 模块名称
    fn module_name(&self) -> &str;

    /// 排序
    fn sort_order(&self) -> i32 {
        0
    }

    /// 初始化模块
    fn init(&self) -> Result<(), BoxError>;
}

/// 消息编辑器
pub trait ForumEditor: Send + Sync {
    /// 编辑器标识
    fn editor_id(&self) -> &str;

    /// 描述
    fn description(&self) -> &str;

    /// 是否允许 HTML
    fn allows_html(&self) -> bool;
}

/// 可定位的页面处理器
pub trait LocatablePage: Send + Sync {
    /// 页面名称
    fn page_name(&self) -> &str;
}
