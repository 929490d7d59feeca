//! # 论坛组合根
//!
//! 这个 crate 把论坛的插件单元和内置默认实现组合成一个可解析的依赖注入容器。
//!
//! ## 主要功能
//!
//! - **插件扫描**: 从进程内目录或插件清单目录发现插件单元，按优先级排序
//! - **导出提取**: 读取导出标记，推导或使用显式声明的能力
//! - **分阶段组合**: 按固定的八个阶段合并注册，先注册者成为默认实现
//! - **事件分发**: 作用域内的事件分发器，按顺序调用已注册的事件处理器
//! - **生命周期管理**: 启动服务、请求作用域、重新组合和停止
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::ForumInfrastructure;
//! use infrastructure_composition::forum::ThemeProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let infrastructure = ForumInfrastructure::builder()
//!         .with_config_file("forum.toml")
//!         .build()
//!         .await?;
//!
//!     // 按优先级执行启动服务
//!     infrastructure.start().await?;
//!
//!     let request = infrastructure.begin_request("GET /topics");
//!     let theme = request.resolve::<dyn ThemeProvider>()?;
//!     println!("当前主题: {}", theme.theme());
//!     request.dispose();
//!
//!     infrastructure.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod capabilities;
pub mod composer;
pub mod defaults;
pub mod events;
pub mod extractor;
pub mod forum;
pub mod infrastructure;
pub mod scanner;
pub mod settings;

#[cfg(test)]
mod tests;

// 重新导出主要类型
pub use builder::{ForumInfrastructureBuilder, LoggingConfig};
pub use capabilities::{ForumEditor, ForumModule, LocatablePage, StartupService, EXTENSION_ASSEMBLIES};
pub use composer::{CompositionPhase, CompositionReport, PhaseReport, RegistryComposer};
pub use events::{EventRaiser, ForumEvent, ForumInitEvent, HandleEvent};
pub use extractor::ExportExtractor;
pub use infrastructure::{ForumInfrastructure, InfrastructureMetrics, InfrastructureStatus};
pub use scanner::{CatalogScanner, DirectoryScanner, PluginManifest};
pub use settings::ForumSettings;

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
