//! 随宿主程序编译的搜索插件 `forum.search`

use di_abstractions::{capability, ExportMarker, PluginAssembly, PluginType, ResolverExt};
use infrastructure_common::BoxError;
use infrastructure_composition::forum::RepositoryProvider;
use infrastructure_composition::ForumModule;
use std::sync::Arc;
use tracing::info;

/// 主题全文索引
pub trait SearchIndex: Send + Sync {
    /// 索引的主题数量
    fn indexed_topics(&self) -> usize;
}

/// 基于主题仓储的索引
pub struct RepositorySearchIndex {
    repositories: Arc<dyn RepositoryProvider>,
}

impl SearchIndex for RepositorySearchIndex {
    fn indexed_topics(&self) -> usize {
        self.repositories.repository("topics").count()
    }
}

/// 搜索模块
#[derive(Debug, Default)]
pub struct SearchModule;

impl ForumModule for SearchModule {
    fn module_name(&self) -> &str {
        "Search"
    }

    fn sort_order(&self) -> i32 {
        5
    }

    fn init(&self) -> Result<(), BoxError> {
        info!("搜索模块已就绪");
        Ok(())
    }
}

/// 构造搜索插件单元
pub fn search_assembly() -> PluginAssembly {
    PluginAssembly::new("forum.search", 10)
        .with_description("主题全文搜索")
        .with_author("Forum Platform Team")
        .with_type(
            PluginType::new::<RepositorySearchIndex, _>(|r| {
                Ok(RepositorySearchIndex {
                    repositories: r.resolve::<dyn RepositoryProvider>()?,
                })
            })
            .implements(capability!(RepositorySearchIndex => dyn SearchIndex))
            .exported(ExportMarker::singleton()),
        )
        .with_type(
            PluginType::new::<SearchModule, _>(|_| Ok(SearchModule))
                .implements(capability!(SearchModule => dyn ForumModule)),
        )
}
