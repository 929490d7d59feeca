//! 组合根的集中集成测试
use di_abstractions::{capability, ExportMarker, PluginAssembly, PluginType, ResolverExt};
use infrastructure_common::{ComponentError, DependencyError, InfrastructureError};
use infrastructure_composition::forum::ThemeProvider;
use infrastructure_composition::{CompositionPhase, ForumInfrastructure, ForumInfrastructureBuilder, ForumSettings};
use std::path::Path;
use std::sync::Arc;

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct AlphaGreeter;
impl Greeter for AlphaGreeter {
    fn greet(&self) -> String {
        "alpha".to_string()
    }
}

struct BetaGreeter;
impl Greeter for BetaGreeter {
    fn greet(&self) -> String {
        "beta".to_string()
    }
}

struct ArchiveGreeter;
impl Greeter for ArchiveGreeter {
    fn greet(&self) -> String {
        "archive".to_string()
    }
}

struct DarkTheme;
impl ThemeProvider for DarkTheme {
    fn theme(&self) -> &str {
        "dark"
    }
}

/// 没有任何可导出能力的类型
struct Orphan;

struct Chicken {
    _egg: Arc<Egg>,
}

struct Egg {
    _chicken: Arc<Chicken>,
}

fn greeter_plugin<T: Greeter + 'static>(name: &str, priority: i32, make: fn() -> T) -> PluginAssembly {
    PluginAssembly::new(name, priority).with_type(
        PluginType::new::<T, _>(move |_| Ok(make()))
            .implements(capability!(T => dyn Greeter))
            .exported(ExportMarker::singleton()),
    )
}

fn builder() -> ForumInfrastructureBuilder {
    ForumInfrastructure::builder().with_settings(ForumSettings::default())
}

#[tokio::test]
async fn test_higher_priority_export_becomes_default() {
    // 故意先贡献低优先级的单元
    let infrastructure = builder()
        .with_plugin(greeter_plugin("forum.beta", 5, || BetaGreeter))
        .with_plugin(greeter_plugin("forum.alpha", 10, || AlphaGreeter))
        .compose_through(CompositionPhase::ExternalExports)
        .build()
        .await
        .unwrap();

    assert_eq!(infrastructure.resolve::<dyn Greeter>().unwrap().greet(), "alpha");

    let all = infrastructure.container().resolve_all::<dyn Greeter>().unwrap();
    let greetings: Vec<String> = all.iter().map(|g| g.greet()).collect();
    assert_eq!(greetings, vec!["alpha", "beta"]);
    assert_eq!(infrastructure.report().phases.len(), 2);
}

#[tokio::test]
async fn test_plugin_export_keeps_default_over_builtin() {
    let theme_plugin = PluginAssembly::new("forum.themes", 1).with_type(
        PluginType::new::<DarkTheme, _>(|_| Ok(DarkTheme))
            .implements(capability!(DarkTheme => dyn ThemeProvider))
            .exported(ExportMarker::singleton()),
    );
    let infrastructure = builder().with_plugin(theme_plugin).build().await.unwrap();

    let request = infrastructure.begin_request("theme");
    assert_eq!(request.resolve::<dyn ThemeProvider>().unwrap().theme(), "dark");
    assert_eq!(request.resolve_all::<dyn ThemeProvider>().unwrap().len(), 2);
    request.dispose();

    let binding = infrastructure
        .bindings()
        .into_iter()
        .find(|b| b.service.contains("ThemeProvider"))
        .unwrap();
    assert_eq!(binding.phase, "external-exports");
    assert_eq!(binding.providers, 2);

    let shadowed = infrastructure
        .report()
        .phase(CompositionPhase::DomainServices)
        .unwrap()
        .shadowed;
    assert!(shadowed >= 1);
}

#[tokio::test]
async fn test_composition_is_deterministic() {
    let compose = || async {
        builder()
            .with_plugin(greeter_plugin("forum.beta", 5, || BetaGreeter))
            .with_plugin(greeter_plugin("forum.alpha", 5, || AlphaGreeter))
            .build()
            .await
            .unwrap()
    };
    let first = compose().await;
    let second = compose().await;

    assert_eq!(first.bindings(), second.bindings());
    assert_eq!(first.report().assemblies, second.report().assemblies);
    // 同优先级按贡献顺序
    assert_eq!(first.resolve::<dyn Greeter>().unwrap().greet(), "beta");
}

#[tokio::test]
async fn test_invalid_export_is_fatal() {
    let broken = PluginAssembly::new("forum.broken", 1)
        .with_type(PluginType::new::<Orphan, _>(|_| Ok(Orphan)).exported(ExportMarker::singleton()));

    let err = builder().with_plugin(broken).build().await.err().unwrap();
    assert!(matches!(err, InfrastructureError::Component(ComponentError::InvalidExport { .. })));
}

#[tokio::test]
async fn test_named_and_bare_addressing_are_distinct() {
    let archive = PluginAssembly::new("forum.archive", 3).with_type(
        PluginType::new::<ArchiveGreeter, _>(|_| Ok(ArchiveGreeter))
            .implements(capability!(ArchiveGreeter => dyn Greeter))
            .exported(ExportMarker::singleton().named("archive")),
    );

    let infrastructure = builder().with_plugin(archive).build().await.unwrap();
    assert_eq!(
        infrastructure.resolve_named::<dyn Greeter>("archive").unwrap().greet(),
        "archive"
    );
    let err = infrastructure.resolve::<dyn Greeter>().err().unwrap();
    assert!(matches!(
        err,
        InfrastructureError::Dependency(DependencyError::UnresolvedCapability { .. })
    ));

    let infrastructure = builder()
        .with_plugin(greeter_plugin("forum.alpha", 1, || AlphaGreeter))
        .with_plugin(
            PluginAssembly::new("forum.archive", 3).with_type(
                PluginType::new::<ArchiveGreeter, _>(|_| Ok(ArchiveGreeter))
                    .implements(capability!(ArchiveGreeter => dyn Greeter))
                    .exported(ExportMarker::singleton().named("archive")),
            ),
        )
        .build()
        .await
        .unwrap();
    assert_eq!(infrastructure.resolve::<dyn Greeter>().unwrap().greet(), "alpha");
    assert_eq!(
        infrastructure.resolve_named::<dyn Greeter>("archive").unwrap().greet(),
        "archive"
    );
}

#[tokio::test]
async fn test_cycle_is_reported_not_overflowed() {
    let cyclic = PluginAssembly::new("forum.cyclic", 1)
        .with_type(
            PluginType::new::<Chicken, _>(|r| Ok(Chicken { _egg: r.resolve::<Egg>()? }))
                .exported(ExportMarker::new(infrastructure_common::LifetimeScope::PerDependency)
                    .with_capability(capability!(Chicken))),
        )
        .with_type(
            PluginType::new::<Egg, _>(|r| Ok(Egg { _chicken: r.resolve::<Chicken>()? }))
                .exported(ExportMarker::new(infrastructure_common::LifetimeScope::PerDependency)
                    .with_capability(capability!(Egg))),
        );

    let infrastructure = builder().with_plugin(cyclic).build().await.unwrap();
    let err = infrastructure.resolve::<Chicken>().err().unwrap();
    match err {
        InfrastructureError::Dependency(DependencyError::CircularDependency { dependency_chain }) => {
            assert!(dependency_chain.contains("Chicken"));
            assert!(dependency_chain.contains("Egg"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

fn write_manifest(dir: &Path, file: &str, body: &str) {
    std::fs::write(dir.join(file), body).unwrap();
}

#[tokio::test]
async fn test_directory_scan_skips_and_reload_picks_up_new_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "forum.beta.plugin.toml", "assembly = \"forum.beta\"\npriority = 30\n");
    write_manifest(dir.path(), "forum.broken.plugin.toml", "assembly = ");
    write_manifest(dir.path(), "forum.ghost.plugin.toml", "assembly = \"forum.ghost\"\n");
    write_manifest(dir.path(), "forum.off.plugin.toml", "assembly = \"forum.alpha\"\nenabled = false\n");

    let infrastructure = builder()
        .with_plugin(greeter_plugin("forum.alpha", 50, || AlphaGreeter))
        .with_plugin(greeter_plugin("forum.beta", 1, || BetaGreeter))
        .with_plugins_dir(dir.path())
        .build()
        .await
        .unwrap();

    let scan = infrastructure.scan_report();
    assert_eq!(scan.names(), vec!["forum.beta", "forum.core"]);
    assert_eq!(scan.assemblies[0].priority(), 30);
    let skipped: Vec<&str> = scan.skipped.iter().map(|s| s.unit.as_str()).collect();
    assert_eq!(skipped, vec!["forum.broken.plugin.toml", "forum.ghost.plugin.toml"]);
    assert_eq!(infrastructure.resolve::<dyn Greeter>().unwrap().greet(), "beta");

    infrastructure.start().await.unwrap();
    write_manifest(dir.path(), "forum.off.plugin.toml", "assembly = \"forum.alpha\"\n");
    infrastructure.reload().await.unwrap();

    assert_eq!(
        infrastructure.scan_report().names(),
        vec!["forum.alpha", "forum.beta", "forum.core"]
    );
    assert_eq!(infrastructure.resolve::<dyn Greeter>().unwrap().greet(), "alpha");
    assert_eq!(infrastructure.get_metrics().await.reload_count, 1);
}

#[tokio::test]
async fn test_settings_layer_file_then_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forum.toml");
    std::fs::write(
        &path,
        "[board]\nname = \"Rust Forum\"\ntheme = \"classic\"\n\n[cache]\nreplace_rules_timeout_secs = 30\n",
    )
    .unwrap();
    std::env::set_var("FORUM_BOARD__THEME", "mobile");

    let settings = ForumSettings::load(Some(path.as_path())).unwrap();
    std::env::remove_var("FORUM_BOARD__THEME");

    assert_eq!(settings.board.name, "Rust Forum");
    assert_eq!(settings.board.theme, "mobile");
    assert_eq!(settings.cache.replace_rules_timeout().as_secs(), 30);
    assert_eq!(settings.plugins.primary, "forum.core");

    let infrastructure = ForumInfrastructure::builder()
        .with_settings(settings)
        .build()
        .await
        .unwrap();
    let request = infrastructure.begin_request("theme");
    assert_eq!(request.resolve::<dyn ThemeProvider>().unwrap().theme(), "mobile");
}
