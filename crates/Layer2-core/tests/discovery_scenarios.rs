//! 매니페스트 디렉토리 로드 및 설정 연동 테스트

use plugcode_core::plugin::{CandidateType, Plugin, PluginCatalog, PluginDescriptor, PluginLoader};
use plugcode_core::{Error, LoaderSettings, SettingsLoader};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

#[derive(Default)]
struct Invoice;

impl Plugin for Invoice {
    fn plugin_id(&self) -> &str {
        "billing.invoice"
    }

    fn plugin_type(&self) -> &str {
        "billing"
    }
}

#[derive(Default)]
struct Tax;

impl Plugin for Tax {
    fn plugin_id(&self) -> &str {
        "billing.tax"
    }

    fn plugin_type(&self) -> &str {
        "billing"
    }
}

#[derive(Default)]
struct Audit;

impl Plugin for Audit {
    fn plugin_id(&self) -> &str {
        "audit"
    }

    fn plugin_type(&self) -> &str {
        "security"
    }
}

fn catalog() -> Arc<PluginCatalog> {
    let mut catalog = PluginCatalog::new();
    catalog
        .register("billing.invoice", PluginDescriptor::of::<Invoice>())
        .register("billing.tax", PluginDescriptor::of::<Tax>())
        .register("audit", PluginDescriptor::of::<Audit>())
        .register_candidate(
            "billing.base",
            CandidateType::plugin(PluginDescriptor::of::<Invoice>()).abstract_type(),
        );
    Arc::new(catalog)
}

async fn write_manifest(dir: &Path, file: &str, name: &str, plugins: &[&str]) {
    let manifest = serde_json::json!({ "name": name, "plugins": plugins });
    fs::write(dir.join(file), manifest.to_string()).await.unwrap();
}

fn ids(loader: &PluginLoader) -> Vec<String> {
    loader
        .instances()
        .unwrap()
        .iter()
        .map(|instance| instance.plugin_id().to_string())
        .collect()
}

#[tokio::test]
async fn test_load_directory_in_file_order() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path(), "20-audit.plugin.json", "audit", &["audit"]).await;
    write_manifest(
        temp.path(),
        "10-billing.plugin.json",
        "billing",
        &["billing.tax", "billing.base", "billing.invoice"],
    )
    .await;
    fs::write(temp.path().join("readme.md"), "# plugins").await.unwrap();

    let loader = PluginLoader::new();
    let merged = loader.load_directory(temp.path(), catalog(), None).await.unwrap();

    assert_eq!(merged, 3);
    assert_eq!(ids(&loader), vec!["billing.tax", "billing.invoice", "audit"]);
}

#[tokio::test]
async fn test_load_directory_with_filter() {
    let temp = TempDir::new().unwrap();
    write_manifest(
        temp.path(),
        "billing.plugin.json",
        "billing",
        &["billing.invoice", "billing.tax"],
    )
    .await;

    let loader = PluginLoader::new();
    let only_tax = |descriptor: &PluginDescriptor| descriptor.is::<Tax>();
    let merged = loader
        .load_directory(temp.path(), catalog(), Some(&only_tax))
        .await
        .unwrap();

    assert_eq!(merged, 1);
    assert_eq!(ids(&loader), vec!["billing.tax"]);
}

#[tokio::test]
async fn test_load_directory_stops_at_first_failure() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path(), "a.plugin.json", "first", &["audit"]).await;
    write_manifest(temp.path(), "b.plugin.json", "second", &["billing.unknown"]).await;
    write_manifest(temp.path(), "c.plugin.json", "third", &["billing.tax"]).await;

    let loader = PluginLoader::new();
    let err = loader
        .load_directory(temp.path(), catalog(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SourceResolution { ref source_name, .. } if source_name == "second"));
    // 실패 이전 소스는 병합된 상태로 남음
    assert_eq!(loader.pending_len(), 1);
    assert_eq!(ids(&loader), vec!["audit"]);
}

#[tokio::test]
async fn test_load_directory_missing() {
    let temp = TempDir::new().unwrap();
    let loader = PluginLoader::new();

    let result = loader
        .load_directory(temp.path().join("nope"), catalog(), None)
        .await;
    assert!(matches!(result, Err(Error::SourceResolution { .. })));
}

#[test]
fn test_load_manifest_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("single.plugin.json");
    std::fs::write(
        &path,
        r#"{
            // single manifest
            "name": "single",
            "plugins": ["billing.invoice"]
        }"#,
    )
    .unwrap();

    let loader = PluginLoader::new();
    assert_eq!(loader.load_manifest(&path, catalog()).unwrap(), 1);
    assert_eq!(ids(&loader), vec!["billing.invoice"]);

    let missing = loader.load_manifest(temp.path().join("absent.plugin.json"), catalog());
    assert!(matches!(missing, Err(Error::SourceResolution { .. })));
}

#[tokio::test]
async fn test_settings_drive_discovery() {
    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join(".plugcode");
    let plugin_dir = temp.path().join("plugins");
    fs::create_dir_all(&config_dir).await.unwrap();
    fs::create_dir_all(&plugin_dir).await.unwrap();

    let settings = serde_json::json!({
        "pluginDirs": [plugin_dir, temp.path().join("missing"), config_dir.join("settings.json")],
        "manifestSuffix": ".bundle.json",
        "consoleDiagnostics": true
    });
    fs::write(config_dir.join("settings.json"), settings.to_string())
        .await
        .unwrap();

    write_manifest(&plugin_dir, "core.bundle.json", "core", &["audit"]).await;
    write_manifest(&plugin_dir, "ignored.plugin.json", "ignored", &["billing.tax"]).await;

    let settings: LoaderSettings = SettingsLoader::with_paths(vec![config_dir.join("settings.json")]).load_all();
    assert_eq!(settings.manifest_suffix(), ".bundle.json");

    let loader = PluginLoader::from_settings(settings);
    let merged = loader.load_configured_directories(catalog()).await.unwrap();

    assert_eq!(merged, 1);
    assert_eq!(ids(&loader), vec!["audit"]);
}
