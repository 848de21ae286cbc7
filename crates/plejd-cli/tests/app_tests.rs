//! Application setup tests: key parsing, catalog loading and diagnostics
//! subcommands. None of these open a Bluetooth adapter.

use std::path::{Path, PathBuf};

use plejd_cli::commands::{render_config, CommandDispatcher};
use plejd_cli::{AppConfig, Commands, PlejdApp};
use plejd_core::{crypto, Catalog, LinkAddress, MeshKey};
use tempfile::TempDir;

const KEY: &str = "00112233-4455-6677-8899-aabbccddeeff";

const CATALOG: &str = r#"{
    "devices": [
        { "address": 11, "serialNumber": "FEDCBA987654", "name": "Kitchen",
          "dimmable": true, "room": "Kitchen", "type": "light" },
        { "address": 12, "name": "Porch", "type": "switch" }
    ],
    "scenes": [
        { "index": 1, "name": "Evening",
          "steps": [ { "command": "turn_on", "device": 11, "brightness": 64 } ] }
    ]
}"#;

fn scratch_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn config_with_catalog(dir: &Path) -> AppConfig {
    let catalog_path = dir.join("site.json");
    std::fs::write(&catalog_path, CATALOG).unwrap();
    AppConfig::default().with_overrides(Some(KEY.to_string()), Some(catalog_path), false)
}

#[test]
fn test_app_loads_catalog() {
    let dir = scratch_dir();
    let app = PlejdApp::new(config_with_catalog(dir.path())).unwrap();

    assert_eq!(app.catalog().len(), 2);
    assert_eq!(app.catalog().scenes.len(), 1);
    assert_eq!(
        app.catalog()
            .find_by_serial("/org/bluez/hci0/dev_FE_DC_BA_98_76_54")
            .map(|d| d.name.as_str()),
        Some("Kitchen")
    );
}

#[test]
fn test_app_rejects_missing_key() {
    assert!(PlejdApp::new(AppConfig::default()).is_err());
}

#[test]
fn test_app_rejects_missing_catalog_file() {
    let config = AppConfig::default().with_overrides(
        Some(KEY.to_string()),
        Some(PathBuf::from("/nonexistent/site.json")),
        false,
    );
    assert!(PlejdApp::new(config).is_err());
}

#[test]
fn test_catalog_dump_round_trips() {
    let dir = scratch_dir();
    let mut config = config_with_catalog(dir.path());
    let dump = dir.path().join("out").join("catalog.json");
    config.catalog_dump_path = Some(dump.clone());

    let app = PlejdApp::new(config).unwrap();
    let dumped = Catalog::load(&dump).unwrap();
    assert_eq!(&dumped, app.catalog());
}

#[test]
fn test_keystream_matches_cipher_engine() {
    let dir = scratch_dir();
    let app = PlejdApp::new(config_with_catalog(dir.path())).unwrap();

    let key: MeshKey = KEY.parse().unwrap();
    let address = LinkAddress::from_platform_address("FE:DC:BA:98:76:54").unwrap();
    let expected = hex::encode(crypto::derive_keystream(&key, &address));

    assert_eq!(app.keystream("FE:DC:BA:98:76:54").unwrap(), expected);
    assert!(app.keystream("not-an-address").is_err());
}

#[test]
fn test_config_renders_without_a_key() {
    let config = AppConfig::default();
    assert!(config.validate().is_err());

    let rendered = render_config(&config).unwrap();
    assert!(rendered.contains("[link]"));
    assert!(rendered.contains("connection_timeout_secs = 2"));
    assert!(!rendered.contains("crypto_key"));
}

#[tokio::test]
async fn test_config_command_skips_validation() {
    let config = AppConfig::default().with_overrides(Some("not-hex".to_string()), None, false);
    assert!(CommandDispatcher::execute(Commands::Config, config.clone())
        .await
        .is_ok());
    assert!(CommandDispatcher::execute(Commands::Catalog, config)
        .await
        .is_err());
}
