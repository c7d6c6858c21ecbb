use packforge_core::{build_config, Rarity, Source};
use packforge_data::{
    default_assets_dir, load_assets, load_bundle_config, load_game_changers, load_pack_configs, load_powerup_catalog,
    resolve_bundle_config,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn assets_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("assets")
}

#[test]
fn shipped_assets_load() {
    let assets = load_assets(&assets_root()).expect("load assets");
    assert!(!assets.catalog.powerups.is_empty());
    for rarity in Rarity::ALL {
        assert!(
            assets.catalog.powerups.iter().any(|powerup| powerup.rarity == rarity),
            "no {rarity} powerup"
        );
    }
    assert!(assets.game_changers.contains("Cyclonic Rift"));
    let names: Vec<&str> = assets.pack_configs.iter().map(|bundle| bundle.name.as_str()).collect();
    assert_eq!(names, vec!["mixed_sources", "standard", "themed"]);
}

#[test]
fn default_dir_is_the_shipped_assets() {
    let dir = default_assets_dir();
    assert!(dir.join("powerups.json").is_file());
    assert!(dir.join("pack_configs").join("standard.json").is_file());
}

#[test]
fn shipped_powerups_build_valid_bundles() {
    let assets = load_assets(&assets_root()).expect("load assets");
    for powerup in &assets.catalog.powerups {
        let bundle = build_config(Some(powerup));
        bundle
            .validate()
            .unwrap_or_else(|err| panic!("{}: {err}", powerup.id));
        if let Some(special) = &powerup.effects.special_pack {
            assert!(bundle.pack_types.len() >= 2, "{} lost special pack {special}", powerup.id);
        }
    }
}

#[test]
fn mixed_sources_config_parses_each_slot_kind() {
    let bundle = load_bundle_config(&assets_root().join("pack_configs").join("mixed_sources.json"))
        .expect("mixed sources");
    let sources: Vec<Source> = bundle.pack_types.iter().map(|pack| pack.source).collect();
    assert_eq!(sources, vec![Source::Edhrec, Source::Scryfall, Source::Moxfield]);
    assert!(bundle.pack_types[2]
        .slots
        .iter()
        .all(|slot| slot.source() == Source::Moxfield));
}

#[test]
fn missing_files_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let assets = load_assets(dir.path()).expect("empty assets dir");
    assert!(assets.catalog.powerups.is_empty());
    assert_eq!(assets.catalog.rarity_weights.common, 55.0);
    assert!(assets.game_changers.is_empty());
    assert!(assets.pack_configs.is_empty());
}

#[test]
fn game_changer_names_are_trimmed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("game_changers.json");
    fs::write(&path, r#"[" Sol Ring ", "", "Mana Vault"]"#).unwrap();
    let names = load_game_changers(&path).unwrap();
    assert_eq!(names.len(), 2);
    assert!(names.contains("Sol Ring"));
}

#[test]
fn parse_errors_name_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("powerups.json");
    fs::write(&path, "{ not json").unwrap();
    let err = load_powerup_catalog(&path).unwrap_err();
    assert!(format!("{err:#}").contains("powerups.json"));
}

#[test]
fn invalid_bundles_are_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("empty.json"), r#"{"packTypes": []}"#).unwrap();
    let err = load_pack_configs(dir.path()).unwrap_err();
    assert!(format!("{err:#}").contains("No pack types defined"));
}

#[test]
fn config_resolves_by_path_or_name() {
    let dir = TempDir::new().unwrap();
    let custom = dir.path().join("custom.json");
    fs::write(
        &custom,
        r#"{"packTypes": [{"name": "Tiny", "slots": [{"cardType": "random", "count": 2}]}]}"#,
    )
    .unwrap();
    let by_path = resolve_bundle_config(&assets_root(), custom.to_str().unwrap()).unwrap();
    assert_eq!(by_path.pack_types[0].display_name(), "Tiny");

    let by_name = resolve_bundle_config(&assets_root(), "standard").unwrap();
    assert_eq!(by_name.total_packs(), 5);
    assert!(resolve_bundle_config(&assets_root(), "nope").is_err());
}
