use anyhow::{bail, Context};
use packforge_core::{BundleConfig, PowerupCatalog};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const POWERUPS_FILE: &str = "powerups.json";
pub const GAME_CHANGERS_FILE: &str = "game_changers.json";
pub const PACK_CONFIGS_DIR: &str = "pack_configs";

/// Everything the services read from the assets directory.
#[derive(Debug, Clone, Default)]
pub struct Assets {
    pub catalog: PowerupCatalog,
    pub game_changers: HashSet<String>,
    pub pack_configs: Vec<NamedBundle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedBundle {
    pub name: String,
    pub config: BundleConfig,
}

/// The workspace `assets/` directory, used when `PACKFORGE_ASSETS` is unset.
pub fn default_assets_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("assets")
}

pub fn load_assets(dir: &Path) -> anyhow::Result<Assets> {
    let catalog = load_powerup_catalog(&dir.join(POWERUPS_FILE))?;
    let game_changers = load_game_changers(&dir.join(GAME_CHANGERS_FILE))?;
    let configs_dir = dir.join(PACK_CONFIGS_DIR);
    let pack_configs = if configs_dir.is_dir() {
        load_pack_configs(&configs_dir)?
    } else {
        Vec::new()
    };
    log::info!(
        "loaded {} powerups, {} game changers, {} pack configs from {}",
        catalog.powerups.len(),
        game_changers.len(),
        pack_configs.len(),
        dir.display()
    );
    Ok(Assets {
        catalog,
        game_changers,
        pack_configs,
    })
}

/// A missing file yields an empty catalog, which rolls the no-effect powerup.
pub fn load_powerup_catalog(path: &Path) -> anyhow::Result<PowerupCatalog> {
    if !path.exists() {
        log::warn!("{} not found, using built-in powerup defaults", path.display());
        return Ok(PowerupCatalog::default());
    }
    load_json(path)
}

pub fn load_game_changers(path: &Path) -> anyhow::Result<HashSet<String>> {
    if !path.exists() {
        log::warn!("{} not found, game changer list is empty", path.display());
        return Ok(HashSet::new());
    }
    let names: Vec<String> = load_json(path)?;
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

pub fn load_bundle_config(path: &Path) -> anyhow::Result<BundleConfig> {
    let config: BundleConfig = load_json(path)?;
    config
        .validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(config)
}

/// Every `*.json` bundle in `dir`, ordered by file name.
pub fn load_pack_configs(dir: &Path) -> anyhow::Result<Vec<NamedBundle>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|path| {
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            Ok(NamedBundle {
                name,
                config: load_bundle_config(path)?,
            })
        })
        .collect()
}

/// Resolves a CLI `--config` value: an existing path, or the name of a bundle
/// under `assets/pack_configs`.
pub fn resolve_bundle_config(assets_dir: &Path, value: &str) -> anyhow::Result<BundleConfig> {
    let direct = Path::new(value);
    if direct.is_file() {
        return load_bundle_config(direct);
    }
    let named = assets_dir
        .join(PACK_CONFIGS_DIR)
        .join(format!("{}.json", value.trim_end_matches(".json")));
    if named.is_file() {
        return load_bundle_config(&named);
    }
    bail!("no pack config at {value} or {}", named.display())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value = serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(value)
}
