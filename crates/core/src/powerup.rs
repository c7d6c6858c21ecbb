use crate::{standard_slots, Bracket, Budget, BundleConfig, EdhrecSlot, PackType, RngState, ScryfallSlot, Slot, Source};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BASE_PACK_QUANTITY: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Uncommon, Rarity::Rare, Rarity::Mythic];
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Mythic => "mythic",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RarityWeights {
    pub common: f64,
    pub uncommon: f64,
    pub rare: f64,
    pub mythic: f64,
}

impl Default for RarityWeights {
    fn default() -> Self {
        Self {
            common: 55.0,
            uncommon: 30.0,
            rare: 12.0,
            mythic: 3.0,
        }
    }
}

impl RarityWeights {
    pub fn weight(&self, rarity: Rarity) -> f64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Uncommon => self.uncommon,
            Rarity::Rare => self.rare,
            Rarity::Mythic => self.mythic,
        }
    }

    /// `roll` in `[0, 1)` scaled by the total; common when nothing matches.
    pub fn pick(&self, roll: f64) -> Rarity {
        let total: f64 = Rarity::ALL.iter().map(|rarity| self.weight(*rarity).max(0.0)).sum();
        let target = roll * total;
        let mut cumulative = 0.0;
        for rarity in Rarity::ALL {
            cumulative += self.weight(rarity).max(0.0);
            if target <= cumulative {
                return rarity;
            }
        }
        Rarity::Common
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerupEffects {
    pub pack_quantity: i32,
    pub budget_upgrade_packs: u32,
    pub full_expensive_packs: u32,
    pub bracket_upgrade_packs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket_upgrade: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_pack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_pack_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Powerup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub effects: PowerupEffects,
}

impl Powerup {
    pub fn summary(&self) -> PowerupSummary {
        PowerupSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            rarity: self.rarity,
        }
    }
}

/// What a session exposes about a player's rolled powerup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerupSummary {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
}

pub fn default_powerup() -> Powerup {
    Powerup {
        id: "default".to_string(),
        name: "Standard Pack".to_string(),
        rarity: Rarity::Common,
        description: Some("No special effects".to_string()),
        effects: PowerupEffects::default(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerupCatalog {
    #[serde(default)]
    pub rarity_weights: RarityWeights,
    #[serde(default)]
    pub powerups: Vec<Powerup>,
}

impl PowerupCatalog {
    pub fn by_id(&self, id: &str) -> Option<&Powerup> {
        self.powerups.iter().find(|powerup| powerup.id == id)
    }

    /// Rarity first, then uniform within it. A rarity with no entries falls
    /// back to common; an empty catalog yields the no-effect powerup.
    pub fn roll(&self, rng: &mut RngState) -> Powerup {
        if self.powerups.is_empty() {
            return default_powerup();
        }
        let rarity = self.rarity_weights.pick(rng.next_f64());
        let mut candidates: Vec<&Powerup> = self.of_rarity(rarity);
        if candidates.is_empty() {
            log::debug!("no {rarity} powerups, falling back to common");
            candidates = self.of_rarity(Rarity::Common);
        }
        if candidates.is_empty() {
            candidates = self.powerups.iter().collect();
        }
        rng.pick_index(candidates.len())
            .map(|idx| candidates[idx].clone())
            .unwrap_or_else(default_powerup)
    }

    fn of_rarity(&self, rarity: Rarity) -> Vec<&Powerup> {
        self.powerups
            .iter()
            .filter(|powerup| powerup.rarity == rarity)
            .collect()
    }
}

const CONSPIRACY_QUERY: &str = "https://scryfall.com/search?q=%28t%3Aconspiracy+-is%3Aplaytest%29+OR+%28set%3Amb2+name%3A%22Marchesa%27s+Surprise+Party%22%29+OR+%28set%3Amb2+name%3A%22Rule+with+an+Even+Hand%22%29&unique=cards&as=grid&order=name";
const BANNED_QUERY: &str =
    "https://scryfall.com/search?q=banned%3Acommander+-f%3Aduel&unique=cards&as=grid&order=name";
const EXPENSIVE_LANDS_QUERY: &str = "https://scryfall.com/search?q=t%3Aland+%28o%3A%22add+%7B%22+OR+o%3A%22mana+of+any%22%29+usd%3E10&unique=cards&as=grid&order=usd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialPack {
    GameChanger,
    Conspiracy,
    Banned,
    ExpensiveLands,
}

impl SpecialPack {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gamechanger" => Some(SpecialPack::GameChanger),
            "conspiracy" => Some(SpecialPack::Conspiracy),
            "banned" => Some(SpecialPack::Banned),
            "expensive_lands" => Some(SpecialPack::ExpensiveLands),
            _ => None,
        }
    }

    /// Single-slot pack type holding `count` cards.
    pub fn template(self, count: u32) -> PackType {
        let (name, query) = match self {
            SpecialPack::GameChanger => {
                return PackType::new(
                    Some("Game Changer"),
                    1,
                    Source::Edhrec,
                    vec![Slot::Edhrec(EdhrecSlot::new(
                        "gamechangers",
                        Budget::Any,
                        Bracket::Any,
                        count,
                    ))],
                );
            }
            SpecialPack::Conspiracy => ("Conspiracy", CONSPIRACY_QUERY),
            SpecialPack::Banned => ("Banned Card", BANNED_QUERY),
            SpecialPack::ExpensiveLands => ("Expensive Lands", EXPENSIVE_LANDS_QUERY),
        };
        PackType::new(
            Some(name),
            1,
            Source::Scryfall,
            vec![Slot::Scryfall(ScryfallSlot {
                query: query.to_string(),
                count,
                use_commander_color_identity: None,
            })],
        )
    }
}

fn pack_count(effects: &PowerupEffects) -> u32 {
    (BASE_PACK_QUANTITY as i64 + effects.pack_quantity as i64).max(0) as u32
}

/// Translates powerup effects into the bundle a player receives.
pub fn build_config(powerup: Option<&Powerup>) -> BundleConfig {
    let Some(powerup) = powerup else {
        return BundleConfig {
            pack_types: vec![PackType::new(
                None,
                BASE_PACK_QUANTITY,
                Source::Edhrec,
                standard_slots(Bracket::Any),
            )],
        };
    };
    let effects = &powerup.effects;
    let total = pack_count(effects);

    let budget_upgrade = effects.budget_upgrade_packs.min(total);
    let mut remaining = total - budget_upgrade;
    let full_expensive = effects.full_expensive_packs.min(remaining);
    remaining -= full_expensive;
    let bracket_upgrade = match effects.bracket_upgrade {
        Some(_) => effects.bracket_upgrade_packs.min(remaining),
        None => 0,
    };
    remaining -= bracket_upgrade;

    let mut pack_types = Vec::new();
    if remaining > 0 {
        pack_types.push(PackType::new(None, remaining, Source::Edhrec, standard_slots(Bracket::Any)));
    }
    if budget_upgrade > 0 {
        pack_types.push(PackType::new(
            Some("Budget Upgraded"),
            budget_upgrade,
            Source::Edhrec,
            vec![
                Slot::Edhrec(EdhrecSlot::new("weighted", Budget::Expensive, Bracket::Any, 1)),
                Slot::Edhrec(EdhrecSlot::new("weighted", Budget::Any, Bracket::Any, 11)),
                Slot::Edhrec(EdhrecSlot::new("lands", Budget::Any, Bracket::Any, 3)),
            ],
        ));
    }
    if full_expensive > 0 {
        pack_types.push(PackType::new(
            Some("Full Expensive"),
            full_expensive,
            Source::Edhrec,
            vec![
                Slot::Edhrec(EdhrecSlot::new("weighted", Budget::Expensive, Bracket::Any, 12)),
                Slot::Edhrec(EdhrecSlot::new("lands", Budget::Any, Bracket::Any, 3)),
            ],
        ));
    }
    if let (Some(level), true) = (effects.bracket_upgrade, bracket_upgrade > 0) {
        let bracket = Bracket::from_level(level);
        let name = format!("Bracket {level}");
        pack_types.push(PackType::new(
            Some(name.as_str()),
            bracket_upgrade,
            Source::Edhrec,
            vec![
                Slot::Edhrec(EdhrecSlot::new("weighted", Budget::Expensive, bracket, 1)),
                Slot::Edhrec(EdhrecSlot::new("weighted", Budget::Budget, bracket, 11)),
                Slot::Edhrec(EdhrecSlot::new("lands", Budget::Any, Bracket::Any, 3)),
            ],
        ));
    }
    if let Some(name) = effects.special_pack.as_deref() {
        match SpecialPack::from_name(name) {
            Some(special) => pack_types.push(special.template(effects.special_pack_count.unwrap_or(1))),
            None => log::warn!("powerup {}: unknown special pack {name:?}, skipped", powerup.id),
        }
    }
    BundleConfig { pack_types }
}

/// The generation settings issued to one player. Always an owned copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackConfig {
    pub commander_url: String,
    pub pack_quantity: u32,
    pub config: BundleConfig,
}

impl PackConfig {
    pub fn issue(powerup: Option<&Powerup>, commander_url: &str) -> Self {
        let pack_quantity = powerup.map_or(BASE_PACK_QUANTITY, |powerup| pack_count(&powerup.effects));
        Self {
            commander_url: commander_url.to_string(),
            pack_quantity,
            config: build_config(powerup),
        }
    }
}
