use crate::Source;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PACK_NAME: &str = "Pack";
pub const DEFAULT_BRACKET: u8 = 2;
/// Upper bound on a pack type's repeat count.
pub const MAX_PACK_COUNT: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing commander reference")]
    MissingCommander,
    #[error("Invalid commander URL format: {0}")]
    InvalidCommanderUrl(String),
    #[error("Pack type {pack}: {kind:?} slot {slot} is missing `{field}`")]
    MissingSlotField {
        pack: String,
        kind: Source,
        slot: usize,
        field: &'static str,
    },
    #[error("Invalid bracket value: {0}")]
    InvalidBracket(String),
    #[error("No pack types defined")]
    NoPackTypes,
    #[error("Pack {0}: Invalid count")]
    InvalidPackCount(usize),
    #[error("Pack {0}: Missing or invalid slots array")]
    NoSlots(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    #[default]
    Any,
    Budget,
    Expensive,
}

impl Budget {
    pub fn path_suffix(self) -> &'static str {
        match self {
            Budget::Any => "",
            Budget::Budget => "/budget",
            Budget::Expensive => "/expensive",
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Budget::Any => "any",
            Budget::Budget => "budget",
            Budget::Expensive => "expensive",
        })
    }
}

/// Power-level tier. `Inherit` (wire value `0`) defers to the pack or request
/// default; `Any` queries the unbracketed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bracket {
    #[default]
    Inherit,
    Any,
    Level(u8),
}

impl Bracket {
    pub fn path(self) -> &'static str {
        match self {
            Bracket::Level(2) => "/exhibition",
            Bracket::Level(3) => "/core",
            Bracket::Level(4) => "/upgraded",
            Bracket::Level(5) => "/optimized",
            Bracket::Level(6) => "/cedh",
            _ => "",
        }
    }

    pub fn or(self, fallback: Bracket) -> Bracket {
        match self {
            Bracket::Inherit => fallback,
            other => other,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("any") || text.eq_ignore_ascii_case("auto") {
            return Ok(Bracket::Any);
        }
        text.parse::<u8>()
            .map(Bracket::from_level)
            .map_err(|_| ConfigError::InvalidBracket(text.to_string()))
    }

    pub fn from_level(level: u8) -> Self {
        if level == 0 {
            Bracket::Inherit
        } else {
            Bracket::Level(level)
        }
    }
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bracket::Inherit => write!(f, "0"),
            Bracket::Any => write!(f, "any"),
            Bracket::Level(level) => write!(f, "{level}"),
        }
    }
}

impl Serialize for Bracket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Bracket::Inherit => serializer.serialize_u8(0),
            Bracket::Any => serializer.serialize_str("any"),
            Bracket::Level(level) => serializer.serialize_u8(*level),
        }
    }
}

impl<'de> Deserialize<'de> for Bracket {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u8),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(level) => Ok(Bracket::from_level(level)),
            Raw::Text(text) => Bracket::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

fn default_count() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_card_type() -> String {
    "weighted".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdhrecSlot {
    pub card_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket: Option<Bracket>,
    pub count: u32,
}

impl EdhrecSlot {
    pub fn new(card_type: &str, budget: Budget, bracket: Bracket, count: u32) -> Self {
        Self {
            card_type: card_type.to_string(),
            budget: Some(budget),
            bracket: Some(bracket),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScryfallSlot {
    pub query: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_commander_color_identity: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoxfieldSlot {
    pub deck_url: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_commander_color_identity: Option<bool>,
}

/// One selection request. The variant always matches the owning pack type's
/// `source`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Slot {
    Edhrec(EdhrecSlot),
    Scryfall(ScryfallSlot),
    Moxfield(MoxfieldSlot),
}

impl Slot {
    pub fn count(&self) -> u32 {
        match self {
            Slot::Edhrec(slot) => slot.count,
            Slot::Scryfall(slot) => slot.count,
            Slot::Moxfield(slot) => slot.count,
        }
    }

    pub fn set_count(&mut self, count: u32) {
        match self {
            Slot::Edhrec(slot) => slot.count = count,
            Slot::Scryfall(slot) => slot.count = count,
            Slot::Moxfield(slot) => slot.count = count,
        }
    }

    pub fn source(&self) -> Source {
        match self {
            Slot::Edhrec(_) => Source::Edhrec,
            Slot::Scryfall(_) => Source::Scryfall,
            Slot::Moxfield(_) => Source::Moxfield,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSlot {
    #[serde(default)]
    card_type: Option<String>,
    #[serde(default)]
    budget: Option<Budget>,
    #[serde(default)]
    bracket: Option<Bracket>,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    deck_url: Option<String>,
    #[serde(default)]
    use_commander_color_identity: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackType {
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_count")]
    count: u32,
    #[serde(default)]
    source: Source,
    #[serde(default = "default_true")]
    use_commander_color_identity: bool,
    #[serde(default)]
    bracket: Option<Bracket>,
    #[serde(default)]
    budget: Option<Budget>,
    #[serde(default)]
    slots: Vec<RawSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPackType")]
pub struct PackType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub count: u32,
    pub source: Source,
    pub use_commander_color_identity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket: Option<Bracket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    pub slots: Vec<Slot>,
}

impl PackType {
    pub fn new(name: Option<&str>, count: u32, source: Source, slots: Vec<Slot>) -> Self {
        Self {
            name: name.map(str::to_string),
            count,
            source,
            use_commander_color_identity: true,
            bracket: None,
            budget: None,
            slots,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_PACK_NAME)
    }
}

impl TryFrom<RawPackType> for PackType {
    type Error = ConfigError;

    fn try_from(raw: RawPackType) -> Result<Self, Self::Error> {
        let pack = raw.name.clone().unwrap_or_else(|| DEFAULT_PACK_NAME.to_string());
        let missing = |slot: usize, field: &'static str| ConfigError::MissingSlotField {
            pack: pack.clone(),
            kind: raw.source,
            slot,
            field,
        };
        let mut slots = Vec::with_capacity(raw.slots.len());
        for (idx, slot) in raw.slots.into_iter().enumerate() {
            let count = slot.count.unwrap_or(1);
            let parsed = match raw.source {
                Source::Edhrec => Slot::Edhrec(EdhrecSlot {
                    card_type: slot.card_type.unwrap_or_else(default_card_type),
                    budget: slot.budget,
                    bracket: slot.bracket,
                    count,
                }),
                Source::Scryfall => Slot::Scryfall(ScryfallSlot {
                    query: slot
                        .query
                        .filter(|query| !query.trim().is_empty())
                        .ok_or_else(|| missing(idx, "query"))?,
                    count,
                    use_commander_color_identity: slot.use_commander_color_identity,
                }),
                Source::Moxfield => Slot::Moxfield(MoxfieldSlot {
                    deck_url: slot
                        .deck_url
                        .filter(|url| !url.trim().is_empty())
                        .ok_or_else(|| missing(idx, "deckUrl"))?,
                    count,
                    use_commander_color_identity: slot.use_commander_color_identity,
                }),
            };
            slots.push(parsed);
        }
        Ok(PackType {
            name: raw.name,
            count: raw.count,
            source: raw.source,
            use_commander_color_identity: raw.use_commander_color_identity,
            bracket: raw.bracket,
            budget: raw.budget,
            slots,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleConfig {
    #[serde(default)]
    pub pack_types: Vec<PackType>,
}

impl BundleConfig {
    /// Rejects bundles a client could not have meant: no pack types, a pack
    /// type without slots, or a repeat count outside `1..=MAX_PACK_COUNT`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pack_types.is_empty() {
            return Err(ConfigError::NoPackTypes);
        }
        for (idx, pack) in self.pack_types.iter().enumerate() {
            if pack.slots.is_empty() {
                return Err(ConfigError::NoSlots(idx));
            }
            if !(1..=MAX_PACK_COUNT).contains(&pack.count) {
                return Err(ConfigError::InvalidPackCount(idx));
            }
        }
        Ok(())
    }

    pub fn total_packs(&self) -> u32 {
        self.pack_types.iter().map(|pack| pack.count).sum()
    }
}

/// The standard 15-card pack: one expensive weighted card, eleven budget
/// weighted cards and three lands.
pub fn standard_slots(bracket: Bracket) -> Vec<Slot> {
    vec![
        Slot::Edhrec(EdhrecSlot::new("weighted", Budget::Expensive, bracket, 1)),
        Slot::Edhrec(EdhrecSlot::new("weighted", Budget::Budget, bracket, 11)),
        Slot::Edhrec(EdhrecSlot::new("lands", Budget::Any, bracket, 3)),
    ]
}

pub fn default_bundle() -> BundleConfig {
    BundleConfig {
        pack_types: vec![PackType::new(
            Some("Standard Pack"),
            1,
            Source::Edhrec,
            standard_slots(Bracket::Inherit),
        )],
    }
}

fn default_request_bracket() -> Bracket {
    Bracket::Level(DEFAULT_BRACKET)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default, alias = "commander_slug")]
    pub commander_slug: Option<String>,
    #[serde(default, alias = "commander_url")]
    pub commander_url: Option<String>,
    #[serde(default)]
    pub config: Option<BundleConfig>,
    #[serde(default = "default_request_bracket")]
    pub bracket: Bracket,
    #[serde(default)]
    pub budget: Budget,
}

impl GenerateRequest {
    pub fn for_slug(slug: &str, config: BundleConfig) -> Self {
        Self {
            commander_slug: Some(slug.to_string()),
            commander_url: None,
            config: Some(config),
            bracket: default_request_bracket(),
            budget: Budget::Any,
        }
    }

    pub fn resolve_slug(&self) -> Result<String, ConfigError> {
        if let Some(slug) = self
            .commander_slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
        {
            return Ok(slug.to_string());
        }
        let url = self
            .commander_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingCommander)?;
        extract_commander_slug(url).ok_or_else(|| ConfigError::InvalidCommanderUrl(url.to_string()))
    }

    /// Request-level bracket; `0` on the wire still means the default tier.
    pub fn effective_bracket(&self) -> Bracket {
        self.bracket.or(default_request_bracket())
    }
}

/// `https://edhrec.com/commanders/atraxa-grand-unifier/budget` → `atraxa-grand-unifier`.
pub fn extract_commander_slug(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/commanders/")?;
    let slug = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}
