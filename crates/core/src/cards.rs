use serde::{Deserialize, Serialize};
use std::fmt;

pub const BASIC_LANDS: [&str; 6] = ["Plains", "Island", "Swamp", "Mountain", "Forest", "Wastes"];

pub fn is_basic_land(name: &str) -> bool {
    BASIC_LANDS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardCategory {
    Land,
    NonLand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Creature,
    Instant,
    Sorcery,
    Artifact,
    Enchantment,
    Planeswalker,
    Battle,
    Land,
    Unknown,
}

impl CardType {
    pub const ALL: [CardType; 9] = [
        CardType::Creature,
        CardType::Instant,
        CardType::Sorcery,
        CardType::Artifact,
        CardType::Enchantment,
        CardType::Planeswalker,
        CardType::Battle,
        CardType::Land,
        CardType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Creature => "Creature",
            CardType::Instant => "Instant",
            CardType::Sorcery => "Sorcery",
            CardType::Artifact => "Artifact",
            CardType::Enchantment => "Enchantment",
            CardType::Planeswalker => "Planeswalker",
            CardType::Battle => "Battle",
            CardType::Land => "Land",
            CardType::Unknown => "Unknown",
        }
    }

    /// Case-insensitive lookup by type name (`"creature"`, `"Creature"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Type implied by an EDHRec cardlist tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "creatures" => CardType::Creature,
            "instants" => CardType::Instant,
            "sorceries" => CardType::Sorcery,
            "enchantments" => CardType::Enchantment,
            "planeswalkers" => CardType::Planeswalker,
            "battles" => CardType::Battle,
            "manaartifacts" | "utilityartifacts" => CardType::Artifact,
            "lands" | "utilitylands" => CardType::Land,
            _ => CardType::Unknown,
        }
    }

    /// First recognised type word of a Scryfall/Moxfield type line. Creature
    /// wins over Artifact/Enchantment so "Artifact Creature" reads as Creature.
    pub fn from_type_line(type_line: &str) -> Self {
        let front = type_line.split("//").next().unwrap_or_default();
        let front = front.split('—').next().unwrap_or_default();
        let words: Vec<&str> = front.split_whitespace().collect();
        for kind in [
            CardType::Creature,
            CardType::Land,
            CardType::Planeswalker,
            CardType::Battle,
            CardType::Instant,
            CardType::Sorcery,
            CardType::Artifact,
            CardType::Enchantment,
        ] {
            if words.iter().any(|word| word.eq_ignore_ascii_case(kind.as_str())) {
                return kind;
            }
        }
        CardType::Unknown
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub name: String,
    pub category: CardCategory,
    pub card_type: CardType,
    pub source_list: String,
    #[serde(default)]
    pub synergy: Option<f64>,
    #[serde(default)]
    pub inclusion: Option<f64>,
}

impl Card {
    pub fn new(name: impl Into<String>, card_type: CardType, source_list: impl Into<String>) -> Self {
        let category = if card_type == CardType::Land {
            CardCategory::Land
        } else {
            CardCategory::NonLand
        };
        Self {
            name: name.into(),
            category,
            card_type,
            source_list: source_list.into(),
            synergy: None,
            inclusion: None,
        }
    }

    pub fn is_land(&self) -> bool {
        self.category == CardCategory::Land
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Edhrec,
    Scryfall,
    Moxfield,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub name: String,
    pub cards: Vec<String>,
}

impl Pack {
    /// `base` alone for a single pack, `"base #n"` (1-based) when repeated.
    pub fn display_name(base: &str, index: u32, count: u32) -> String {
        if count > 1 {
            format!("{base} #{}", index + 1)
        } else {
            base.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_table_maps_known_sections() {
        assert_eq!(CardType::from_tag("creatures"), CardType::Creature);
        assert_eq!(CardType::from_tag("manaartifacts"), CardType::Artifact);
        assert_eq!(CardType::from_tag("utilitylands"), CardType::Land);
        assert_eq!(CardType::from_tag("topcards"), CardType::Unknown);
    }

    #[test]
    fn type_names_are_case_insensitive() {
        assert_eq!(CardType::from_name("creature"), Some(CardType::Creature));
        assert_eq!(CardType::from_name("ENCHANTMENT"), Some(CardType::Enchantment));
        assert_eq!(CardType::from_name("tribal"), None);
    }

    #[test]
    fn type_line_prefers_creature() {
        assert_eq!(
            CardType::from_type_line("Artifact Creature — Golem"),
            CardType::Creature
        );
        assert_eq!(CardType::from_type_line("Legendary Land"), CardType::Land);
        assert_eq!(
            CardType::from_type_line("Instant // Sorcery"),
            CardType::Instant
        );
        assert_eq!(CardType::from_type_line("Conspiracy"), CardType::Unknown);
    }

    #[test]
    fn pack_names_only_number_repeats() {
        assert_eq!(Pack::display_name("P", 0, 1), "P");
        assert_eq!(Pack::display_name("P", 0, 2), "P #1");
        assert_eq!(Pack::display_name("P", 1, 2), "P #2");
    }
}
