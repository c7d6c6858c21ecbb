use crate::{is_basic_land, Card, CardType, ColorIdentity, ProviderError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const GAME_CHANGERS_TAG: &str = "gamechangers";
pub const SCRYFALL_LIST: &str = "scryfall";
pub const MOXFIELD_LIST: &str = "moxfield";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub synergy: Option<f64>,
    #[serde(default)]
    pub inclusion: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardList {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub cardviews: Vec<CardView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdhrecResponse {
    #[serde(default)]
    pub container: EdhrecContainer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdhrecContainer {
    #[serde(default)]
    pub json_dict: EdhrecJsonDict,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdhrecJsonDict {
    #[serde(default)]
    pub cardlists: Vec<CardList>,
    #[serde(default)]
    pub card: Option<EdhrecCommanderCard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdhrecCommanderCard {
    #[serde(default)]
    pub color_identity: Option<ColorIdentity>,
}

/// The parts of an EDHRec commander page the engine reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdhrecPage {
    pub cardlists: Vec<CardList>,
    pub commander_colors: Option<ColorIdentity>,
}

impl From<EdhrecResponse> for EdhrecPage {
    fn from(response: EdhrecResponse) -> Self {
        let dict = response.container.json_dict;
        Self {
            cardlists: dict.cardlists,
            commander_colors: dict.card.and_then(|card| card.color_identity),
        }
    }
}

/// Flattens EDHRec cardlists. With `game_changers` set, names in the set are
/// re-tagged `gamechangers` and repeats across sections collapse to the first.
pub fn normalize_edhrec(cardlists: &[CardList], game_changers: Option<&HashSet<String>>) -> Vec<Card> {
    let mut cards = Vec::new();
    let mut seen = HashSet::new();
    for list in cardlists {
        let card_type = CardType::from_tag(&list.tag);
        for view in &list.cardviews {
            let name = match view.name.as_deref() {
                Some(name) if !name.is_empty() && !is_basic_land(name) => name,
                _ => continue,
            };
            let mut source_list = list.tag.as_str();
            if let Some(changers) = game_changers {
                if !seen.insert(name.to_string()) {
                    continue;
                }
                if changers.contains(name) {
                    source_list = GAME_CHANGERS_TAG;
                }
            }
            let mut card = Card::new(name, card_type, source_list);
            card.synergy = view.synergy;
            card.inclusion = view.inclusion;
            cards.push(card);
        }
    }
    cards
}

/// Per-type card counts of an EDHRec average deck.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageDeckCounts {
    #[serde(default)]
    pub creature: f64,
    #[serde(default)]
    pub instant: f64,
    #[serde(default)]
    pub sorcery: f64,
    #[serde(default)]
    pub artifact: f64,
    #[serde(default)]
    pub enchantment: f64,
    #[serde(default)]
    pub planeswalker: f64,
    #[serde(default)]
    pub battle: f64,
}

impl AverageDeckCounts {
    pub fn type_weights(&self) -> TypeWeights {
        let counts = [
            (CardType::Creature, self.creature),
            (CardType::Instant, self.instant),
            (CardType::Sorcery, self.sorcery),
            (CardType::Artifact, self.artifact),
            (CardType::Enchantment, self.enchantment),
            (CardType::Planeswalker, self.planeswalker),
            (CardType::Battle, self.battle),
        ];
        let total: f64 = counts.iter().map(|(_, count)| count.max(0.0)).sum();
        if total <= 0.0 {
            return TypeWeights::default();
        }
        TypeWeights(
            counts
                .into_iter()
                .map(|(kind, count)| (kind, count.max(0.0) / total))
                .collect(),
        )
    }
}

/// Ordered type → probability mapping used by weighted selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeWeights(pub Vec<(CardType, f64)>);

impl TypeWeights {
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|(_, weight)| *weight <= 0.0)
    }

    pub fn get(&self, kind: CardType) -> f64 {
        self.0
            .iter()
            .find(|(entry, _)| *entry == kind)
            .map(|(_, weight)| *weight)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CardType, f64)> + '_ {
        self.0.iter().copied()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScryfallCard {
    pub name: String,
    #[serde(default)]
    pub type_line: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScryfallPage {
    #[serde(default)]
    pub data: Vec<ScryfallCard>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScryfallCursor {
    Search(String),
    Next(String),
}

/// Walks Scryfall search pages. A failed fetch ends the walk and keeps what was
/// already collected.
pub fn collect_scryfall<F>(query: &str, mut fetch: F) -> Vec<Card>
where
    F: FnMut(&ScryfallCursor) -> Result<ScryfallPage, ProviderError>,
{
    let mut cards = Vec::new();
    let mut cursor = ScryfallCursor::Search(query.to_string());
    loop {
        let page = match fetch(&cursor) {
            Ok(page) => page,
            Err(err) => {
                log::warn!(
                    "scryfall query {query:?} stopped after {} cards: {err}",
                    cards.len()
                );
                break;
            }
        };
        cards.extend(
            page.data
                .into_iter()
                .filter(|card| !card.name.is_empty())
                .map(|card| Card::new(card.name, CardType::from_type_line(&card.type_line), SCRYFALL_LIST)),
        );
        match page.next_page {
            Some(next) if page.has_more => cursor = ScryfallCursor::Next(next),
            _ => break,
        }
    }
    cards
}

/// Accepts raw Scryfall syntax or a `scryfall.com/search?q=` URL.
pub fn scryfall_query_text(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("scryfall.com/search") {
        if let Ok(parsed) = url::Url::parse(raw) {
            if let Some((_, q)) = parsed.query_pairs().find(|(key, _)| key == "q") {
                return q.trim().to_string();
            }
        }
    }
    raw.to_string()
}

pub fn build_scryfall_query(raw: &str, colors: Option<&ColorIdentity>) -> String {
    let text = scryfall_query_text(raw);
    match colors {
        Some(colors) => format!("{text} id<={}", colors.scryfall_operand()),
        None => text,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoxfieldCard {
    pub name: String,
    #[serde(default)]
    pub color_identity: ColorIdentity,
    #[serde(default)]
    pub type_line: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoxfieldEntry {
    pub card: MoxfieldCard,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoxfieldBoard {
    #[serde(default)]
    pub cards: HashMap<String, MoxfieldEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoxfieldBoards {
    #[serde(default)]
    pub mainboard: MoxfieldBoard,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoxfieldDeck {
    #[serde(default)]
    pub boards: MoxfieldBoards,
}

/// Mainboard cards sorted by name. With `filter` set, cards whose identity is
/// not within the commander's are dropped.
pub fn normalize_moxfield(deck: &MoxfieldDeck, filter: Option<&ColorIdentity>) -> Vec<Card> {
    let mut cards: Vec<Card> = deck
        .boards
        .mainboard
        .cards
        .values()
        .map(|entry| &entry.card)
        .filter(|card| !card.name.is_empty())
        .filter(|card| filter.map_or(true, |colors| card.color_identity.is_subset_of(colors)))
        .map(|card| Card::new(card.name.clone(), CardType::from_type_line(&card.type_line), MOXFIELD_LIST))
        .collect();
    cards.sort_by(|a, b| a.name.cmp(&b.name));
    cards.dedup_by(|a, b| a.name == b.name);
    cards
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(tag: &str, names: &[&str]) -> CardList {
        CardList {
            tag: tag.to_string(),
            cardviews: names
                .iter()
                .map(|name| CardView {
                    name: Some(name.to_string()),
                    ..CardView::default()
                })
                .collect(),
        }
    }

    #[test]
    fn edhrec_drops_basics_and_maps_tags() {
        let lists = vec![
            list("creatures", &["Llanowar Elves", "Forest", ""]),
            list("lands", &["Command Tower", "Wastes"]),
            list("highsynergycards", &["Doubling Season"]),
        ];
        let cards = normalize_edhrec(&lists, None);
        let names: Vec<&str> = cards.iter().map(|card| card.name.as_str()).collect();
        assert_eq!(names, vec!["Llanowar Elves", "Command Tower", "Doubling Season"]);
        assert_eq!(cards[0].card_type, CardType::Creature);
        assert!(cards[1].is_land());
        assert_eq!(cards[2].card_type, CardType::Unknown);
        assert_eq!(cards[2].source_list, "highsynergycards");
    }

    #[test]
    fn game_changer_mode_retags_and_collapses() {
        let lists = vec![
            list("topcards", &["Cyclonic Rift", "Sol Ring"]),
            list("instants", &["Cyclonic Rift"]),
        ];
        let changers: HashSet<String> = ["Cyclonic Rift".to_string()].into_iter().collect();
        let cards = normalize_edhrec(&lists, Some(&changers));
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].source_list, GAME_CHANGERS_TAG);
        assert_eq!(cards[1].source_list, "topcards");

        assert_eq!(normalize_edhrec(&lists, None).len(), 3);
    }

    #[test]
    fn edhrec_response_reads_nested_page() {
        let response: EdhrecResponse = serde_json::from_str(
            r#"{"container": {"json_dict": {
                "card": {"color_identity": ["G", "W"]},
                "cardlists": [{"tag": "creatures", "cardviews": [{"name": "Elf", "synergy": 0.4}]}]
            }}}"#,
        )
        .unwrap();
        let page = EdhrecPage::from(response);
        assert_eq!(page.cardlists[0].cardviews[0].synergy, Some(0.4));
        assert_eq!(page.commander_colors, Some(ColorIdentity::parse("GW")));
    }

    #[test]
    fn average_deck_counts_become_weights() {
        let counts = AverageDeckCounts {
            creature: 30.0,
            instant: 10.0,
            artifact: 10.0,
            ..AverageDeckCounts::default()
        };
        let weights = counts.type_weights();
        assert!((weights.get(CardType::Creature) - 0.6).abs() < 1e-9);
        assert!((weights.get(CardType::Instant) - 0.2).abs() < 1e-9);
        assert_eq!(weights.get(CardType::Battle), 0.0);
        assert!(AverageDeckCounts::default().type_weights().is_empty());
    }

    #[test]
    fn scryfall_keeps_partial_results() {
        let mut calls = Vec::new();
        let cards = collect_scryfall("t:goblin", |cursor| {
            calls.push(cursor.clone());
            match cursor {
                ScryfallCursor::Search(_) => Ok(ScryfallPage {
                    data: vec![ScryfallCard {
                        name: "Goblin Guide".to_string(),
                        type_line: "Creature — Goblin Scout".to_string(),
                    }],
                    has_more: true,
                    next_page: Some("page2".to_string()),
                }),
                ScryfallCursor::Next(_) => Err(ProviderError::Timeout),
            }
        });
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ScryfallCursor::Next("page2".to_string()));
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].card_type, CardType::Creature);
    }

    #[test]
    fn scryfall_query_accepts_search_urls() {
        assert_eq!(
            scryfall_query_text("https://scryfall.com/search?q=is%3Agamechanger&unique=cards"),
            "is:gamechanger"
        );
        let colors = ColorIdentity::parse("BR");
        assert_eq!(build_scryfall_query("t:conspiracy", Some(&colors)), "t:conspiracy id<=BR");
        assert_eq!(
            build_scryfall_query("t:land", Some(&ColorIdentity::colorless())),
            "t:land id<=c"
        );
        assert_eq!(build_scryfall_query(" t:land ", None), "t:land");
    }

    #[test]
    fn moxfield_filters_by_identity() {
        let deck: MoxfieldDeck = serde_json::from_str(
            r#"{"boards": {"mainboard": {"cards": {
                "a": {"card": {"name": "Lightning Bolt", "color_identity": ["R"], "type_line": "Instant"}},
                "b": {"card": {"name": "Counterspell", "color_identity": ["U"]}},
                "c": {"card": {"name": "Sol Ring", "color_identity": []}}
            }}}}"#,
        )
        .unwrap();
        let all = normalize_moxfield(&deck, None);
        let names: Vec<&str> = all.iter().map(|card| card.name.as_str()).collect();
        assert_eq!(names, vec!["Counterspell", "Lightning Bolt", "Sol Ring"]);

        let red = ColorIdentity::parse("R");
        let filtered = normalize_moxfield(&deck, Some(&red));
        let names: Vec<&str> = filtered.iter().map(|card| card.name.as_str()).collect();
        assert_eq!(names, vec!["Lightning Bolt", "Sol Ring"]);
        assert_eq!(filtered[0].card_type, CardType::Instant);
    }
}
