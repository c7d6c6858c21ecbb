use crate::{Card, CardType, RngState, TypeWeights};
use std::collections::HashSet;

/// EDHRec cardlist tags a slot may draw from directly.
pub const CATEGORY_TAGS: [&str; 15] = [
    "creatures",
    "instants",
    "sorceries",
    "enchantments",
    "planeswalkers",
    "battles",
    "artifacts",
    "manaartifacts",
    "utilityartifacts",
    "lands",
    "utilitylands",
    "newcards",
    "highsynergycards",
    "topcards",
    "gamechangers",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Weighted,
    Random,
    Category(String),
    /// Capitalised card type name; unknown names simply match nothing.
    Type(String),
}

impl Strategy {
    pub fn parse(card_type: &str) -> Self {
        let card_type = card_type.trim();
        match card_type {
            "weighted" => Strategy::Weighted,
            "random" => Strategy::Random,
            tag if CATEGORY_TAGS.contains(&tag) => Strategy::Category(tag.to_string()),
            name => Strategy::Type(
                CardType::from_name(name).map_or_else(|| capitalize(name), |kind| kind.as_str().to_string()),
            ),
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Cumulative walk over the non-zero weights: the first type whose running
/// total reaches `roll`, the last one on rounding overrun, Creature when
/// nothing is weighted.
pub fn pick_cumulative(weights: &TypeWeights, roll: f64) -> CardType {
    let mut cumulative = 0.0;
    let mut last = None;
    for (kind, weight) in weights.iter().filter(|(_, weight)| *weight > 0.0) {
        cumulative += weight;
        if roll <= cumulative {
            return kind;
        }
        last = Some(kind);
    }
    last.unwrap_or(CardType::Creature)
}

fn available<'a>(pool: &'a [Card], used: &HashSet<String>, keep: impl Fn(&Card) -> bool) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    pool.iter()
        .filter(|card| keep(card))
        .map(|card| card.name.as_str())
        .filter(|name| !used.contains(*name) && seen.insert(*name))
        .collect()
}

fn sample_into(names: Vec<&str>, count: usize, used: &mut HashSet<String>, rng: &mut RngState) -> Vec<String> {
    let picked: Vec<String> = rng
        .sample(&names, count)
        .into_iter()
        .map(str::to_string)
        .collect();
    used.extend(picked.iter().cloned());
    picked
}

/// Draws up to `count` distinct names from `pool` that are not in `used`.
/// Every drawn name is added to `used`.
pub fn select(
    pool: &[Card],
    strategy: &Strategy,
    count: usize,
    used: &mut HashSet<String>,
    weights: &TypeWeights,
    rng: &mut RngState,
) -> Vec<String> {
    match strategy {
        Strategy::Weighted => select_weighted(pool, count, used, weights, rng),
        Strategy::Random => {
            let names = available(pool, used, |_| true);
            sample_into(names, count, used, rng)
        }
        Strategy::Category(tag) => {
            let names = available(pool, used, |card| card.source_list == *tag);
            sample_into(names, count, used, rng)
        }
        Strategy::Type(name) => {
            let names = available(pool, used, |card| card.card_type.as_str() == name);
            sample_into(names, count, used, rng)
        }
    }
}

fn select_weighted(
    pool: &[Card],
    count: usize,
    used: &mut HashSet<String>,
    weights: &TypeWeights,
    rng: &mut RngState,
) -> Vec<String> {
    let mut picked = Vec::with_capacity(count.min(pool.len()));
    for _ in 0..count {
        let kind = pick_cumulative(weights, rng.next_f64());
        let mut names = available(pool, used, |card| card.card_type == kind);
        if names.is_empty() {
            names = available(pool, used, |_| true);
        }
        let Some(idx) = rng.pick_index(names.len()) else {
            break;
        };
        let name = names[idx].to_string();
        used.insert(name.clone());
        picked.push(name);
    }
    picked
}
