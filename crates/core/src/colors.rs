use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    W,
    U,
    B,
    R,
    G,
}

impl Color {
    pub const ALL: [Color; 5] = [Color::W, Color::U, Color::B, Color::R, Color::G];

    pub fn symbol(self) -> char {
        match self {
            Color::W => 'W',
            Color::U => 'U',
            Color::B => 'B',
            Color::R => 'R',
            Color::G => 'G',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol.to_ascii_uppercase() {
            'W' => Some(Color::W),
            'U' => Some(Color::U),
            'B' => Some(Color::B),
            'R' => Some(Color::R),
            'G' => Some(Color::G),
            _ => None,
        }
    }
}

/// A set of mana colors, always iterated in WUBRG order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColorIdentity(BTreeSet<Color>);

impl ColorIdentity {
    pub fn new(colors: impl IntoIterator<Item = Color>) -> Self {
        Self(colors.into_iter().collect())
    }

    pub fn colorless() -> Self {
        Self::default()
    }

    /// Parses `"W,U"`, `"wub"`, `"{W}{U}"` and similar. Anything that is not a
    /// color symbol is ignored, so `"C"` reads as colorless.
    pub fn parse(text: &str) -> Self {
        Self(text.chars().filter_map(Color::from_symbol).collect())
    }

    pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Self {
        Self(
            symbols
                .iter()
                .flat_map(|symbol| symbol.as_ref().chars())
                .filter_map(Color::from_symbol)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, color: Color) -> bool {
        self.0.contains(&color)
    }

    pub fn iter(&self) -> impl Iterator<Item = Color> + '_ {
        self.0.iter().copied()
    }

    pub fn is_subset_of(&self, other: &ColorIdentity) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_superset_of(&self, other: &ColorIdentity) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn symbols(&self) -> String {
        self.iter().map(Color::symbol).collect()
    }

    /// Scryfall `id<=` operand; a colorless identity is spelled `c`.
    pub fn scryfall_operand(&self) -> String {
        if self.is_empty() {
            "c".to_string()
        } else {
            self.symbols()
        }
    }
}

impl fmt::Display for ColorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "C");
        }
        write!(f, "{}", self.symbols())
    }
}

impl Serialize for ColorIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let symbols: Vec<String> = self.iter().map(|color| color.symbol().to_string()).collect();
        symbols.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ColorIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            List(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => ColorIdentity::parse(&text),
            Raw::List(symbols) => ColorIdentity::from_symbols(&symbols),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Candidate colors equal the filter.
    #[default]
    Exactly,
    /// Candidate colors contain every filter color.
    Including,
    /// Candidate colors stay within the filter; colorless always passes.
    #[serde(alias = "at_most", alias = "atMost")]
    AtMost,
}

impl ColorMode {
    pub fn accepts(self, candidate: &ColorIdentity, filter: &ColorIdentity) -> bool {
        match self {
            ColorMode::Exactly => candidate == filter,
            ColorMode::Including => candidate.is_superset_of(filter),
            ColorMode::AtMost => candidate.is_subset_of(filter),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorFilter {
    pub colors: ColorIdentity,
    #[serde(default)]
    pub mode: ColorMode,
}

impl ColorFilter {
    pub fn new(colors: ColorIdentity, mode: ColorMode) -> Self {
        Self { colors, mode }
    }

    pub fn accepts(&self, candidate: &ColorIdentity) -> bool {
        self.mode.accepts(candidate, &self.colors)
    }

    pub fn apply<'a, T>(
        &self,
        items: &'a [T],
        colors_of: impl Fn(&T) -> &ColorIdentity,
    ) -> Vec<&'a T> {
        items
            .iter()
            .filter(|item| self.accepts(colors_of(item)))
            .collect()
    }
}
