use packforge_core::{Bracket, Budget, ProviderError};
use url::Url;

pub const EDHREC_BASE: &str = "https://json.edhrec.com/pages";
pub const SCRYFALL_SEARCH: &str = "https://api.scryfall.com/cards/search";
pub const MOXFIELD_DECKS: &str = "https://api2.moxfield.com/v3/decks/all";

pub fn edhrec_page_url(base: &str, slug: &str, bracket: Bracket, budget: Budget) -> String {
    format!(
        "{base}/commanders/{slug}{}{}.json",
        bracket.path(),
        budget.path_suffix()
    )
}

pub fn average_deck_url(base: &str, slug: &str, bracket: Bracket) -> String {
    format!("{base}/average-decks/{slug}{}.json", bracket.path())
}

pub fn scryfall_search_url(base: &str, query: &str) -> Result<String, ProviderError> {
    let mut url = Url::parse(base).map_err(|err| ProviderError::Malformed(format!("{base}: {err}")))?;
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("unique", "cards")
        .append_pair("order", "name");
    Ok(url.into())
}

/// Deck id from `https://moxfield.com/decks/<id>` style URLs; a bare id
/// passes through.
pub fn moxfield_deck_id(deck_url: &str) -> Result<String, ProviderError> {
    let deck_url = deck_url.trim();
    if !deck_url.contains('/') {
        if deck_url.is_empty() {
            return Err(ProviderError::Malformed("empty moxfield deck url".to_string()));
        }
        return Ok(deck_url.to_string());
    }
    let parsed = Url::parse(deck_url).map_err(|err| ProviderError::Malformed(format!("{deck_url}: {err}")))?;
    let mut segments = parsed.path_segments().into_iter().flatten();
    while let Some(segment) = segments.next() {
        if segment == "decks" {
            if let Some(id) = segments.next().filter(|id| !id.is_empty()) {
                return Ok(id.to_string());
            }
        }
    }
    Err(ProviderError::Malformed(format!("no deck id in {deck_url}")))
}

pub fn moxfield_api_url(base: &str, deck_url: &str) -> Result<String, ProviderError> {
    Ok(format!("{base}/{}/", moxfield_deck_id(deck_url)?))
}
