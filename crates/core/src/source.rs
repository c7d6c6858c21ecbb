use crate::{AverageDeckCounts, Bracket, Budget, ColorIdentity, EdhrecPage, MoxfieldDeck, ScryfallCursor, ScryfallPage};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Card data providers the engine pulls from. Implementations do the IO; the
/// engine only sees parsed pages.
pub trait CardSource: Sync {
    fn edhrec_page(&self, slug: &str, bracket: Bracket, budget: Budget) -> Result<EdhrecPage, ProviderError>;

    fn average_deck(&self, slug: &str, bracket: Bracket) -> Result<AverageDeckCounts, ProviderError>;

    fn scryfall_page(&self, cursor: &ScryfallCursor) -> Result<ScryfallPage, ProviderError>;

    fn moxfield_deck(&self, deck_url: &str) -> Result<MoxfieldDeck, ProviderError>;

    /// Commander colour identity, read from the unbracketed commander page.
    fn commander_colors(&self, slug: &str) -> Result<Option<ColorIdentity>, ProviderError> {
        self.edhrec_page(slug, Bracket::Any, Budget::Any)
            .map(|page| page.commander_colors)
    }
}
