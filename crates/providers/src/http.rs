use crate::urls::{
    average_deck_url, edhrec_page_url, moxfield_api_url, scryfall_search_url, EDHREC_BASE, MOXFIELD_DECKS,
    SCRYFALL_SEARCH,
};
use packforge_core::{
    AverageDeckCounts, Bracket, Budget, CardSource, EdhrecPage, EdhrecResponse, MoxfieldDeck, ProviderError,
    ScryfallCursor, ScryfallPage,
};
use serde::de::DeserializeOwned;
use std::io;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const USER_AGENT: &str = concat!("packforge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub timeout: Duration,
    pub edhrec_base: String,
    pub scryfall_search: String,
    pub moxfield_decks: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            edhrec_base: EDHREC_BASE.to_string(),
            scryfall_search: SCRYFALL_SEARCH.to_string(),
            moxfield_decks: MOXFIELD_DECKS.to_string(),
        }
    }
}

/// EDHRec, Scryfall and Moxfield over blocking HTTP. One agent is shared by
/// every worker thread; timeouts are failures and are not retried.
#[derive(Clone)]
pub struct HttpCardSource {
    agent: ureq::Agent,
    config: ProviderConfig,
}

impl HttpCardSource {
    pub fn new(config: ProviderConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent, config }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        log::debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .set("Accept", "application/json")
            .call()
            .map_err(|err| map_ureq_error(url, err))?;
        response.into_json::<T>().map_err(map_body_error)
    }
}

impl Default for HttpCardSource {
    fn default() -> Self {
        Self::new(ProviderConfig::default())
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Status(status, _) => ProviderError::Status {
            status,
            url: url.to_string(),
        },
        ureq::Error::Transport(transport) => {
            let message = transport.to_string();
            if message.contains("timed out") {
                ProviderError::Timeout
            } else {
                ProviderError::Network(message)
            }
        }
    }
}

fn map_body_error(err: io::Error) -> ProviderError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProviderError::Timeout,
        io::ErrorKind::InvalidData => ProviderError::Malformed(err.to_string()),
        _ => ProviderError::Network(err.to_string()),
    }
}

impl CardSource for HttpCardSource {
    fn edhrec_page(&self, slug: &str, bracket: Bracket, budget: Budget) -> Result<EdhrecPage, ProviderError> {
        let url = edhrec_page_url(&self.config.edhrec_base, slug, bracket, budget);
        let response: EdhrecResponse = self.get_json(&url)?;
        Ok(EdhrecPage::from(response))
    }

    fn average_deck(&self, slug: &str, bracket: Bracket) -> Result<AverageDeckCounts, ProviderError> {
        let url = average_deck_url(&self.config.edhrec_base, slug, bracket);
        self.get_json(&url)
    }

    fn scryfall_page(&self, cursor: &ScryfallCursor) -> Result<ScryfallPage, ProviderError> {
        let url = match cursor {
            ScryfallCursor::Search(query) => scryfall_search_url(&self.config.scryfall_search, query)?,
            ScryfallCursor::Next(url) => url.clone(),
        };
        self.get_json(&url)
    }

    fn moxfield_deck(&self, deck_url: &str) -> Result<MoxfieldDeck, ProviderError> {
        let url = moxfield_api_url(&self.config.moxfield_decks, deck_url)?;
        self.get_json(&url)
    }
}
