use packforge_core::{
    AverageDeckCounts, Bracket, Budget, BundleConfig, CardList, CardSource, CardView, DedupScope, EdhrecPage,
    GenerateOptions, GenerateRequest, MoxfieldDeck, PackAssembler, ProviderError, RngState, ScryfallCursor,
    ScryfallPage,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Slow EDHRec pages that track how many fetches overlap.
#[derive(Default)]
struct SlowSource {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl SlowSource {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CardSource for SlowSource {
    fn edhrec_page(&self, _slug: &str, bracket: Bracket, budget: Budget) -> Result<EdhrecPage, ProviderError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(25));
        self.active.fetch_sub(1, Ordering::SeqCst);

        let key = format!("{bracket}/{budget}");
        self.calls.lock().unwrap().push(key.clone());
        let cardviews = (0..4)
            .map(|idx| CardView {
                name: Some(format!("{key} card {idx}")),
                ..CardView::default()
            })
            .collect();
        Ok(EdhrecPage {
            cardlists: vec![CardList {
                tag: "creatures".to_string(),
                cardviews,
            }],
            commander_colors: None,
        })
    }

    fn average_deck(&self, _slug: &str, _bracket: Bracket) -> Result<AverageDeckCounts, ProviderError> {
        Err(ProviderError::Timeout)
    }

    fn scryfall_page(&self, _cursor: &ScryfallCursor) -> Result<ScryfallPage, ProviderError> {
        Err(ProviderError::Timeout)
    }

    fn moxfield_deck(&self, _deck_url: &str) -> Result<MoxfieldDeck, ProviderError> {
        Err(ProviderError::Timeout)
    }
}

/// Fifteen distinct EDHRec keys, each requested twice.
fn wide_bundle() -> BundleConfig {
    let mut slots = Vec::new();
    for bracket in 1..=5 {
        for budget in ["any", "budget", "expensive"] {
            for _ in 0..2 {
                slots.push(format!(
                    r#"{{"cardType":"random","bracket":{bracket},"budget":"{budget}","count":1}}"#
                ));
            }
        }
    }
    let json = format!(r#"{{"packTypes":[{{"name":"Wide","slots":[{}]}}]}}"#, slots.join(","));
    serde_json::from_str(&json).expect("bundle")
}

#[test]
fn prefetch_stays_within_the_worker_bound() {
    let source = SlowSource::default();
    let bundle = wide_bundle();
    let request = GenerateRequest::for_slug("krenko-mob-boss", bundle.clone());
    let options = GenerateOptions {
        max_workers: 2,
        ..GenerateOptions::default()
    };
    let mut assembler = PackAssembler::new("krenko-mob-boss", &request, &bundle, &source, &options);
    assembler.prefetch(&bundle);

    assert_eq!(source.peak.load(Ordering::SeqCst), 2);
    let calls = source.calls();
    assert_eq!(calls.len(), 15);
    let mut per_key: HashMap<&str, usize> = HashMap::new();
    for call in &calls {
        *per_key.entry(call.as_str()).or_default() += 1;
    }
    assert!(per_key.values().all(|count| *count == 1), "{per_key:?}");
}

#[test]
fn assembly_reuses_prefetched_pools() {
    let source = SlowSource::default();
    let bundle = wide_bundle();
    let request = GenerateRequest::for_slug("krenko-mob-boss", bundle.clone());
    let options = GenerateOptions::default();
    let mut assembler = PackAssembler::new("krenko-mob-boss", &request, &bundle, &source, &options);
    assembler.prefetch(&bundle);
    let fetched = source.calls().len();

    let mut scope = DedupScope::default();
    let mut rng = RngState::from_seed(11);
    let packs = assembler.assemble(&bundle.pack_types[0], &mut scope, &mut rng);

    assert_eq!(source.calls().len(), fetched);
    assert_eq!(packs.len(), 1);
    assert_eq!(packs[0].cards.len(), 30);
    assert!(source.peak.load(Ordering::SeqCst) <= 4);
}
