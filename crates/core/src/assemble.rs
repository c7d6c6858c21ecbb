use crate::{
    build_scryfall_query, collect_scryfall, default_bundle, normalize_edhrec, normalize_moxfield, select,
    Bracket, Budget, BundleConfig, Card, CardSource, ColorIdentity, ConfigError, GenerateRequest, Pack,
    PackType, RngState, Slot, Source, Strategy, TypeWeights, GAME_CHANGERS_TAG,
};
use std::collections::{HashMap, HashSet};
use std::thread;

pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_workers: usize,
    /// External game-changer names; enables re-tagging for `gamechangers` slots.
    pub game_changers: Option<HashSet<String>>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            game_changers: None,
        }
    }
}

/// Identifies one provider fetch within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    Edhrec {
        bracket: Bracket,
        budget: Budget,
        game_changers: bool,
    },
    Scryfall {
        query: String,
        colors: Option<ColorIdentity>,
    },
    Moxfield {
        deck_url: String,
        colors: Option<ColorIdentity>,
    },
}

#[derive(Debug, Clone)]
struct SlotPlan {
    key: PoolKey,
    strategy: Strategy,
    count: usize,
    weights: Option<Bracket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Fetch {
    Pool(PoolKey),
    Weights(Bracket),
}

enum Fetched {
    Pool(PoolKey, Vec<Card>),
    Weights(Bracket, TypeWeights),
}

/// Pack and run dedup sets. A name enters the run set once its pack is done.
#[derive(Debug, Clone, Default)]
pub struct DedupScope {
    pub pack: HashSet<String>,
    pub run: HashSet<String>,
}

impl DedupScope {
    pub fn used(&self) -> HashSet<String> {
        self.run.union(&self.pack).cloned().collect()
    }

    pub fn finish_pack(&mut self) {
        self.run.extend(self.pack.drain());
    }
}

pub struct PackAssembler<'a, S: CardSource + ?Sized> {
    slug: String,
    source: &'a S,
    options: &'a GenerateOptions,
    bracket: Bracket,
    budget: Budget,
    colors: Option<ColorIdentity>,
    pools: HashMap<PoolKey, Vec<Card>>,
    weights: HashMap<Bracket, TypeWeights>,
}

impl<'a, S: CardSource + ?Sized> PackAssembler<'a, S> {
    pub fn new(
        slug: &str,
        request: &GenerateRequest,
        bundle: &BundleConfig,
        source: &'a S,
        options: &'a GenerateOptions,
    ) -> Self {
        let colors = if needs_commander_colors(bundle) {
            match source.commander_colors(slug) {
                Ok(colors) => colors,
                Err(err) => {
                    log::warn!("no colour identity for {slug}, colour filter off: {err}");
                    None
                }
            }
        } else {
            None
        };
        Self {
            slug: slug.to_string(),
            source,
            options,
            bracket: request.effective_bracket(),
            budget: request.budget,
            colors,
            pools: HashMap::new(),
            weights: HashMap::new(),
        }
    }

    pub fn commander_colors(&self) -> Option<&ColorIdentity> {
        self.colors.as_ref()
    }

    fn plan(&self, pack: &PackType, slot: &Slot) -> SlotPlan {
        let count = slot.count() as usize;
        match slot {
            Slot::Edhrec(slot) => {
                let bracket = slot
                    .bracket
                    .unwrap_or_default()
                    .or(pack.bracket.unwrap_or_default())
                    .or(self.bracket);
                let budget = slot.budget.or(pack.budget).unwrap_or(self.budget);
                let strategy = Strategy::parse(&slot.card_type);
                let game_changers = self.options.game_changers.is_some()
                    && strategy == Strategy::Category(GAME_CHANGERS_TAG.to_string());
                let weights = (strategy == Strategy::Weighted).then_some(bracket);
                SlotPlan {
                    key: PoolKey::Edhrec {
                        bracket,
                        budget,
                        game_changers,
                    },
                    strategy,
                    count,
                    weights,
                }
            }
            Slot::Scryfall(slot) => SlotPlan {
                key: PoolKey::Scryfall {
                    query: slot.query.clone(),
                    colors: self.filter_colors(pack, slot.use_commander_color_identity),
                },
                strategy: Strategy::Random,
                count,
                weights: None,
            },
            Slot::Moxfield(slot) => SlotPlan {
                key: PoolKey::Moxfield {
                    deck_url: slot.deck_url.clone(),
                    colors: self.filter_colors(pack, slot.use_commander_color_identity),
                },
                strategy: Strategy::Random,
                count,
                weights: None,
            },
        }
    }

    fn filter_colors(&self, pack: &PackType, slot_flag: Option<bool>) -> Option<ColorIdentity> {
        if slot_flag.unwrap_or(pack.use_commander_color_identity) {
            self.colors.clone()
        } else {
            None
        }
    }

    /// Fetches every distinct pool and weight table of `bundle` on at most
    /// `max_workers` threads.
    pub fn prefetch(&mut self, bundle: &BundleConfig) {
        let mut jobs = Vec::new();
        let mut seen = HashSet::new();
        for pack in &bundle.pack_types {
            for slot in &pack.slots {
                let plan = self.plan(pack, slot);
                let mut wanted = vec![Fetch::Pool(plan.key)];
                if let Some(bracket) = plan.weights {
                    wanted.push(Fetch::Weights(bracket));
                }
                for job in wanted {
                    let cached = match &job {
                        Fetch::Pool(key) => self.pools.contains_key(key),
                        Fetch::Weights(bracket) => self.weights.contains_key(bracket),
                    };
                    if !cached && seen.insert(job.clone()) {
                        jobs.push(job);
                    }
                }
            }
        }
        if jobs.is_empty() {
            return;
        }

        let workers = self.options.max_workers.clamp(1, jobs.len());
        let chunk = jobs.len().div_ceil(workers);
        log::debug!("prefetching {} sources for {} on {workers} workers", jobs.len(), self.slug);

        let slug = self.slug.as_str();
        let source = self.source;
        let game_changers = self.options.game_changers.as_ref();
        let fetched: Vec<Fetched> = thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .chunks(chunk)
                .map(|batch| {
                    scope.spawn(move || {
                        batch
                            .iter()
                            .map(|job| run_fetch(source, slug, game_changers, job))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(batch) => batch,
                    Err(_) => {
                        log::warn!("prefetch worker panicked; affected sources load lazily");
                        Vec::new()
                    }
                })
                .collect()
        });

        for item in fetched {
            match item {
                Fetched::Pool(key, cards) => {
                    self.pools.insert(key, cards);
                }
                Fetched::Weights(bracket, weights) => {
                    self.weights.insert(bracket, weights);
                }
            }
        }
    }

    fn pool(&mut self, key: &PoolKey) -> &[Card] {
        if !self.pools.contains_key(key) {
            let game_changers = self.options.game_changers.as_ref();
            let cards = fetch_pool(self.source, &self.slug, game_changers, key);
            self.pools.insert(key.clone(), cards);
        }
        self.pools.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    fn type_weights(&mut self, bracket: Bracket) -> TypeWeights {
        if let Some(weights) = self.weights.get(&bracket) {
            return weights.clone();
        }
        let weights = fetch_weights(self.source, &self.slug, bracket);
        self.weights.insert(bracket, weights.clone());
        weights
    }

    /// Materialises every repetition of `pack`. Names land in `scope.run`
    /// after each pack instance.
    pub fn assemble(&mut self, pack: &PackType, scope: &mut DedupScope, rng: &mut RngState) -> Vec<Pack> {
        let mut packs = Vec::new();
        for index in 0..pack.count {
            scope.pack.clear();
            let mut cards = Vec::new();
            for slot in &pack.slots {
                let plan = self.plan(pack, slot);
                let weights = match plan.weights {
                    Some(bracket) => self.type_weights(bracket),
                    None => TypeWeights::default(),
                };
                let mut used = scope.used();
                let pool = self.pool(&plan.key);
                if pool.is_empty() {
                    log::warn!("{}: empty pool for {:?}, slot skipped", pack.display_name(), plan.key);
                    continue;
                }
                let picked = select(pool, &plan.strategy, plan.count, &mut used, &weights, rng);
                if picked.len() < plan.count {
                    log::debug!(
                        "{}: slot {:?} filled {}/{}",
                        pack.display_name(),
                        plan.strategy,
                        picked.len(),
                        plan.count
                    );
                }
                scope.pack.extend(picked.iter().cloned());
                cards.extend(picked);
            }
            scope.finish_pack();
            packs.push(Pack {
                name: Pack::display_name(pack.display_name(), index, pack.count),
                cards,
            });
        }
        packs
    }
}

fn needs_commander_colors(bundle: &BundleConfig) -> bool {
    bundle.pack_types.iter().any(|pack| {
        pack.source != Source::Edhrec
            && pack.slots.iter().any(|slot| {
                let flag = match slot {
                    Slot::Scryfall(slot) => slot.use_commander_color_identity,
                    Slot::Moxfield(slot) => slot.use_commander_color_identity,
                    Slot::Edhrec(_) => Some(false),
                };
                flag.unwrap_or(pack.use_commander_color_identity)
            })
    })
}

fn run_fetch<S: CardSource + ?Sized>(
    source: &S,
    slug: &str,
    game_changers: Option<&HashSet<String>>,
    job: &Fetch,
) -> Fetched {
    match job {
        Fetch::Pool(key) => Fetched::Pool(key.clone(), fetch_pool(source, slug, game_changers, key)),
        Fetch::Weights(bracket) => Fetched::Weights(*bracket, fetch_weights(source, slug, *bracket)),
    }
}

fn fetch_pool<S: CardSource + ?Sized>(
    source: &S,
    slug: &str,
    game_changers: Option<&HashSet<String>>,
    key: &PoolKey,
) -> Vec<Card> {
    match key {
        PoolKey::Edhrec {
            bracket,
            budget,
            game_changers: collect,
        } => match source.edhrec_page(slug, *bracket, *budget) {
            Ok(page) => {
                let changers = if *collect { game_changers } else { None };
                normalize_edhrec(&page.cardlists, changers)
            }
            Err(err) => {
                log::warn!("edhrec {slug} bracket {bracket} budget {budget}: {err}");
                Vec::new()
            }
        },
        PoolKey::Scryfall { query, colors } => {
            let query = build_scryfall_query(query, colors.as_ref());
            collect_scryfall(&query, |cursor| source.scryfall_page(cursor))
        }
        PoolKey::Moxfield { deck_url, colors } => match source.moxfield_deck(deck_url) {
            Ok(deck) => normalize_moxfield(&deck, colors.as_ref()),
            Err(err) => {
                log::warn!("moxfield {deck_url}: {err}");
                Vec::new()
            }
        },
    }
}

fn fetch_weights<S: CardSource + ?Sized>(source: &S, slug: &str, bracket: Bracket) -> TypeWeights {
    match source.average_deck(slug, bracket) {
        Ok(counts) => counts.type_weights(),
        Err(err) => {
            log::warn!("average deck {slug} bracket {bracket}: {err}");
            TypeWeights::default()
        }
    }
}

/// Runs one generation request end to end. Provider failures only shrink the
/// result; the error cases are request-shape problems.
pub fn generate<S: CardSource + ?Sized>(
    request: &GenerateRequest,
    source: &S,
    rng: &mut RngState,
    options: &GenerateOptions,
) -> Result<Vec<Pack>, ConfigError> {
    let slug = request.resolve_slug()?;
    let bundle = request.config.clone().unwrap_or_else(default_bundle);
    bundle.validate()?;
    let mut assembler = PackAssembler::new(&slug, request, &bundle, source, options);
    assembler.prefetch(&bundle);

    let mut scope = DedupScope::default();
    let mut packs = Vec::new();
    for pack in &bundle.pack_types {
        packs.extend(assembler.assemble(pack, &mut scope, rng));
    }
    log::info!("generated {} packs for {slug}", packs.len());
    Ok(packs)
}
