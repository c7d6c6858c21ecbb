use anyhow::{anyhow, bail, Context};
use packforge_core::{generate, Bracket, Budget, GenerateOptions, GenerateRequest, RngState, DEFAULT_BRACKET};
use packforge_data::{default_assets_dir, load_game_changers, resolve_bundle_config, GAME_CHANGERS_FILE};
use packforge_providers::{HttpCardSource, ProviderConfig, DEFAULT_TIMEOUT_SECS};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

const USAGE: &str = "usage: packforge <commander slug|edhrec url> [--config NAME|PATH] [--bracket N|any] \
[--budget any|budget|expensive] [--seed N] [--workers N]";

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    commander: String,
    config: Option<String>,
    bracket: Bracket,
    budget: Budget,
    seed: Option<u64>,
    workers: Option<usize>,
}

fn parse_budget(value: &str) -> anyhow::Result<Budget> {
    match value.trim().to_ascii_lowercase().as_str() {
        "any" | "" => Ok(Budget::Any),
        "budget" => Ok(Budget::Budget),
        "expensive" => Ok(Budget::Expensive),
        other => bail!("unknown budget {other}"),
    }
}

fn flag_value<'a>(args: &'a [String], idx: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(idx + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{flag} needs a value"))
}

fn parse_cli_options(args: &[String]) -> anyhow::Result<CliOptions> {
    let mut commander = None;
    let mut config = None;
    let mut bracket = Bracket::Level(DEFAULT_BRACKET);
    let mut budget = Budget::Any;
    let mut seed = None;
    let mut workers = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => {
                config = Some(flag_value(args, idx, "--config")?.to_string());
                idx += 1;
            }
            "--bracket" | "-b" => {
                bracket = Bracket::parse(flag_value(args, idx, "--bracket")?)?;
                idx += 1;
            }
            "--budget" => {
                budget = parse_budget(flag_value(args, idx, "--budget")?)?;
                idx += 1;
            }
            "--seed" => {
                let value = flag_value(args, idx, "--seed")?;
                seed = Some(value.parse::<u64>().with_context(|| format!("parse --seed {value}"))?);
                idx += 1;
            }
            "--workers" => {
                let value = flag_value(args, idx, "--workers")?;
                workers = Some(value.parse::<usize>().with_context(|| format!("parse --workers {value}"))?);
                idx += 1;
            }
            "--help" | "-h" => bail!(USAGE),
            other if other.starts_with('-') => bail!("unknown flag {other}\n{USAGE}"),
            other => {
                if commander.replace(other.to_string()).is_some() {
                    bail!("more than one commander given\n{USAGE}");
                }
            }
        }
        idx += 1;
    }
    Ok(CliOptions {
        commander: commander.ok_or_else(|| anyhow!(USAGE))?,
        config,
        bracket,
        budget,
        seed,
        workers,
    })
}

fn build_request(options: &CliOptions, assets_dir: &Path) -> anyhow::Result<GenerateRequest> {
    let config = options
        .config
        .as_deref()
        .map(|value| resolve_bundle_config(assets_dir, value))
        .transpose()?;
    let (commander_slug, commander_url) = if options.commander.contains("/commanders/") {
        (None, Some(options.commander.clone()))
    } else {
        (Some(options.commander.clone()), None)
    };
    Ok(GenerateRequest {
        commander_slug,
        commander_url,
        config,
        bracket: options.bracket,
        budget: options.budget,
    })
}

fn env_assets_dir() -> PathBuf {
    std::env::var("PACKFORGE_ASSETS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_assets_dir())
}

fn env_timeout() -> anyhow::Result<Duration> {
    let secs = match std::env::var("PACKFORGE_TIMEOUT_SECS") {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("parse PACKFORGE_TIMEOUT_SECS={value}"))?,
        Err(_) => DEFAULT_TIMEOUT_SECS,
    };
    Ok(Duration::from_secs(secs))
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let options = parse_cli_options(args)?;
    let assets_dir = env_assets_dir();
    let request = build_request(&options, &assets_dir)?;

    let game_changers = load_game_changers(&assets_dir.join(GAME_CHANGERS_FILE))?;
    let mut generate_options = GenerateOptions {
        game_changers: (!game_changers.is_empty()).then_some(game_changers),
        ..GenerateOptions::default()
    };
    if let Some(workers) = options.workers {
        generate_options.max_workers = workers.max(1);
    }

    let source = HttpCardSource::new(ProviderConfig {
        timeout: env_timeout()?,
        ..ProviderConfig::default()
    });
    let mut rng = match options.seed {
        Some(seed) => RngState::from_seed(seed),
        None => RngState::from_entropy(),
    };
    log::info!("generating packs for {} (seed {})", options.commander, rng.seed());
    let packs = generate(&request, &source, &mut rng, &generate_options)?;
    println!("{}", serde_json::to_string_pretty(&json!({ "packs": packs }))?);
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(&args) {
        eprintln!("packforge error: {err:#}");
        std::process::exit(1);
    }
}
