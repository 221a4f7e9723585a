//! Price Refresher - Collectible Catalog Pricing
//!
//! Refreshes the priced catalog of cases, keys and item variants from
//! bulk marketplace dumps and live per-item lookups. Runs once by
//! default; `--daemon` keeps it alive on the configured schedule.

use clap::Parser;
use price_refresher::bulk::{load_all_sources, BulkBoard};
use price_refresher::fallback::{Orchestrator, OrchestratorOptions};
use price_refresher::fx::FxClient;
use price_refresher::lock::SingleInstanceLock;
use price_refresher::names::{CaseIndex, Overrides};
use price_refresher::providers::{CsfloatProvider, LiveProvider, SteamProvider};
use price_refresher::{
    daemon, gitops, Config, EngineOptions, PriceCatalog, RefreshEngine, Result, SkipLedger,
};
use std::path::PathBuf;

/// Refresh the collectible price catalog from marketplace data
#[derive(Parser, Debug)]
#[command(name = "price_refresher")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config/price-refresher.json")]
    config: PathBuf,

    /// Resolve prices and report statistics without writing anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Refresh every entry regardless of age
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Keep running and refresh on the configured schedule
    #[arg(long, default_value_t = false)]
    daemon: bool,

    /// Stop after attempting this many entries
    #[arg(long)]
    max_items: Option<usize>,

    /// Only retry entries currently in the skip ledger
    #[arg(long, default_value_t = false)]
    retry_skipped: bool,
}

fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();
    log::info!("Starting price_refresher (config: {})", args.config.display());

    let result = if args.daemon {
        daemon::run_daemon(&config, || run_once(&config, &args))
    } else {
        run_once(&config, &args)
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

/// One full refresh: lock, load, resolve, persist.
fn run_once(config: &Config, args: &Args) -> Result<()> {
    let opts = EngineOptions {
        dry_run: args.dry_run,
        force: args.force,
        max_items: args.max_items,
        retry_skipped: args.retry_skipped,
    };

    let _lock = SingleInstanceLock::acquire(&config.resolve(&config.paths.lock_file))?;

    let prices_path = config.resolve(&config.paths.prices_json);
    let mut catalog = PriceCatalog::load(&prices_path)?;
    let overrides = Overrides::load(&config.resolve(&config.paths.overrides_json));
    let case_index = CaseIndex::load(&config.resolve(&config.paths.case_odds_dir));
    let ledger_path = config.resolve(&config.paths.skip_ledger_json);
    let mut ledger = SkipLedger::load(&ledger_path);

    let fx_rate = if config.providers.fx.enabled {
        FxClient::new(&config.http)?.fetch_usd_cad()
    } else {
        None
    };
    if fx_rate.is_none() {
        log::warn!("No USD/CAD rate available; USD sources are disabled this run");
    }

    let bulk = BulkBoard::new(
        load_all_sources(config, fx_rate),
        config.providers.aggregator.clone(),
    );
    log::info!("Bulk board ready ({} sources)", bulk.source_count());

    let mut providers: Vec<Box<dyn LiveProvider>> = Vec::new();
    if config.providers.steam.enabled {
        providers.push(Box::new(SteamProvider::new(
            &config.providers.steam,
            &config.http,
        )?));
    }
    if config.providers.csfloat.enabled {
        providers.push(Box::new(CsfloatProvider::new(
            &config.providers.csfloat,
            &config.http,
            config.csfloat_api_key(),
        )?));
    }
    let mut orchestrator = Orchestrator::new(
        providers,
        OrchestratorOptions {
            rotation: config.providers.rotation_mode,
            fallback_on_failure: config.providers.fallback_on_failure,
            max_attempts: config.api.retries.max_attempts,
            backoff_seconds: config.api.retries.backoff_seconds,
            fail_threshold: config.providers.failover.consecutive_hard_failures,
            cooldown_seconds: config.providers.failover.cooldown_seconds,
            skip_rounds_on_failure: config.providers.skip_rounds_on_failure,
        },
        fx_rate,
    );

    let engine = RefreshEngine::new(config, overrides, case_index, opts);
    let stats = engine.run(&mut catalog, &mut ledger, &bulk, &mut orchestrator);

    if args.dry_run {
        log::info!("Dry run: nothing written");
        return Ok(());
    }

    if prices_path.exists() {
        let backup = PriceCatalog::backup(&prices_path)?;
        log::info!("Backup written: {}", backup.display());
    }
    catalog.save_atomic(&prices_path)?;
    ledger.save(&ledger_path)?;

    if config.git.enabled {
        let message = format!(
            "Update prices: {} updated, {} skipped",
            stats.total_updated(),
            stats.total_skipped()
        );
        gitops::commit_if_changed(config.base(), &prices_path, &message);
    }

    log::info!("Refresh complete");
    Ok(())
}
