//! Navcache CLI.
//!
//! Build-task style entry points for the object cache: `rebuild` pre-primes
//! the cache from a page dump, `clean` clears the whole store, `show`
//! summarizes what a scope's persisted container holds.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use navcache::config::{ConfigLoader, NavcacheConfig};
use navcache::logging::init_logging;
use navcache::memory::{MemoryProbe, ProcMemoryProbe};
use navcache::queue::ThreadedJobQueue;
use navcache::{
    build_scope, ConfigRecord, NavigationStore, NullJobQueue, PageRecord, PageSet, RebuildEnv,
    ScopeKey, SledNavigationStore, SnapshotSpec, Stage,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "navcache", version, about = "Navigation object-cache maintenance")]
struct Cli {
    /// Configuration file (default: ./navcache.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sled store directory (overrides configuration).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the object cache from a page dump.
    Rebuild {
        /// JSON dump with the source pages and site configs.
        #[arg(long)]
        pages: PathBuf,

        /// Restrict the rebuild to one stage (default: both).
        #[arg(long)]
        stage: Option<Stage>,

        /// Restrict the rebuild to one subsite.
        #[arg(long)]
        subsite: Option<u64>,

        /// Process everything inline instead of queueing chunk jobs.
        #[arg(long)]
        inline: bool,

        /// Print peak-memory statistics while rebuilding.
        #[arg(long)]
        debug: bool,
    },

    /// Clear every persisted container.
    Clean,

    /// Summarize one scope's persisted container.
    Show {
        #[arg(long, default_value_t = 0)]
        subsite: u64,

        #[arg(long, default_value_t = Stage::Live)]
        stage: Stage,
    },
}

/// On-disk dump format consumed by `rebuild`.
#[derive(Debug, Deserialize)]
struct PageDump {
    configs: Vec<ConfigRecord>,
    pages: Vec<PageRecord>,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading configuration: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = init_logging(Some(&config.logging)) {
        eprintln!("Error initializing logging: {err}");
        process::exit(1);
    }

    if let Err(err) = run(cli, config) {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<NavcacheConfig> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("reading {}", path.display())),
        None => ConfigLoader::load().context("reading navcache configuration"),
    }
}

fn run(cli: Cli, config: NavcacheConfig) -> Result<()> {
    let store_path = resolve_store_path(&cli, &config)?;
    let store: Arc<dyn NavigationStore> = Arc::new(
        SledNavigationStore::open(&store_path)
            .with_context(|| format!("opening cache store at {}", store_path.display()))?,
    );

    match cli.command {
        Command::Rebuild {
            pages,
            stage,
            subsite,
            inline,
            debug,
        } => rebuild(store, config, &pages, stage, subsite, inline, debug),
        Command::Clean => {
            store.clear().context("clearing cache store")?;
            println!("Cleanup: {} done.", store_path.display());
            Ok(())
        }
        Command::Show { subsite, stage } => show(store, ScopeKey::new(subsite, stage)),
    }
}

fn resolve_store_path(cli: &Cli, config: &NavcacheConfig) -> Result<PathBuf> {
    if let Some(path) = &cli.store {
        return Ok(path.clone());
    }
    if let Some(path) = &config.store.path {
        return Ok(path.clone());
    }
    let dirs = directories::ProjectDirs::from("", "navcache", "navcache")
        .context("platform data directory unavailable; pass --store")?;
    Ok(dirs.data_dir().join("store"))
}

#[allow(clippy::too_many_arguments)]
fn rebuild(
    store: Arc<dyn NavigationStore>,
    config: NavcacheConfig,
    dump_path: &PathBuf,
    stage: Option<Stage>,
    subsite: Option<u64>,
    inline: bool,
    debug: bool,
) -> Result<()> {
    let started = chrono::Utc::now();
    let raw = std::fs::read_to_string(dump_path)
        .with_context(|| format!("reading page dump {}", dump_path.display()))?;
    let dump: PageDump = serde_json::from_str(&raw)
        .with_context(|| format!("parsing page dump {}", dump_path.display()))?;
    if dump.configs.is_empty() {
        bail!("page dump contains no site configs");
    }

    let probe = Arc::new(ProcMemoryProbe);
    let queue = Arc::new(ThreadedJobQueue::new());
    let job_queue: Arc<dyn navcache::JobQueue> = if inline {
        Arc::new(NullJobQueue)
    } else {
        queue.clone()
    };
    let env = RebuildEnv {
        store,
        queue: job_queue,
        probe: probe.clone(),
        spec: Arc::new(SnapshotSpec::with_subsites()),
        config: config.rebuild.clone(),
    };

    let stages: Vec<Stage> = match stage {
        Some(stage) => vec![stage],
        None => Stage::all().to_vec(),
    };
    let all_pages = PageSet::new(dump.pages);

    for site_config in &dump.configs {
        if subsite.is_some_and(|s| s != site_config.subsite) {
            continue;
        }
        let pages = all_pages.for_subsite(site_config.subsite);
        for stage in &stages {
            let scope = ScopeKey::new(site_config.subsite, *stage);
            let report = build_scope(&env, scope, &pages, site_config)
                .with_context(|| format!("rebuilding {scope}"))?;

            println!(
                "{} {} pages in subsite {} cached in {} chunks.",
                report.total, stage, site_config.subsite, report.chunks_queued
            );
            for warning in &report.warnings {
                println!("WARNING: {warning}");
            }
            if debug {
                println!(
                    "Memory peak: {:.1}Mb",
                    probe.peak_bytes() as f64 / 1024.0 / 1024.0
                );
            }
        }
    }

    // Chunk jobs run on their own workers; the build task waits for the
    // last of them before reporting.
    queue.wait_idle();
    for failure in queue.failures() {
        println!("WARNING: error(s) occurred during chunking: {failure}");
    }

    let elapsed = chrono::Utc::now() - started;
    println!("Time to run: {}s", elapsed.num_seconds());
    Ok(())
}

fn show(store: Arc<dyn NavigationStore>, scope: ScopeKey) -> Result<()> {
    match store.load(scope).context("loading container")? {
        None => println!("No cached container for {scope}."),
        Some(tree) => {
            println!("Container for {scope}:");
            println!("  completed: {}", tree.is_completed());
            println!("  nodes: {}", tree.len());
            println!("  roots: {}", tree.root_ids().len());
            match tree.config() {
                Some(config) => println!("  site config: #{} {}", config.id, config.title),
                None => println!("  site config: none"),
            }
            for root in tree.root_elements() {
                println!("  - {} (#{}) {} children", root.title, root.id, root.child_count());
            }
        }
    }
    Ok(())
}
