mod render;
mod server;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};

use twin_core::{
    ArchiveOutcome, DisplayPolicy, RecordId, TokenRecord, Verdict, extract, looks_like_report,
};
use twin_store::{Store, TwinConfig, default_data_dir};

#[derive(Parser)]
#[command(name = "twin", about = "Find archived token reports that look like a new one")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Extract report files and add them to the archive
    Archive {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compare report files against the archive
    Compare {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print verdicts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the similarity threshold, or set it
    Threshold {
        /// New threshold between 0 and 100
        value: Option<f64>,
    },

    /// Forget which contracts were already surfaced
    Reset,

    /// Show archive statistics
    Stats,

    /// List the most recently archived reports
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// List every archived contract address, by token name
    Contracts,

    /// Delete archived reports
    Delete {
        #[command(flatten)]
        target: DeleteTarget,
    },

    /// Delete every archived report
    Clear {
        /// Confirm wiping the archive
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DeleteTarget {
    /// Contract address of the reports to delete
    contract: Option<String>,

    /// Record id, as printed by `archive`
    #[arg(long)]
    id: Option<RecordId>,

    /// Exact token name
    #[arg(long)]
    name: Option<String>,

    /// The most recently archived report
    #[arg(long)]
    last: bool,

    /// Archive numbers shown by `list`, as FIRST-LAST
    #[arg(long)]
    range: Option<SeqRange>,
}

#[derive(Debug, Clone, Copy)]
struct SeqRange {
    first: i64,
    last: i64,
}

impl FromStr for SeqRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (first, last) = s
            .split_once('-')
            .ok_or_else(|| format!("expected FIRST-LAST, got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<i64>()
                .map_err(|e| format!("invalid archive number '{v}': {e}"))
        };
        let (first, last) = (parse(first)?, parse(last)?);
        if first > last {
            return Err(format!("range start {first} is after its end {last}"));
        }
        Ok(Self { first, last })
    }
}

fn data_dir() -> PathBuf {
    default_data_dir()
}

fn open_policy() -> Result<DisplayPolicy<Store>> {
    let dir = data_dir();
    let config = TwinConfig::load(&dir).context("failed to load config")?;
    let store = Store::open_in_dir(&dir)
        .with_context(|| format!("failed to open store in {}", dir.display()))?;
    Ok(DisplayPolicy::new(store, config.policy_config()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve().await,
        Commands::Archive { files } => cmd_archive(files),
        Commands::Compare { files, json } => cmd_compare(files, *json),
        Commands::Threshold { value } => cmd_threshold(*value),
        Commands::Reset => cmd_reset(),
        Commands::Stats => cmd_stats(),
        Commands::List { limit } => cmd_list(*limit),
        Commands::Contracts => cmd_contracts(),
        Commands::Delete { target } => cmd_delete(target),
        Commands::Clear { yes } => cmd_clear(*yes),
    }
}

async fn cmd_serve() -> Result<()> {
    let dir = data_dir();
    let config = TwinConfig::load(&dir).context("failed to load config")?;
    let store = Store::open_in_dir(&dir)
        .with_context(|| format!("failed to open store in {}", dir.display()))?;
    tracing::info!("starting MCP server on {}", dir.display());

    let server = server::TwinServer::new(store, config);
    let service = server
        .clone()
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;

    server.checkpoint_wal().await;
    Ok(())
}

/// Read and extract a report file. `None` if the text is not a report.
fn read_report(path: &Path) -> Result<Option<TokenRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if !looks_like_report(&text) {
        println!("skipped {}: not a token report", path.display());
        return Ok(None);
    }
    Ok(Some(extract(&text)))
}

fn cmd_archive(files: &[PathBuf]) -> Result<()> {
    let policy = open_policy()?;
    for path in files {
        let Some(record) = read_report(path)? else {
            continue;
        };
        let outcome = policy
            .archive(&record)
            .with_context(|| format!("failed to archive {}", path.display()))?;
        match outcome {
            ArchiveOutcome::Stored { id } => println!("archived {} ({id})", record.name),
            ArchiveOutcome::Duplicate { existing } => println!(
                "duplicate {}: contract already archived as {} ({})",
                record.name, existing.record.name, existing.created_at
            ),
        }
    }
    println!("done. tokens={}", policy.repository().count()?);
    Ok(())
}

fn cmd_compare(files: &[PathBuf], json: bool) -> Result<()> {
    let policy = open_policy()?;
    for path in files {
        let Some(record) = read_report(path)? else {
            continue;
        };
        let verdict = policy
            .evaluate(&record)
            .with_context(|| format!("failed to compare {}", path.display()))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            continue;
        }
        match &verdict {
            Verdict::Emit(emission) => println!("{}\n", render::render_emission(&record, emission)),
            Verdict::Suppress(reason) => println!("{}", render::render_suppression(&record, reason)),
        }
    }
    Ok(())
}

fn cmd_threshold(value: Option<f64>) -> Result<()> {
    let policy = open_policy()?;
    match value {
        Some(v) => {
            let previous = policy.set_threshold(v).context("failed to set threshold")?;
            println!("threshold: {v:.1} (was {previous:.1})");
        }
        None => {
            let current = policy.threshold().context("failed to read threshold")?;
            println!("threshold: {current:.1}");
        }
    }
    Ok(())
}

fn cmd_reset() -> Result<()> {
    let policy = open_policy()?;
    let cleared = policy.reset_displayed().context("failed to reset")?;
    println!("cleared {cleared} displayed contracts");
    Ok(())
}

fn cmd_stats() -> Result<()> {
    let policy = open_policy()?;
    let store = policy.repository();
    println!("tokens:     {}", store.count()?);
    println!("displayed:  {}", store.displayed_count()?);
    println!(
        "threshold:  {:.1}",
        policy.threshold().context("failed to read threshold")?
    );
    Ok(())
}

fn cmd_list(limit: usize) -> Result<()> {
    let policy = open_policy()?;
    let recent = policy
        .repository()
        .list_recent(limit)
        .context("failed to list tokens")?;
    if recent.is_empty() {
        println!("(no archived reports)");
    }
    for token in recent {
        let record = &token.stored.record;
        println!(
            "#{:<5} {}  {}  {}",
            token.seq,
            token.stored.created_at,
            record.name,
            record.contract_address.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_contracts() -> Result<()> {
    let policy = open_policy()?;
    let contracts = policy
        .repository()
        .list_contracts()
        .context("failed to list contracts")?;
    if contracts.is_empty() {
        println!("(no archived contracts)");
    }
    for (name, contract) in &contracts {
        println!("{name}  {contract}");
    }
    Ok(())
}

fn cmd_delete(target: &DeleteTarget) -> Result<()> {
    let policy = open_policy()?;
    let store = policy.repository();

    if let Some(contract) = &target.contract {
        let (deleted, names) = store.delete_by_contract(contract).context("failed to delete")?;
        if deleted == 0 {
            println!("no archived reports for {contract}");
        } else {
            println!("deleted {deleted}: {}", names.join(", "));
        }
    } else if let Some(id) = &target.id {
        match store.delete_by_id(id).context("failed to delete")? {
            Some(name) => println!("deleted 1: {name}"),
            None => println!("no archived report with id {id}"),
        }
    } else if let Some(name) = &target.name {
        let deleted = store.delete_by_name(name).context("failed to delete")?;
        if deleted == 0 {
            println!("no archived reports named {name}");
        } else {
            println!("deleted {deleted}: {name}");
        }
    } else if target.last {
        match store.delete_last().context("failed to delete")? {
            Some(name) => println!("deleted 1: {name}"),
            None => println!("(no archived reports)"),
        }
    } else if let Some(SeqRange { first, last }) = target.range {
        let (deleted, names) = store.delete_range(first, last).context("failed to delete")?;
        if deleted == 0 {
            println!("no archived reports in #{first}-#{last}");
        } else {
            println!("deleted {deleted}: {}", names.join(", "));
        }
    }
    Ok(())
}

fn cmd_clear(yes: bool) -> Result<()> {
    let policy = open_policy()?;
    let store = policy.repository();
    if !yes {
        bail!(
            "refusing to delete {} archived reports without --yes",
            store.count()?
        );
    }
    let deleted = store.clear_all().context("failed to clear archive")?;
    println!("cleared {deleted} archived reports");
    Ok(())
}
