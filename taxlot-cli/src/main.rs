//! Taxlot CLI: import statements, match tax lots, check data quality.
//!
//! Commands:
//! - `import`: merge broker statements into the persisted ledger
//! - `match`: pair closes with opens and write the pairing report
//! - `check`: list data-quality findings (impossible closes, transfer gaps)
//!
//! Every command reads an optional TOML config; flags override it.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use taxlot_core::{DataQualityWarning, MatchScope, MatchStrategy};
use taxlot_runner::{import_statements, run_check, run_match, MatchOutcome, RunConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "taxlot",
    about = "Taxlot CLI: trade ledger and tax-lot matching"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Ledger location, shared by every command.
#[derive(Args)]
struct LedgerArgs {
    /// Path to a TOML run config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persisted trades CSV (overrides `trades_path`).
    #[arg(long)]
    trades: Option<PathBuf>,

    /// Corporate actions CSV (overrides `actions_path`).
    #[arg(long)]
    actions: Option<PathBuf>,

    /// Rename history CSV (overrides `renames_path`).
    #[arg(long)]
    renames: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge broker statement files into the ledger.
    Import {
        /// Statement CSV files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        ledger: LedgerArgs,

        /// Account for statements without an `Account` column.
        #[arg(long)]
        account: Option<String>,
    },
    /// Match closes against open lots and write the pairing report.
    Match {
        #[command(flatten)]
        ledger: LedgerArgs,

        /// fifo, lifo, average-cost, max-loss or max-profit.
        #[arg(long)]
        strategy: Option<String>,

        /// global or per_account.
        #[arg(long)]
        scope: Option<String>,

        /// Close years to report, comma separated. Defaults to all.
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,

        /// Output directory for the pairing report.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Pairs held longer than this many days are not taxable.
        #[arg(long)]
        exempt_after_days: Option<i64>,
    },
    /// Report data-quality findings. Exits non-zero when there are any.
    Check {
        #[command(flatten)]
        ledger: LedgerArgs,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            files,
            ledger,
            account,
        } => {
            let mut config = load_config(&ledger)?;
            if account.is_some() {
                config.default_account = account;
            }
            run_import(&config, &files)
        }
        Commands::Match {
            ledger,
            strategy,
            scope,
            years,
            output_dir,
            exempt_after_days,
        } => {
            let mut config = load_config(&ledger)?;
            if let Some(s) = strategy {
                config.strategy = s;
            }
            if let Some(s) = scope {
                config.scope = s;
            }
            if !years.is_empty() {
                config.process_years = years;
            }
            if output_dir.is_some() {
                config.output_dir = output_dir;
            }
            if exempt_after_days.is_some() {
                config.taxable.exempt_after_days = exempt_after_days;
            }
            run_match_cmd(&config)
        }
        Commands::Check { ledger } => run_check_cmd(&load_config(&ledger)?),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taxlot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &LedgerArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if args.trades.is_some() {
        config.trades_path = args.trades.clone();
    }
    if args.actions.is_some() {
        config.actions_path = args.actions.clone();
    }
    if args.renames.is_some() {
        config.renames_path = args.renames.clone();
    }
    if config.trades_path.is_none() {
        bail!("no trades file: pass --trades or set trades_path in the config");
    }
    tracing::debug!(strategy = %config.strategy, scope = %config.scope, "loaded config");
    Ok(config)
}

fn run_import(config: &RunConfig, files: &[PathBuf]) -> Result<()> {
    let (ledger, report) = import_statements(config, files)?;

    println!(
        "Imported {} new trades from {} of {} files ({} rows read). Ledger holds {} trades.",
        report.imported,
        report.succeeded(),
        report.files,
        report.loaded,
        ledger.len()
    );
    if !report.is_clean() {
        for (path, err) in &report.failed {
            eprintln!("Error in {}: {err}", path.display());
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_match_cmd(config: &RunConfig) -> Result<()> {
    // Validate flags before touching the ledger.
    let strategy: MatchStrategy = config.match_strategy()?;
    let scope: MatchScope = config.match_scope()?;

    let outcome = run_match(config)?;
    print_summary(&outcome, strategy, scope, &config.process_years);
    for path in &outcome.written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_check_cmd(config: &RunConfig) -> Result<()> {
    let findings = run_check(config)?;
    if findings.is_empty() {
        println!("No data-quality findings.");
        return Ok(());
    }
    print_findings(&findings);
    std::process::exit(1);
}

fn print_summary(
    outcome: &MatchOutcome,
    strategy: MatchStrategy,
    scope: MatchScope,
    years: &[i32],
) {
    let result = &outcome.result;
    let uncovered: f64 = result.uncovered().map(|c| c.uncovered).sum();

    println!();
    println!("═══ Matching ({strategy}, {scope}) ═══");
    println!("  Pairs:           {}", result.pairs.len());
    println!("  Uncovered:       {} closes, {uncovered:.3} shares", result.uncovered().count());
    println!("  Open lots:       {}", result.remaining_lots.len());
    println!("  Findings:        {} (run `taxlot check` for details)", outcome.warnings.len());
    if years.is_empty() {
        println!("  Realized gain:   {:.2}", outcome.realized_in(years));
    } else {
        for year in years {
            println!("  Realized {year}:   {:.2}", outcome.realized_in(&[*year]));
        }
    }
    println!();
}

fn print_findings(findings: &[DataQualityWarning]) {
    println!("{} data-quality findings:", findings.len());
    for f in findings {
        println!("  {f}");
    }
}
