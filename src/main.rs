use anyhow::{Context, bail};
use backtester::{Backtester, RunRequest, RunResult, verify_replay};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use configuration::{BacktestOverrides, Config, init_tracing, load_config};
use market_data::{HistoricalPrices, PriceProvider};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use strategies::create_strategy;

/// The main entry point for the Zenith backtester.
fn main() -> ExitCode {
    // A missing .env file is fine; it only supplies ZENITH__ overrides.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A deterministic daily backtest engine with hard capital and leverage limits.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest and print its performance summary.
    Backtest {
        #[command(flatten)]
        overrides: BacktestOverrides,

        /// Write the performance report as JSON to this file.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the per-day invariant log after the summary.
        #[arg(long)]
        show_log: bool,
    },
    /// Run the same backtest twice and compare the digest sequences day by day.
    Verify {
        #[command(flatten)]
        overrides: BacktestOverrides,
    },
}

fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let overrides = match &cli.command {
        Commands::Backtest { overrides, .. } | Commands::Verify { overrides } => overrides,
    };
    let config = prepare_config(&cli.config, overrides)?;
    let _log_guard = init_tracing(&config.logging).context("Failed to initialise logging")?;

    match cli.command {
        Commands::Backtest {
            report, show_log, ..
        } => handle_run(&config, report, show_log),
        Commands::Verify { .. } => handle_verify(&config),
    }
}

fn prepare_config(path: &Path, overrides: &BacktestOverrides) -> anyhow::Result<Config> {
    let mut config = load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration after CLI overrides")?;
    Ok(config)
}

fn load_prices(config: &Config) -> anyhow::Result<Arc<dyn PriceProvider>> {
    let path = &config.backtest.prices_path;
    let prices = HistoricalPrices::from_csv_path(path)
        .with_context(|| format!("Failed to load prices from {}", path.display()))?;
    if prices.is_empty() {
        bail!("price file {} contains no rows", path.display());
    }
    tracing::info!(rows = prices.len(), path = %path.display(), "Price history loaded");
    Ok(Arc::new(prices))
}

fn build_backtester(
    config: &Config,
    provider: Arc<dyn PriceProvider>,
    show_progress: bool,
) -> anyhow::Result<Backtester> {
    let strategy = create_strategy(config.backtest.strategy, config, provider.clone())
        .context("Failed to build strategy")?;
    let backtester = Backtester::from_config(config, strategy, provider)
        .context("Failed to build constraint checker")?
        .with_progress(show_progress);
    Ok(backtester)
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_run(
    config: &Config,
    report_path: Option<PathBuf>,
    show_log: bool,
) -> anyhow::Result<ExitCode> {
    let provider = load_prices(config)?;
    let backtester = build_backtester(config, provider, true)?;

    tracing::info!(
        run_id = %backtester.run_id(),
        strategy = %config.backtest.strategy,
        from = %config.backtest.start_date,
        to = %config.backtest.end_date,
        "Starting backtest"
    );
    let result = backtester.run_request(&RunRequest::from_config(config));

    let report = result.summary().context("Failed to compute performance report")?;
    print_summary(&result, &report);
    print_attribution(&report);

    if show_log {
        println!();
        for line in &result.invariant_log {
            println!("{line}");
        }
    }

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if let Some(failure) = result.final_status.failure() {
        eprintln!("Run aborted: {failure}");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_verify(config: &Config) -> anyhow::Result<ExitCode> {
    let provider = load_prices(config)?;
    let request = RunRequest::from_config(config);

    let first = build_backtester(config, provider.clone(), false)?.run_request(&request);
    let second = build_backtester(config, provider, false)?.run_request(&request);

    if let Err(violation) = first.audit() {
        eprintln!("Recorded digests do not match the recorded snapshots: {violation}");
        return Ok(ExitCode::FAILURE);
    }

    match verify_replay(&first, &second) {
        Ok(()) => {
            println!(
                "Deterministic: {} days, {} trades, fingerprint {}",
                first.snapshots.len(),
                first.trades.len(),
                first.fingerprint()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(violation) => {
            eprintln!("Replay diverged: {violation}");
            Ok(ExitCode::FAILURE)
        }
    }
}

// ==============================================================================
// Output
// ==============================================================================

fn opt(value: Option<Decimal>) -> String {
    value.map(|v| v.round_dp(4).to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn print_summary(result: &RunResult, report: &analytics::PerformanceReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Metric", "Value"]);

    let termination = match result.final_status.failure() {
        Some(failure) => format!("{} ({failure})", report.termination),
        None => report.termination.clone(),
    };

    let rows: Vec<(&str, String)> = vec![
        ("Run ID", result.run_id.to_string()),
        ("Termination", termination),
        ("Days processed", report.days_processed.to_string()),
        ("Initial capital", report.initial_capital.round_dp(2).to_string()),
        ("Final NAV", report.final_nav.round_dp(2).to_string()),
        ("Cumulative PnL", report.cumulative_pnl.round_dp(2).to_string()),
        ("Total return %", report.total_return_pct.round_dp(2).to_string()),
        ("Max drawdown %", report.max_drawdown_pct.round_dp(2).to_string()),
        ("Sharpe (daily)", opt(report.sharpe_ratio)),
        ("Sharpe (annualised)", opt(report.annualized_sharpe)),
        ("Profit factor", opt(report.profit_factor)),
        ("Win rate %", opt(report.win_rate_pct)),
        ("Trades", report.total_trades.to_string()),
        ("Liquidation trades", report.liquidation_trades.to_string()),
        ("Decisions accepted", report.decisions_accepted.to_string()),
        ("Decisions rejected", report.decisions_rejected.to_string()),
        ("Strategy failure days", report.strategy_failure_days.to_string()),
        ("Total costs", report.total_costs.round_dp(2).to_string()),
        ("Fingerprint", result.fingerprint()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    println!("{table}");
}

fn print_attribution(report: &analytics::PerformanceReport) {
    if report.attribution.is_empty() {
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Agent", "Trades", "Closes", "Wins", "Realised PnL", "Costs"]);
    for (agent, a) in &report.attribution {
        table.add_row(vec![
            Cell::new(agent),
            Cell::new(a.trades),
            Cell::new(a.closing_trades),
            Cell::new(a.wins),
            Cell::new(a.realized_pnl.round_dp(2)),
            Cell::new(a.costs.round_dp(2)),
        ]);
    }
    println!("{table}");
}
