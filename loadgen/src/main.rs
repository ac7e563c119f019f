//! Ledger Load Generator CLI
//!
//! Drives a live wallet ledger service with concurrent debit/credit pairs and
//! fails (exit status 1) if the total balance is not conserved.

use anyhow::{Context, Result};
use clap::Parser;
use ledger_core::{
    AmountMode, BackoffPolicy, Environment, HarnessConfig, HarnessError, HttpConfig, HttpWalletService,
    LoadHarness, RunReport,
};
use ledger_env::TokioContext;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Wallet ledger conservation load test
#[derive(Parser, Debug)]
#[command(name = "ledger-loadgen")]
#[command(about = "Run concurrent transfers against a wallet ledger and check the total balance", long_about = None)]
struct Args {
    /// Concurrent workers
    #[arg(short = 't', long, default_value = "10")]
    num_threads: usize,
    
    /// Wallets to create
    #[arg(short = 'w', long, default_value = "100")]
    num_wallets: usize,
    
    /// Starting balance of every wallet
    #[arg(short = 'b', long, default_value = "1000.0")]
    initial_balance: Decimal,
    
    /// Transfers per worker
    #[arg(short = 'n', long, default_value = "1000")]
    num_iters: u64,
    
    /// Target environment (local, docker)
    #[arg(short, long, default_value = "local")]
    env: Environment,
    
    /// Service root; overrides --env
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,
    
    /// Draw amounts uniformly from [1.00000, 10.00000] instead of a fixed 10.00
    #[arg(long)]
    random_amounts: bool,
    
    /// Give up on a leg after this many attempts (default: retry forever)
    #[arg(long)]
    max_retries: Option<u32>,
    
    /// First backoff delay
    #[arg(long, default_value = "100")]
    base_delay_ms: u64,
    
    /// Backoff cap
    #[arg(long, default_value = "10000")]
    max_delay_ms: u64,
    
    /// Per-request timeout
    #[arg(long, default_value = "30000")]
    request_timeout_ms: u64,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            workers: self.num_threads,
            wallets: self.num_wallets,
            initial_balance: self.initial_balance,
            iterations: self.num_iters,
            amount_mode: if self.random_amounts { AmountMode::Random } else { AmountMode::Fixed },
            backoff: BackoffPolicy::default()
                .with_base_delay(Duration::from_millis(self.base_delay_ms))
                .with_max_delay(Duration::from_millis(self.max_delay_ms))
                .with_max_attempts(self.max_retries),
        }
    }
    
    fn http_config(&self) -> HttpConfig {
        HttpConfig::resolve(self.env, self.base_url.as_deref())
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_pool_size(self.num_threads.max(1))
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &RunReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report).context("encoding run report")?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    
    let http = args.http_config();
    info!("Ledger service: {}", http.base_url);
    
    let service = Arc::new(HttpWalletService::new(&http)?);
    let harness = LoadHarness::new(TokioContext::shared(), service, args.harness_config());
    
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.num_threads.max(1))
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    
    match runtime.block_on(harness.run()) {
        Ok(report) => {
            if args.json {
                print_report(&report)?;
            }
            Ok(())
        }
        // Already logged with both totals by the reconciler
        Err(HarnessError::BalanceMismatch { report, .. }) => {
            if args.json {
                print_report(&report)?;
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
