//! Ledger Harness Core - concurrent conservation-invariant verification
//!
//! This library drives a remote wallet ledger with concurrent random
//! transfers and then proves that no money was created or destroyed:
//! 1. **Provisioning**: N wallets with a known starting balance
//! 2. **Load**: T workers, each running I debit/credit pairs with retry + backoff
//! 3. **Reconciliation**: sum of all balances must equal the starting sum

pub mod amount;
pub mod backoff;
pub mod config;
pub mod executor;
pub mod harness;
pub mod http;
pub mod metrics;
pub mod provisioner;
pub mod reconciler;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use amount::AmountMode;
pub use backoff::BackoffPolicy;
pub use config::{ConfigError, Environment, HarnessConfig, HttpConfig};
pub use executor::{LegError, LegOutcome, Transfer, TransferExecutor};
pub use harness::{HarnessError, LoadHarness, RunReport};
pub use http::HttpWalletService;
pub use metrics::{aggregate, RunTotals, WorkerResult};
pub use provisioner::{Provisioned, Provisioner};
pub use reconciler::{quantize, ReconcileError, Reconciler, Reconciliation};
pub use worker::{sample_pair, Worker};
