//! Ledger Harness Deterministic Simulation
//!
//! This crate provides a controlled stand-in for the wallet ledger service,
//! so the whole harness can run without a network and be checked against
//! ground truth.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when a worker backs off
//! - **Service**: In-memory ledger with scripted and random faults
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ current-thread tokio runtime + SimContext clock      │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                        │                            │
//! │  ┌────▼────┐              ┌────▼────┐                       │
//! │  │ Worker  │     ...      │ Worker  │   (LoadHarness)       │
//! │  │   #0    │              │  #T-1   │                       │
//! │  └────┬────┘              └────┬────┘                       │
//! │       │   WalletService        │                            │
//! │  ┌────▼────────────────────────▼────┐   ┌───────────────┐   │
//! │  │            SimLedger              │◄──│ FaultControl  │   │
//! │  │  (ground truth balances)          │   └───────────────┘   │
//! │  └───────────────────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ledger_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::FlakyBackend);
//! assert!(result.passed);
//! ```

mod context;
mod faults;
mod ledger;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use faults::{SimFaultController, Verdict};
pub use ledger::{SimLedger, SimWallet};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
