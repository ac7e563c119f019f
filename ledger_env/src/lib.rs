//! Ledger Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the load harness
//! to run against both a **Production** ledger (tokio + HTTP) and a
//! **Simulated** one (virtual clock + in-memory ledger).
//!
//! # Core Concept
//!
//! Everything the harness touches outside its own memory goes through a trait:
//! - Time (`now()`, `sleep()`)
//! - Randomness (`worker_rng()`, `derive_user_id()`)
//! - The remote ledger (`create_wallet()`, `debit()`, `credit()`, `balance()`)
//!
//! By deriving all simulated entropy from a single 64-bit seed, any failing
//! run becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use ledger_env::{LedgerContext, WalletService, Leg};
//!
//! async fn one_leg<Ctx: LedgerContext, Svc: WalletService>(
//!     ctx: &Ctx,
//!     svc: &Svc,
//!     wallet: &WalletId,
//! ) {
//!     while svc.apply(Leg::Debit, wallet, amount).await.is_err() {
//!         ctx.sleep(Duration::from_millis(100)).await;
//!     }
//! }
//! ```

mod context;
mod service;
mod types;
mod error;
mod tokio_impl;

pub use context::LedgerContext;
pub use service::{WalletService, FaultInjector};
pub use types::{WalletId, UserId, Leg, Operation, NewWallet, AmountRequest};
pub use error::{ServiceError, FailureKind};
pub use tokio_impl::TokioContext;
