//! Ledger Harness Metrics Module
//! =============================
//!
//! Per-worker outcome counters and their aggregation:
//! - **WorkerResult**: owned by exactly one worker for its whole lifetime
//! - **RunTotals**: element-wise sum, computed once after every worker joined
//!
//! Workers never share counters; totals are never written concurrently.

use ledger_env::{FailureKind, Leg};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Outcome counters private to one worker.
///
/// `failed_*` and `aborted_connections` count failed *attempts*, not legs:
/// a leg that needs three tries before succeeding adds two failures and one
/// success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Debit legs that reached a terminal success
    pub successful_debits: u64,
    /// Debit attempts that failed for a non-connection reason
    pub failed_debits: u64,
    /// Credit legs that reached a terminal success
    pub successful_credits: u64,
    /// Credit attempts that failed for a non-connection reason
    pub failed_credits: u64,
    /// Attempts (either leg) that failed with connection exhaustion
    pub aborted_connections: u64,
    /// Legs given up on by a bounded backoff policy
    pub abandoned_legs: u64,
}

impl WorkerResult {
    /// Creates an all-zero result.
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Records a terminal success for `leg`.
    pub fn record_success(&mut self, leg: Leg) {
        match leg {
            Leg::Debit => self.successful_debits += 1,
            Leg::Credit => self.successful_credits += 1,
        }
    }
    
    /// Records one failed attempt of `leg`.
    pub fn record_failure(&mut self, leg: Leg, kind: FailureKind) {
        match (kind, leg) {
            (FailureKind::ConnectionExhausted, _) => self.aborted_connections += 1,
            (FailureKind::Other, Leg::Debit) => self.failed_debits += 1,
            (FailureKind::Other, Leg::Credit) => self.failed_credits += 1,
        }
    }
    
    /// Records a leg abandoned after its retry budget ran out.
    pub fn record_abandoned(&mut self) {
        self.abandoned_legs += 1;
    }
    
    /// Total failed attempts of either kind.
    pub fn failed_attempts(&self) -> u64 {
        self.failed_debits + self.failed_credits + self.aborted_connections
    }
}

impl AddAssign for WorkerResult {
    fn add_assign(&mut self, other: Self) {
        self.successful_debits += other.successful_debits;
        self.failed_debits += other.failed_debits;
        self.successful_credits += other.successful_credits;
        self.failed_credits += other.failed_credits;
        self.aborted_connections += other.aborted_connections;
        self.abandoned_legs += other.abandoned_legs;
    }
}

impl Add for WorkerResult {
    type Output = Self;
    
    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Sum for WorkerResult {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a WorkerResult> for WorkerResult {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Counters summed over every worker of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Number of worker results folded in
    pub workers: usize,
    
    /// Element-wise sum of all worker counters
    #[serde(flatten)]
    pub counters: WorkerResult,
}

impl RunTotals {
    /// Legs that reached a terminal success, both directions.
    pub fn completed_legs(&self) -> u64 {
        self.counters.successful_debits + self.counters.successful_credits
    }
}

/// Sums per-worker results after the join barrier.
///
/// Pure: no I/O, no shared state.
pub fn aggregate(results: &[WorkerResult]) -> RunTotals {
    RunTotals {
        workers: results.len(),
        counters: results.iter().sum(),
    }
}
