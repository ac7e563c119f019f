//! Common types for the ledger environment abstraction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, service-assigned wallet identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub String);

impl WalletId {
    /// Creates a WalletId from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated identifier of the wallet owner.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Creates a new random UserId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a deterministic UserId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One side of a two-wallet transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Debit,
    Credit,
}

impl Leg {
    /// Returns the path segment used by the service for this leg.
    pub fn name(&self) -> &'static str {
        match self {
            Leg::Debit => "debit",
            Leg::Credit => "credit",
        }
    }
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Every remote operation the harness issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateWallet,
    Debit,
    Credit,
    ReadBalance,
}

impl From<Leg> for Operation {
    fn from(leg: Leg) -> Self {
        match leg {
            Leg::Debit => Operation::Debit,
            Leg::Credit => Operation::Credit,
        }
    }
}

/// Body of `POST /wallets`.
///
/// The balance travels as a decimal string to preserve precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWallet {
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub user_id: UserId,
}

impl NewWallet {
    /// Creates a wallet request for the given owner.
    pub fn new(balance: Decimal, user_id: UserId) -> Self {
        Self { balance, user_id }
    }
}

/// Body of `POST /wallets/{id}/debit` and `POST /wallets/{id}/credit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

impl AmountRequest {
    pub fn new(amount: Decimal) -> Self {
        Self { amount }
    }
}
