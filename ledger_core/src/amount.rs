//! Transfer amounts.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fixed transfer amount: 10.00
pub const FIXED_AMOUNT: Decimal = Decimal::from_parts(1000, 0, 0, false, 2);

/// Lower bound of a random amount: 1.00000
pub const RANDOM_MIN: Decimal = Decimal::from_parts(100_000, 0, 0, false, 5);

/// Upper bound of a random amount: 10.00000
pub const RANDOM_MAX: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 5);

/// How each iteration picks the amount moved between two wallets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountMode {
    /// Always 10.00
    #[default]
    Fixed,
    
    /// Uniform in [1.0, 10.0] with five fractional digits
    Random,
}

impl AmountMode {
    /// Number of fractional digits amounts (and reconciled totals) carry.
    pub fn scale(&self) -> u32 {
        match self {
            AmountMode::Fixed => 2,
            AmountMode::Random => 5,
        }
    }
    
    /// Draws the amount for one transfer.
    ///
    /// Random amounts are drawn as integer multiples of 10^-5, so every
    /// representable value in range is equally likely and no binary float
    /// is involved.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Decimal {
        match self {
            AmountMode::Fixed => FIXED_AMOUNT,
            AmountMode::Random => {
                let units = rng.gen_range(RANDOM_MIN.mantissa()..=RANDOM_MAX.mantissa());
                Decimal::from_i128_with_scale(units, self.scale())
            }
        }
    }
}

impl std::fmt::Display for AmountMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmountMode::Fixed => write!(f, "fixed ({})", FIXED_AMOUNT),
            AmountMode::Random => write!(f, "random [{}, {}]", RANDOM_MIN, RANDOM_MAX),
        }
    }
}
