//! Fault scenarios for the simulated ledger.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// SIM-001: Fault-free run with hand-checkable totals
    Baseline,
    
    /// SIM-002: Random non-connection failures on every leg
    FlakyBackend,
    
    /// SIM-003: Random connection exhaustion on every leg
    ConnectionStorm,
    
    /// SIM-004: Five-decimal random amounts under light faults
    RandomAmounts,
    
    /// SIM-005: 1×N and N×1 worker layouts reach the same verdict
    Isolation,
    
    /// SIM-006: Some wallet creations fail
    ProvisioningLoss,
    
    // ═══════════════════════════════════════════════════
    // LIVENESS AND DETECTION SCENARIOS
    // ═══════════════════════════════════════════════════
    
    /// SIM-007: Permanent debit failure with unbounded retry
    StuckDebit,
    
    /// SIM-008: Permanent debit failure with bounded retry
    BoundedRetries,
    
    /// SIM-009: A debit applied twice must be caught
    LostAck,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::FlakyBackend,
            ScenarioId::ConnectionStorm,
            ScenarioId::RandomAmounts,
            ScenarioId::Isolation,
            ScenarioId::ProvisioningLoss,
            // Liveness / detection
            ScenarioId::StuckDebit,
            ScenarioId::BoundedRetries,
            ScenarioId::LostAck,
        ]
    }
    
    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::FlakyBackend => "flaky_backend",
            ScenarioId::ConnectionStorm => "connection_storm",
            ScenarioId::RandomAmounts => "random_amounts",
            ScenarioId::Isolation => "isolation",
            ScenarioId::ProvisioningLoss => "provisioning_loss",
            ScenarioId::StuckDebit => "stuck_debit",
            ScenarioId::BoundedRetries => "bounded_retries",
            ScenarioId::LostAck => "lost_ack",
        }
    }
    
    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "3 wallets × 100, 2 workers × 5 transfers of 10.00, total stays 300.00",
            ScenarioId::FlakyBackend => "30% of legs fail with 503, every leg retried until it lands",
            ScenarioId::ConnectionStorm => "50% of legs lose their connection, counted as aborted",
            ScenarioId::RandomAmounts => "Amounts in [1.00000, 10.00000] reconciled at 5 decimals",
            ScenarioId::Isolation => "1 worker × N vs N workers × 1, same legs, same total",
            ScenarioId::ProvisioningLoss => "2 of 10 creations fail, expected total counts survivors only",
            ScenarioId::StuckDebit => "Debits fail forever, run must not reach reconciliation",
            ScenarioId::BoundedRetries => "Debits fail forever, capped retries abandon them, books balance",
            ScenarioId::LostAck => "A debit is applied but reported failed, reconciliation must object",
        }
    }
    
    /// Returns true if the scenario expects the run not to conserve or not to finish.
    pub fn expects_failure(&self) -> bool {
        matches!(self, ScenarioId::StuckDebit | ScenarioId::LostAck)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "sim-001" => Ok(ScenarioId::Baseline),
            "flaky_backend" | "flakybackend" | "sim-002" => Ok(ScenarioId::FlakyBackend),
            "connection_storm" | "connectionstorm" | "sim-003" => Ok(ScenarioId::ConnectionStorm),
            "random_amounts" | "randomamounts" | "sim-004" => Ok(ScenarioId::RandomAmounts),
            "isolation" | "sim-005" => Ok(ScenarioId::Isolation),
            "provisioning_loss" | "provisioningloss" | "sim-006" => Ok(ScenarioId::ProvisioningLoss),
            "stuck_debit" | "stuckdebit" | "sim-007" => Ok(ScenarioId::StuckDebit),
            "bounded_retries" | "boundedretries" | "sim-008" => Ok(ScenarioId::BoundedRetries),
            "lost_ack" | "lostack" | "sim-009" => Ok(ScenarioId::LostAck),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_names_round_trip() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
        }
    }
    
    #[test]
    fn test_aliases() {
        assert_eq!("SIM-009".parse::<ScenarioId>(), Ok(ScenarioId::LostAck));
        assert_eq!("StuckDebit".parse::<ScenarioId>(), Ok(ScenarioId::StuckDebit));
        assert!("chaos".parse::<ScenarioId>().is_err());
    }
}
