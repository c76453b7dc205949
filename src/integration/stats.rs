//! Solve counters
//!
//! Reaching the CCMA iteration cap is not an error. These counters are where
//! a caller can notice it happening.

use super::ccma::CcmaOutcome;

/// Running totals over the lifetime of an engine (or since the last reset)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintStats {
    /// `apply_constraints` calls
    pub apply_calls: u64,
    /// Matrix-coupled solves run
    pub ccma_solves: u64,
    /// Matrix-coupled solves that hit the iteration cap
    pub unconverged_solves: u64,
    /// CCMA iterations summed over all solves
    pub ccma_iterations: u64,
    /// Host synchronization checkpoints summed over all solves
    pub sync_checkpoints: u64,
    /// Virtual-site force redistribution launches
    pub vsite_redistributions: u64,
    /// Outcome of the most recent matrix-coupled solve
    pub last_ccma: Option<CcmaOutcome>,
}

impl ConstraintStats {
    pub(crate) fn record_ccma(&mut self, outcome: CcmaOutcome) {
        self.ccma_solves += 1;
        self.ccma_iterations += outcome.iterations as u64;
        self.sync_checkpoints += outcome.checkpoints as u64;
        if !outcome.converged {
            self.unconverged_solves += 1;
        }
        self.last_ccma = Some(outcome);
    }

    /// Fraction of matrix-coupled solves that converged (1.0 when none ran)
    pub fn convergence_rate(&self) -> f64 {
        if self.ccma_solves == 0 {
            return 1.0;
        }
        (self.ccma_solves - self.unconverged_solves) as f64 / self.ccma_solves as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ccma_accumulates() {
        let mut stats = ConstraintStats::default();
        assert_eq!(stats.convergence_rate(), 1.0);

        stats.record_ccma(CcmaOutcome {
            iterations: 12,
            checkpoints: 3,
            converged: true,
        });
        stats.record_ccma(CcmaOutcome {
            iterations: 150,
            checkpoints: 37,
            converged: false,
        });

        assert_eq!(stats.ccma_solves, 2);
        assert_eq!(stats.unconverged_solves, 1);
        assert_eq!(stats.ccma_iterations, 162);
        assert_eq!(stats.sync_checkpoints, 40);
        assert_eq!(stats.convergence_rate(), 0.5);
        assert!(!stats.last_ccma.unwrap().converged);
    }
}
