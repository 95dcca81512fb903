//! Simulation models: the rule by which common-ancestor events are
//! accepted and how many lineages they merge.

use crate::CoalseqError;

/// The common-ancestor rule used by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimulationModel {
    /// The standard coalescent with recombination.
    Hudson,
    /// Sequentially Markov coalescent: a sampled pair must share
    /// overlapping ancestral material.
    Smc,
    /// SMC': overlapping or abutting ancestral material.
    SmcPrime,
    /// Beta(alpha, truncation) multiple-merger coalescent.
    Beta { alpha: f64, truncation_point: f64 },
    /// Dirac(psi, c) multiple-merger coalescent.
    Dirac { psi: f64, c: f64 },
}

impl Default for SimulationModel {
    fn default() -> Self {
        Self::Hudson
    }
}

impl SimulationModel {
    pub fn name(&self) -> &'static str {
        match self {
            SimulationModel::Hudson => "hudson",
            SimulationModel::Smc => "smc",
            SimulationModel::SmcPrime => "smc_prime",
            SimulationModel::Beta { .. } => "beta",
            SimulationModel::Dirac { .. } => "dirac",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), CoalseqError> {
        match *self {
            SimulationModel::Hudson | SimulationModel::Smc | SimulationModel::SmcPrime => Ok(()),
            SimulationModel::Beta {
                alpha,
                truncation_point,
            } => {
                if !(alpha > 1.0 && alpha < 2.0) {
                    return Err(CoalseqError::ModelError(format!(
                        "beta coalescent requires 1 < alpha < 2, got {}",
                        alpha
                    )));
                }
                if !(truncation_point > 0.0 && truncation_point <= 1.0) {
                    return Err(CoalseqError::ModelError(format!(
                        "beta coalescent requires 0 < truncation_point <= 1, got {}",
                        truncation_point
                    )));
                }
                Ok(())
            }
            SimulationModel::Dirac { psi, c } => {
                if !(psi > 0.0 && psi <= 1.0) {
                    return Err(CoalseqError::ModelError(format!(
                        "dirac coalescent requires 0 < psi <= 1, got {}",
                        psi
                    )));
                }
                if !(c >= 0.0 && c.is_finite()) {
                    return Err(CoalseqError::ModelError(format!(
                        "dirac coalescent requires a finite c >= 0, got {}",
                        c
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(SimulationModel::default().name(), "hudson");
        assert_eq!(SimulationModel::SmcPrime.name(), "smc_prime");
    }

    #[test]
    fn test_beta_validation() {
        assert!(SimulationModel::Beta {
            alpha: 1.5,
            truncation_point: 1.0
        }
        .validate()
        .is_ok());
        assert!(SimulationModel::Beta {
            alpha: 2.0,
            truncation_point: 1.0
        }
        .validate()
        .is_err());
        assert!(SimulationModel::Beta {
            alpha: 1.5,
            truncation_point: 0.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_dirac_validation() {
        assert!(SimulationModel::Dirac { psi: 0.3, c: 1.0 }.validate().is_ok());
        assert!(SimulationModel::Dirac { psi: 0.0, c: 1.0 }.validate().is_err());
        assert!(SimulationModel::Dirac { psi: 0.5, c: -1.0 }
            .validate()
            .is_err());
    }
}
