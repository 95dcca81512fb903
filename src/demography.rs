//! Scheduled demographic and sampling events.

use rand::Rng;

use crate::newtypes::{NodeId, PopulationId};
use crate::simulator::Simulator;
use crate::CoalseqError;

/// A demographic event scheduled at a fixed time.
///
/// Events registered at equal times execute in registration order; a
/// scheduled event always preempts a stochastic event drawn at or after
/// its time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DemographicEvent {
    /// Reset population size and/or growth rate. A `None` population
    /// applies to every population; a `None` parameter keeps the value in
    /// force at the event time.
    PopulationParametersChange {
        population: Option<PopulationId>,
        initial_size: Option<f64>,
        growth_rate: Option<f64>,
    },
    /// Set one entry of the migration matrix, or every off-diagonal entry
    /// when `index` is `None`.
    MigrationRateChange {
        index: Option<(usize, usize)>,
        rate: f64,
    },
    /// Move each lineage of `source` to `dest` independently with
    /// probability `proportion`.
    MassMigration {
        source: PopulationId,
        dest: PopulationId,
        proportion: f64,
    },
    /// Each lineage of the population participates with probability
    /// `proportion`; the participants merge into a single ancestor.
    SimpleBottleneck {
        population: PopulationId,
        proportion: f64,
    },
    /// Run a classical coalescent of total duration `strength` within the
    /// population, instantaneously at the event time.
    InstantaneousBottleneck {
        population: PopulationId,
        strength: f64,
    },
}

impl DemographicEvent {
    pub(crate) fn apply<R: Rng>(
        &self,
        sim: &mut Simulator<R>,
        time: f64,
    ) -> Result<(), CoalseqError> {
        match *self {
            DemographicEvent::PopulationParametersChange {
                population,
                initial_size,
                growth_rate,
            } => sim.apply_population_parameters_change(population, initial_size, growth_rate, time),
            DemographicEvent::MigrationRateChange { index, rate } => {
                sim.apply_migration_rate_change(index, rate)
            }
            DemographicEvent::MassMigration {
                source,
                dest,
                proportion,
            } => sim.apply_mass_migration(source, dest, proportion),
            DemographicEvent::SimpleBottleneck {
                population,
                proportion,
            } => sim.apply_simple_bottleneck(population, proportion),
            DemographicEvent::InstantaneousBottleneck {
                population,
                strength,
            } => sim.apply_instantaneous_bottleneck(population, strength),
        }
    }

    /// Configuration-time validation against the final population count.
    pub(crate) fn validate(&self, num_populations: usize) -> Result<(), CoalseqError> {
        let check_pop = |p: PopulationId| -> Result<(), CoalseqError> {
            match p.to_usize() {
                Some(i) if i < num_populations => Ok(()),
                _ => Err(CoalseqError::DemographyError(format!(
                    "event references population {} of {}",
                    p, num_populations
                ))),
            }
        };
        match *self {
            DemographicEvent::PopulationParametersChange {
                population,
                initial_size,
                growth_rate,
            } => {
                if let Some(p) = population {
                    check_pop(p)?;
                }
                if let Some(s) = initial_size {
                    if !(s > 0.0 && s.is_finite()) {
                        return Err(CoalseqError::DemographyError(format!(
                            "population size change to {}",
                            s
                        )));
                    }
                }
                if let Some(g) = growth_rate {
                    if !g.is_finite() {
                        return Err(CoalseqError::DemographyError(
                            "non-finite growth rate".to_string(),
                        ));
                    }
                }
                Ok(())
            }
            DemographicEvent::MigrationRateChange { index, rate } => {
                if !(rate >= 0.0 && rate.is_finite()) {
                    return Err(CoalseqError::DemographyError(format!(
                        "migration rate change to {}",
                        rate
                    )));
                }
                if let Some((i, j)) = index {
                    if i == j || i >= num_populations || j >= num_populations {
                        return Err(CoalseqError::DemographyError(format!(
                            "migration matrix index ({}, {})",
                            i, j
                        )));
                    }
                }
                Ok(())
            }
            DemographicEvent::MassMigration {
                source,
                dest,
                proportion,
            } => {
                check_pop(source)?;
                check_pop(dest)?;
                if source == dest {
                    return Err(CoalseqError::DemographyError(
                        "mass migration with source == dest".to_string(),
                    ));
                }
                check_proportion(proportion)
            }
            DemographicEvent::SimpleBottleneck {
                population,
                proportion,
            } => {
                check_pop(population)?;
                check_proportion(proportion)
            }
            DemographicEvent::InstantaneousBottleneck {
                population,
                strength,
            } => {
                check_pop(population)?;
                if !(strength >= 0.0 && strength.is_finite()) {
                    return Err(CoalseqError::DemographyError(format!(
                        "bottleneck strength {}",
                        strength
                    )));
                }
                Ok(())
            }
        }
    }
}

fn check_proportion(proportion: f64) -> Result<(), CoalseqError> {
    if (0.0..=1.0).contains(&proportion) {
        Ok(())
    } else {
        Err(CoalseqError::DemographyError(format!(
            "proportion {} outside [0, 1]",
            proportion
        )))
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ScheduledEvent {
    pub time: f64,
    pub event: DemographicEvent,
}

/// A sample entering the simulation at a time greater than zero.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SamplingEvent {
    pub time: f64,
    pub sample: NodeId,
    pub population: PopulationId,
}
