//! The bijection between genetic (locus) and physical coordinates.
//!
//! The simulator works in a discrete genetic space of `num_loci` loci;
//! emitted records are mapped into physical coordinates through a
//! piecewise-constant recombination rate map.

use crate::CoalseqError;

pub struct RecombinationMap {
    num_loci: u32,
    positions: Vec<f64>,
    rates: Vec<f64>,
    cumulative: Vec<f64>,
    total_mass: f64,
}

impl RecombinationMap {
    /// `positions` must start at 0, strictly increase, and end at the
    /// physical sequence length; `rates[i]` applies on
    /// `[positions[i], positions[i + 1])` and the final rate is unused.
    pub fn new(num_loci: u32, positions: &[f64], rates: &[f64]) -> Result<Self, CoalseqError> {
        if num_loci < 1 {
            return Err(value_error!(num_loci, "num_loci >= 1"));
        }
        if positions.len() < 2 || positions.len() != rates.len() {
            return Err(value_error!(
                positions.len(),
                "positions and rates of equal length >= 2"
            ));
        }
        if positions[0] != 0.0 {
            return Err(value_error!(positions[0], "positions[0] == 0"));
        }
        for w in positions.windows(2) {
            if !(w[1] > w[0]) {
                return Err(value_error!(w[1], "strictly increasing positions"));
            }
        }
        for r in rates {
            if !(r.is_finite() && *r >= 0.0) {
                return Err(value_error!(r, "a finite rate >= 0"));
            }
        }
        let mut cumulative = Vec::with_capacity(positions.len());
        let mut mass = 0.0;
        for (i, p) in positions.iter().enumerate() {
            if i > 0 {
                mass += rates[i - 1] * (p - positions[i - 1]);
            }
            cumulative.push(mass);
        }
        Ok(Self {
            num_loci,
            positions: positions.to_vec(),
            rates: rates.to_vec(),
            cumulative,
            total_mass: mass,
        })
    }

    /// A map with a single uniform rate over `[0, sequence_length)`.
    pub fn uniform(
        num_loci: u32,
        sequence_length: f64,
        rate: f64,
    ) -> Result<Self, CoalseqError> {
        if !(sequence_length > 0.0 && sequence_length.is_finite()) {
            return Err(value_error!(sequence_length, "a finite length > 0"));
        }
        Self::new(num_loci, &[0.0, sequence_length], &[rate, 0.0])
    }

    pub fn num_loci(&self) -> u32 {
        self.num_loci
    }

    pub fn sequence_length(&self) -> f64 {
        *self.positions.last().unwrap_or(&0.0)
    }

    pub fn total_recombination_rate(&self) -> f64 {
        self.total_mass
    }

    /// The scaled recombination rate between adjacent loci implied by the
    /// map; zero for a single locus.
    pub fn per_locus_recombination_rate(&self) -> f64 {
        if self.num_loci > 1 {
            self.total_mass / (self.num_loci as f64 - 1.0)
        } else {
            0.0
        }
    }

    /// Map a genetic coordinate in `[0, num_loci]` to a physical position.
    ///
    /// Genetic distance is proportional to recombination mass; a map with
    /// zero total rate degenerates to linear scaling.
    pub fn genetic_to_physical(&self, genetic: f64) -> f64 {
        let length = self.sequence_length();
        if self.total_mass == 0.0 {
            return genetic / self.num_loci as f64 * length;
        }
        let mass = genetic / self.num_loci as f64 * self.total_mass;
        let i = match self
            .cumulative
            .iter()
            .rposition(|c| *c <= mass)
        {
            Some(i) => i,
            None => 0,
        };
        if i + 1 >= self.positions.len() {
            return length;
        }
        if self.rates[i] == 0.0 {
            return self.positions[i];
        }
        self.positions[i] + (mass - self.cumulative[i]) / self.rates[i]
    }

    /// The inverse of [`RecombinationMap::genetic_to_physical`].
    pub fn physical_to_genetic(&self, physical: f64) -> f64 {
        let length = self.sequence_length();
        if self.total_mass == 0.0 {
            return physical / length * self.num_loci as f64;
        }
        let i = match self.positions.iter().rposition(|p| *p <= physical) {
            Some(i) => i,
            None => 0,
        };
        let mass = if i + 1 >= self.positions.len() {
            self.total_mass
        } else {
            self.cumulative[i] + self.rates[i] * (physical - self.positions[i])
        };
        mass / self.total_mass * self.num_loci as f64
    }
}
