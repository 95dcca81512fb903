//! Populations and their extant ancestor sets.

use hashbrown::HashMap;
use rand::Rng;

use crate::util::exponential_deviate;

/// User-facing configuration of one population.
///
/// `initial_size` is relative to the reference population size; the size at
/// time `t` is `initial_size * exp(-growth_rate * (t - start_time))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationConfiguration {
    pub initial_size: f64,
    pub growth_rate: f64,
}

impl Default for PopulationConfiguration {
    fn default() -> Self {
        Self {
            initial_size: 1.0,
            growth_rate: 0.0,
        }
    }
}

/// The set of chain-head segment ids extant in one population.
///
/// A vector plus a position map gives O(1) insertion, removal, and uniform
/// random choice, which is all the event engine needs.
#[derive(Default)]
pub(crate) struct AncestorSet {
    members: Vec<u32>,
    positions: HashMap<u32, usize>,
}

impl AncestorSet {
    pub fn insert(&mut self, head: u32) {
        debug_assert!(!self.positions.contains_key(&head));
        self.positions.insert(head, self.members.len());
        self.members.push(head);
    }

    pub fn remove(&mut self, head: u32) -> bool {
        match self.positions.remove(&head) {
            Some(pos) => {
                self.members.swap_remove(pos);
                if pos < self.members.len() {
                    self.positions.insert(self.members[pos], pos);
                }
                true
            }
            None => false,
        }
    }

    pub fn choose<R: Rng>(&self, rng: &mut R) -> Option<u32> {
        if self.members.is_empty() {
            None
        } else {
            Some(self.members[rng.gen_range(0..self.members.len())])
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.members
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.positions.clear();
    }
}

pub(crate) struct Population {
    pub initial_size: f64,
    pub growth_rate: f64,
    pub start_time: f64,
    pub ancestors: AncestorSet,
}

impl Population {
    pub fn new(config: PopulationConfiguration) -> Self {
        Self {
            initial_size: config.initial_size,
            growth_rate: config.growth_rate,
            start_time: 0.0,
            ancestors: AncestorSet::default(),
        }
    }

    pub fn size_at(&self, time: f64) -> f64 {
        self.initial_size * (-self.growth_rate * (time - self.start_time)).exp()
    }

    /// Waiting time until the next common-ancestor event, given the
    /// size-free event rate `lambda`.
    ///
    /// An exponential deviate is rescaled by the population size; under
    /// exponential growth the rescaling is the usual log time change, and
    /// a shrinking total rate can push the event to infinity.
    pub fn common_ancestor_waiting_time<R: Rng>(
        &self,
        lambda: f64,
        time: f64,
        rng: &mut R,
    ) -> f64 {
        if lambda <= 0.0 {
            return f64::INFINITY;
        }
        let u = exponential_deviate(rng, lambda);
        if self.growth_rate == 0.0 {
            self.initial_size * u
        } else {
            let dt = time - self.start_time;
            let z = 1.0 + self.growth_rate * self.initial_size * (-self.growth_rate * dt).exp() * u;
            if z > 0.0 {
                z.ln() / self.growth_rate
            } else {
                f64::INFINITY
            }
        }
    }
}
