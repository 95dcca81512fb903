//! The event engine: a backward-time simulation of coalescence,
//! recombination, and migration over segmented ancestral lineages.
//!
//! State lives in four structures that the events mutate together: the
//! segment arena (lineage chains), the per-population ancestor sets, the
//! overlap-count index (how many lineages still carry each stretch of
//! ancestral material), and the links Fenwick tree (how many positions
//! could split each chain). Node, edge, and migration records accumulate
//! in flat arrays and are emitted through a recombination map by
//! [`Simulator::populate_tables`].

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::demography::{DemographicEvent, SamplingEvent, ScheduledEvent};
use crate::edge_table::EdgeTable;
use crate::fenwick::Fenwick;
use crate::flags::NodeFlags;
use crate::migration_table::MigrationTable;
use crate::model::SimulationModel;
use crate::newtypes::{NodeId, PopulationId};
use crate::node_table::NodeTable;
use crate::population::{Population, PopulationConfiguration};
use crate::recomb_map::RecombinationMap;
use crate::segment::{SegmentArena, NULL_SEGMENT};
use crate::util::exponential_deviate;
use crate::CoalseqError;

const DEFAULT_BLOCK_SIZE: usize = 1024;
const OVERLAP_SENTINEL: u32 = u32::MAX;
const BETA_REJECTION_LIMIT: usize = 1000;

/// A sampled chromosome: the population it is drawn from and the time at
/// which it enters the simulation (usually zero).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub population: PopulationId,
    pub time: f64,
}

impl Sample {
    pub fn new<P: Into<PopulationId>>(population: P, time: f64) -> Self {
        Self {
            population: population.into(),
            time,
        }
    }
}

/// Why [`Simulator::run`] returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunStatus {
    /// All ancestral material reached its most recent common ancestor.
    Coalesced,
    /// The next event would fall beyond `max_time`.
    MaxTimeReached,
    /// `max_events` events were executed.
    MaxEventsReached,
    /// No stochastic event has positive rate and no scheduled events
    /// remain, e.g. isolated demes that can never coalesce.
    Stalled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SimulatorState {
    Configuring,
    Initialised,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug)]
struct NodeRecord {
    flags: NodeFlags,
    time: f64,
    population: PopulationId,
}

#[derive(Clone, Copy, Debug)]
struct EdgeRecord {
    left: u32,
    right: u32,
    parent: NodeId,
    child: NodeId,
}

#[derive(Clone, Copy, Debug)]
struct MigrationRecord {
    left: u32,
    right: u32,
    node: NodeId,
    source: PopulationId,
    dest: PopulationId,
    time: f64,
}

#[derive(Clone, Copy, Debug)]
enum StochasticEvent {
    Recombination,
    CommonAncestor(usize),
    Migration(usize, usize),
}

/// The coalescent simulator.
///
/// Construction follows the configure/initialise/run lifecycle: create
/// with the sample layout and a random source, apply setters and
/// demographic-event registrations, then [`Simulator::initialise`] and
/// [`Simulator::run`] (repeatedly, to advance in bounded steps).
pub struct Simulator<R: Rng> {
    rng: R,
    /// configuration
    model: SimulationModel,
    store_migrations: bool,
    samples: Vec<Sample>,
    num_loci: u32,
    scaled_recombination_rate: f64,
    initial_populations: Vec<PopulationConfiguration>,
    initial_migration_matrix: Vec<f64>,
    segment_block_size: usize,
    node_block_size: usize,
    edge_block_size: usize,
    migration_block_size: usize,
    max_memory: usize,
    registered_events: Vec<ScheduledEvent>,
    /// counters
    num_re_events: usize,
    num_ca_events: usize,
    num_rejected_ca_events: usize,
    num_trapped_re_events: usize,
    num_multiple_re_events: usize,
    num_migration_events: Vec<usize>,
    /// scheduled-event queues
    sampling_events: Vec<SamplingEvent>,
    next_sampling_event: usize,
    demographic_events: Vec<ScheduledEvent>,
    next_demographic_event: usize,
    /// algorithm state
    state: SimulatorState,
    time: f64,
    populations: Vec<Population>,
    migration_matrix: Vec<f64>,
    breakpoints: BTreeSet<u32>,
    overlap_counts: BTreeMap<u32, u32>,
    links: Fenwick,
    segments: SegmentArena,
    /// output records
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    migrations: Vec<MigrationRecord>,
}

impl<R: Rng> Simulator<R> {
    /// Create a simulator for `samples`, owning `rng` as its random
    /// source. Defaults: one locus, one population, zero recombination
    /// and migration, the Hudson model.
    pub fn new(samples: &[Sample], rng: R) -> Result<Self, CoalseqError> {
        if samples.is_empty() {
            return Err(value_error!(samples.len(), "at least one sample"));
        }
        for s in samples {
            if !(s.time.is_finite() && s.time >= 0.0) {
                return Err(value_error!(s.time, "a finite sample time >= 0"));
            }
            if s.population.is_null() {
                return Err(value_error!(s.population, "a non-null population"));
            }
        }
        Ok(Self {
            rng,
            model: SimulationModel::default(),
            store_migrations: false,
            samples: samples.to_vec(),
            num_loci: 1,
            scaled_recombination_rate: 0.0,
            initial_populations: vec![PopulationConfiguration::default()],
            initial_migration_matrix: vec![0.0],
            segment_block_size: DEFAULT_BLOCK_SIZE,
            node_block_size: DEFAULT_BLOCK_SIZE,
            edge_block_size: DEFAULT_BLOCK_SIZE,
            migration_block_size: DEFAULT_BLOCK_SIZE,
            max_memory: usize::MAX,
            registered_events: Vec::new(),
            num_re_events: 0,
            num_ca_events: 0,
            num_rejected_ca_events: 0,
            num_trapped_re_events: 0,
            num_multiple_re_events: 0,
            num_migration_events: vec![0],
            sampling_events: Vec::new(),
            next_sampling_event: 0,
            demographic_events: Vec::new(),
            next_demographic_event: 0,
            state: SimulatorState::Configuring,
            time: 0.0,
            populations: Vec::new(),
            migration_matrix: vec![0.0],
            breakpoints: BTreeSet::new(),
            overlap_counts: BTreeMap::new(),
            links: Fenwick::new(0),
            segments: SegmentArena::with_block_size(DEFAULT_BLOCK_SIZE),
            nodes: Vec::new(),
            edges: Vec::new(),
            migrations: Vec::new(),
        })
    }

    fn check_configuring(&self) -> Result<(), CoalseqError> {
        match self.state {
            SimulatorState::Configuring => Ok(()),
            _ => Err(value_error!(
                "setter call",
                "configuration before initialise()"
            )),
        }
    }

    pub fn set_num_loci(&mut self, num_loci: u32) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if num_loci < 1 {
            return Err(value_error!(num_loci, "num_loci >= 1"));
        }
        self.num_loci = num_loci;
        Ok(())
    }

    pub fn set_scaled_recombination_rate(&mut self, rate: f64) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if !(rate.is_finite() && rate >= 0.0) {
            return Err(value_error!(rate, "a finite recombination rate >= 0"));
        }
        self.scaled_recombination_rate = rate;
        Ok(())
    }

    /// Set the number of populations, resetting the per-population
    /// configuration and the migration matrix.
    pub fn set_num_populations(&mut self, num_populations: usize) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if num_populations < 1 {
            return Err(value_error!(num_populations, "num_populations >= 1"));
        }
        self.initial_populations =
            vec![PopulationConfiguration::default(); num_populations];
        self.initial_migration_matrix = vec![0.0; num_populations * num_populations];
        Ok(())
    }

    pub fn set_population_configuration(
        &mut self,
        population: usize,
        initial_size: f64,
        growth_rate: f64,
    ) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if population >= self.initial_populations.len() {
            return Err(value_error!(population, "a configured population id"));
        }
        if !(initial_size > 0.0 && initial_size.is_finite()) {
            return Err(value_error!(initial_size, "a finite population size > 0"));
        }
        if !growth_rate.is_finite() {
            return Err(value_error!(growth_rate, "a finite growth rate"));
        }
        self.initial_populations[population] = PopulationConfiguration {
            initial_size,
            growth_rate,
        };
        Ok(())
    }

    /// Set the full migration matrix in row-major order. The diagonal
    /// must be zero.
    pub fn set_migration_matrix(&mut self, matrix: &[f64]) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        let n = self.initial_populations.len();
        if matrix.len() != n * n {
            return Err(value_error!(matrix.len(), format!("{} matrix entries", n * n)));
        }
        for (k, rate) in matrix.iter().enumerate() {
            if !(rate.is_finite() && *rate >= 0.0) {
                return Err(value_error!(rate, "a finite migration rate >= 0"));
            }
            if k / n == k % n && *rate != 0.0 {
                return Err(value_error!(rate, "a zero migration-matrix diagonal"));
            }
        }
        self.initial_migration_matrix = matrix.to_vec();
        Ok(())
    }

    pub fn set_simulation_model(&mut self, model: SimulationModel) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        model.validate()?;
        self.model = model;
        Ok(())
    }

    pub fn set_store_migrations(&mut self, store_migrations: bool) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        self.store_migrations = store_migrations;
        Ok(())
    }

    pub fn set_max_memory(&mut self, max_memory: usize) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if max_memory == 0 {
            return Err(value_error!(max_memory, "a memory bound > 0"));
        }
        self.max_memory = max_memory;
        Ok(())
    }

    pub fn set_segment_block_size(&mut self, block_size: usize) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if block_size < 2 {
            return Err(value_error!(block_size, "a block size >= 2"));
        }
        self.segment_block_size = block_size;
        Ok(())
    }

    pub fn set_node_block_size(&mut self, block_size: usize) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if block_size == 0 {
            return Err(value_error!(block_size, "a block size > 0"));
        }
        self.node_block_size = block_size;
        Ok(())
    }

    pub fn set_edge_block_size(&mut self, block_size: usize) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if block_size == 0 {
            return Err(value_error!(block_size, "a block size > 0"));
        }
        self.edge_block_size = block_size;
        Ok(())
    }

    pub fn set_migration_block_size(&mut self, block_size: usize) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if block_size == 0 {
            return Err(value_error!(block_size, "a block size > 0"));
        }
        self.migration_block_size = block_size;
        Ok(())
    }

    fn add_event(&mut self, time: f64, event: DemographicEvent) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        if !(time.is_finite() && time >= 0.0) {
            return Err(value_error!(time, "a finite event time >= 0"));
        }
        self.registered_events.push(ScheduledEvent { time, event });
        Ok(())
    }

    pub fn add_population_parameters_change(
        &mut self,
        time: f64,
        population: Option<PopulationId>,
        initial_size: Option<f64>,
        growth_rate: Option<f64>,
    ) -> Result<(), CoalseqError> {
        if initial_size.is_none() && growth_rate.is_none() {
            return Err(CoalseqError::DemographyError(
                "population parameters change without parameters".to_string(),
            ));
        }
        self.add_event(
            time,
            DemographicEvent::PopulationParametersChange {
                population,
                initial_size,
                growth_rate,
            },
        )
    }

    pub fn add_migration_rate_change(
        &mut self,
        time: f64,
        index: Option<(usize, usize)>,
        rate: f64,
    ) -> Result<(), CoalseqError> {
        self.add_event(time, DemographicEvent::MigrationRateChange { index, rate })
    }

    pub fn add_mass_migration(
        &mut self,
        time: f64,
        source: PopulationId,
        dest: PopulationId,
        proportion: f64,
    ) -> Result<(), CoalseqError> {
        self.add_event(
            time,
            DemographicEvent::MassMigration {
                source,
                dest,
                proportion,
            },
        )
    }

    pub fn add_simple_bottleneck(
        &mut self,
        time: f64,
        population: PopulationId,
        proportion: f64,
    ) -> Result<(), CoalseqError> {
        self.add_event(
            time,
            DemographicEvent::SimpleBottleneck {
                population,
                proportion,
            },
        )
    }

    pub fn add_instantaneous_bottleneck(
        &mut self,
        time: f64,
        population: PopulationId,
        strength: f64,
    ) -> Result<(), CoalseqError> {
        self.add_event(
            time,
            DemographicEvent::InstantaneousBottleneck {
                population,
                strength,
            },
        )
    }

    /// Validate the complete configuration and seed the initial state.
    pub fn initialise(&mut self) -> Result<(), CoalseqError> {
        self.check_configuring()?;
        let num_populations = self.initial_populations.len();
        self.model.validate()?;
        for s in &self.samples {
            match s.population.to_usize() {
                Some(p) if p < num_populations => {}
                _ => {
                    return Err(value_error!(
                        s.population,
                        format!("a sample population < {}", num_populations)
                    ))
                }
            }
        }
        for ev in &self.registered_events {
            ev.event.validate(num_populations)?;
        }
        self.demographic_events = self.registered_events.clone();
        self.demographic_events
            .sort_by(|a, b| a.time.total_cmp(&b.time));
        self.seed_state()?;
        self.state = SimulatorState::Initialised;
        Ok(())
    }

    fn seed_state(&mut self) -> Result<(), CoalseqError> {
        self.time = 0.0;
        self.populations = self
            .initial_populations
            .iter()
            .map(|c| Population::new(*c))
            .collect();
        self.migration_matrix = self.initial_migration_matrix.clone();
        self.segments = SegmentArena::with_block_size(self.segment_block_size);
        self.links = Fenwick::new(self.segments.capacity());
        self.breakpoints.clear();
        self.overlap_counts.clear();
        self.nodes = Vec::with_capacity(self.node_block_size);
        self.edges = Vec::with_capacity(self.edge_block_size);
        self.migrations = Vec::with_capacity(self.migration_block_size);
        self.num_re_events = 0;
        self.num_ca_events = 0;
        self.num_rejected_ca_events = 0;
        self.num_trapped_re_events = 0;
        self.num_multiple_re_events = 0;
        let n = self.populations.len();
        self.num_migration_events = vec![0; n * n];
        self.sampling_events.clear();
        self.next_sampling_event = 0;
        self.next_demographic_event = 0;
        let samples = self.samples.clone();
        for (j, s) in samples.iter().enumerate() {
            let node = self.store_node(
                NodeFlags::IS_SAMPLE,
                s.time,
                s.population.as_usize(),
            );
            debug_assert_eq!(node.as_usize(), j);
            if s.time == 0.0 {
                self.insert_sample_lineage(node, s.population)?;
            } else {
                self.sampling_events.push(SamplingEvent {
                    time: s.time,
                    sample: node,
                    population: s.population,
                });
            }
        }
        self.sampling_events
            .sort_by(|a, b| a.time.total_cmp(&b.time));
        self.overlap_counts
            .insert(0, self.samples.len() as u32);
        self.overlap_counts.insert(self.num_loci, OVERLAP_SENTINEL);
        Ok(())
    }

    /// Restore the initial state, discarding all records and counters.
    pub fn reset(&mut self) -> Result<(), CoalseqError> {
        match self.state {
            SimulatorState::Initialised | SimulatorState::Completed => {
                self.seed_state()?;
                self.state = SimulatorState::Initialised;
                Ok(())
            }
            SimulatorState::Configuring => Err(value_error!(
                "reset",
                "a simulator that has been initialised"
            )),
            SimulatorState::Failed => Err(CoalseqError::OutOfMemory),
        }
    }

    /// Advance the simulation until full coalescence, or until the next
    /// event would pass `max_time`, or until `max_events` events have
    /// executed. Partial progress is a consistent snapshot: `run` may be
    /// called again with new bounds.
    pub fn run(&mut self, max_time: f64, max_events: u64) -> Result<RunStatus, CoalseqError> {
        match self.state {
            SimulatorState::Initialised => {}
            SimulatorState::Completed => return Err(CoalseqError::AlreadyCompleted),
            SimulatorState::Failed => return Err(CoalseqError::OutOfMemory),
            SimulatorState::Configuring => {
                return Err(value_error!("run", "initialise() before run()"))
            }
        }
        let mut events: u64 = 0;
        loop {
            if self.num_ancestors() <= 1
                && self.next_sampling_event >= self.sampling_events.len()
            {
                self.state = SimulatorState::Completed;
                return Ok(RunStatus::Coalesced);
            }
            if events >= max_events {
                return Ok(RunStatus::MaxEventsReached);
            }
            let (t_wait, chosen) = self.sample_waiting_time();
            let t_next = self.time + t_wait;
            let t_samp = self
                .sampling_events
                .get(self.next_sampling_event)
                .map(|e| e.time);
            let t_demo = self
                .demographic_events
                .get(self.next_demographic_event)
                .map(|e| e.time);
            // Sampling wins ties against demographic events; scheduled
            // events win ties against stochastic events.
            let scheduled = match (t_samp, t_demo) {
                (Some(a), Some(b)) if a <= b => Some((a, true)),
                (Some(_), Some(b)) => Some((b, false)),
                (Some(a), None) => Some((a, true)),
                (None, Some(b)) => Some((b, false)),
                (None, None) => None,
            };
            match scheduled {
                Some((t_sched, is_sampling)) if t_sched <= t_next => {
                    if t_sched > max_time {
                        return Ok(RunStatus::MaxTimeReached);
                    }
                    self.time = t_sched;
                    if is_sampling {
                        let ev = self.sampling_events[self.next_sampling_event];
                        self.next_sampling_event += 1;
                        self.insert_sample_lineage(ev.sample, ev.population)?;
                    } else {
                        let ev = self.demographic_events[self.next_demographic_event];
                        self.next_demographic_event += 1;
                        ev.event.apply(self, t_sched)?;
                    }
                }
                _ => {
                    if !t_next.is_finite() {
                        return Ok(RunStatus::Stalled);
                    }
                    if t_next > max_time {
                        return Ok(RunStatus::MaxTimeReached);
                    }
                    self.time = t_next;
                    match chosen {
                        Some(StochasticEvent::Recombination) => self.recombination_event()?,
                        Some(StochasticEvent::CommonAncestor(pop)) => {
                            self.common_ancestor_event(pop)?
                        }
                        Some(StochasticEvent::Migration(i, j)) => self.migration_event(i, j)?,
                        None => return Ok(RunStatus::Stalled),
                    }
                }
            }
            events += 1;
        }
    }

    /// Draw per-class waiting times and keep the minimum.
    fn sample_waiting_time(&mut self) -> (f64, Option<StochasticEvent>) {
        let mut t_wait = f64::INFINITY;
        let mut chosen = None;
        let re_rate = self.scaled_recombination_rate * self.links.total() as f64;
        let t = exponential_deviate(&mut self.rng, re_rate);
        if t < t_wait {
            t_wait = t;
            chosen = Some(StochasticEvent::Recombination);
        }
        for pop in 0..self.populations.len() {
            let n = self.populations[pop].ancestors.len() as f64;
            let mut lambda = n * (n - 1.0) / 2.0;
            if let SimulationModel::Dirac { c, .. } = self.model {
                if n >= 2.0 {
                    lambda += c;
                }
            }
            let t = self.populations[pop].common_ancestor_waiting_time(
                lambda,
                self.time,
                &mut self.rng,
            );
            if t < t_wait {
                t_wait = t;
                chosen = Some(StochasticEvent::CommonAncestor(pop));
            }
        }
        let num_populations = self.populations.len();
        for i in 0..num_populations {
            let n_i = self.populations[i].ancestors.len() as f64;
            for j in 0..num_populations {
                if i == j {
                    continue;
                }
                let rate = self.migration_matrix[i * num_populations + j] * n_i;
                let t = exponential_deviate(&mut self.rng, rate);
                if t < t_wait {
                    t_wait = t;
                    chosen = Some(StochasticEvent::Migration(i, j));
                }
            }
        }
        (t_wait, chosen)
    }

    fn common_ancestor_event(&mut self, population: usize) -> Result<(), CoalseqError> {
        self.num_ca_events += 1;
        match self.model {
            SimulationModel::Beta {
                alpha,
                truncation_point,
            } => self.beta_common_ancestor_event(population, alpha, truncation_point),
            SimulationModel::Dirac { psi, c } => {
                self.dirac_common_ancestor_event(population, psi, c)
            }
            _ => self.binary_common_ancestor_event(population),
        }
    }

    /// Uniform-pair merge, with the SMC/SMC' adjacency gate.
    fn binary_common_ancestor_event(&mut self, population: usize) -> Result<(), CoalseqError> {
        let (x, y) = self.choose_two(population);
        self.populations[population].ancestors.remove(x);
        self.populations[population].ancestors.remove(y);
        let adjacency = match self.model {
            SimulationModel::Smc => Some(false),
            SimulationModel::SmcPrime => Some(true),
            _ => None,
        };
        if let Some(allow_adjacent) = adjacency {
            if !self.chains_coalesceable(x, y, allow_adjacent) {
                self.populations[population].ancestors.insert(x);
                self.populations[population].ancestors.insert(y);
                self.num_rejected_ca_events += 1;
                return Ok(());
            }
        }
        self.merge_two_ancestors(population, x, y)
    }

    fn dirac_common_ancestor_event(
        &mut self,
        population: usize,
        psi: f64,
        c: f64,
    ) -> Result<(), CoalseqError> {
        let n = self.populations[population].ancestors.len() as f64;
        let kingman = n * (n - 1.0) / 2.0;
        let u: f64 = self.rng.gen();
        if u * (kingman + c) < kingman {
            self.binary_common_ancestor_event(population)
        } else {
            self.multiple_merger(population, psi)
        }
    }

    fn beta_common_ancestor_event(
        &mut self,
        population: usize,
        alpha: f64,
        truncation_point: f64,
    ) -> Result<(), CoalseqError> {
        let beta = rand_distr::Beta::new(2.0 - alpha, alpha).map_err(|_| {
            CoalseqError::ModelError(format!("beta coalescent with alpha {}", alpha))
        })?;
        let mut participation = None;
        for _ in 0..BETA_REJECTION_LIMIT {
            let draw = beta.sample(&mut self.rng);
            if draw <= truncation_point {
                participation = Some(draw);
                break;
            }
        }
        match participation {
            Some(p) => self.multiple_merger(population, p),
            None => {
                self.num_rejected_ca_events += 1;
                Ok(())
            }
        }
    }

    /// Merge a binomially-sampled set of lineages; events recruiting
    /// fewer than two participants are rejected.
    fn multiple_merger(&mut self, population: usize, p: f64) -> Result<(), CoalseqError> {
        let n = self.populations[population].ancestors.len();
        let binomial = Binomial::new(n as u64, p).map_err(|_| {
            CoalseqError::ModelError(format!("participation probability {}", p))
        })?;
        let k = binomial.sample(&mut self.rng) as usize;
        if k < 2 {
            self.num_rejected_ca_events += 1;
            return Ok(());
        }
        let mut members: Vec<u32> = self.populations[population].ancestors.as_slice().to_vec();
        for i in 0..k {
            let j = self.rng.gen_range(i..members.len());
            members.swap(i, j);
        }
        members.truncate(k);
        for head in &members {
            self.populations[population].ancestors.remove(*head);
        }
        self.merge_ancestors(population, members)
    }

    fn choose_two(&mut self, population: usize) -> (u32, u32) {
        let n = self.populations[population].ancestors.len();
        debug_assert!(n >= 2);
        let i = self.rng.gen_range(0..n);
        let mut j = self.rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }
        let members = self.populations[population].ancestors.as_slice();
        (members[i], members[j])
    }

    /// Whether two chains share overlapping material; with
    /// `allow_adjacent`, abutting material also qualifies.
    fn chains_coalesceable(&self, a: u32, b: u32, allow_adjacent: bool) -> bool {
        let mut x = a;
        let mut y = b;
        while x != NULL_SEGMENT && y != NULL_SEGMENT {
            let sx = self.segments[x];
            let sy = self.segments[y];
            if sx.left.max(sy.left) < sx.right.min(sy.right) {
                return true;
            }
            if allow_adjacent && (sx.right == sy.left || sy.right == sx.left) {
                return true;
            }
            if sx.right < sy.right {
                x = sx.next;
            } else {
                y = sy.next;
            }
        }
        false
    }

    fn recombination_event(&mut self) -> Result<(), CoalseqError> {
        self.num_re_events += 1;
        let total = self.links.total();
        debug_assert!(total > 0);
        let h = self.rng.gen_range(1..=total);
        let y = self.links.find(h) as u32;
        let gap = self.links.cumulative_sum(y as usize) - h;
        let seg_y = self.segments[y];
        let k = seg_y.right - gap as u32 - 1;
        let z;
        if seg_y.left < k {
            // split within the segment at position k
            let tail = self.alloc_segment(
                k,
                seg_y.right,
                seg_y.node,
                seg_y.population,
                NULL_SEGMENT,
                seg_y.next,
            )?;
            if seg_y.next != NULL_SEGMENT {
                self.segments[seg_y.next].prev = tail;
            }
            self.segments[y].next = NULL_SEGMENT;
            self.segments[y].right = k;
            self.links
                .increment(y as usize, k as i64 - seg_y.right as i64);
            if !self.breakpoints.insert(k) {
                self.num_multiple_re_events += 1;
            }
            z = tail;
        } else {
            // the break fell in the gap between y and its predecessor
            let x = seg_y.prev;
            debug_assert!(x != NULL_SEGMENT);
            self.segments[x].next = NULL_SEGMENT;
            self.segments[y].prev = NULL_SEGMENT;
            self.num_trapped_re_events += 1;
            z = y;
        }
        let seg_z = self.segments[z];
        self.links
            .set_value(z as usize, (seg_z.right - seg_z.left) as i64 - 1);
        self.populations[seg_z.population.as_usize()]
            .ancestors
            .insert(z);
        Ok(())
    }

    fn migration_event(&mut self, source: usize, dest: usize) -> Result<(), CoalseqError> {
        let n = self.populations.len();
        self.num_migration_events[source * n + dest] += 1;
        let head = match self.populations[source].ancestors.choose(&mut self.rng) {
            Some(h) => h,
            None => return Ok(()),
        };
        self.move_lineage(head, source, dest, self.store_migrations);
        Ok(())
    }

    fn move_lineage(&mut self, head: u32, source: usize, dest: usize, record: bool) {
        self.populations[source].ancestors.remove(head);
        let mut seg = head;
        while seg != NULL_SEGMENT {
            let s = self.segments[seg];
            self.segments[seg].population = PopulationId::try_from(dest).unwrap_or_default();
            if record {
                self.migrations.push(MigrationRecord {
                    left: s.left,
                    right: s.right,
                    node: s.node,
                    source: PopulationId::try_from(source).unwrap_or_default(),
                    dest: PopulationId::try_from(dest).unwrap_or_default(),
                    time: self.time,
                });
            }
            seg = s.next;
        }
        self.populations[dest].ancestors.insert(head);
    }

    /// Merge two lineage chains with an interval sweep, emitting one
    /// parent node (at most) and an edge pair per coalesced sub-interval.
    fn merge_two_ancestors(
        &mut self,
        population: usize,
        a: u32,
        b: u32,
    ) -> Result<(), CoalseqError> {
        let mut x = a;
        let mut y = b;
        let mut coalescence = false;
        let mut defrag_required = false;
        let mut new_node = NodeId::NULL;
        let mut z = NULL_SEGMENT;
        while x != NULL_SEGMENT || y != NULL_SEGMENT {
            let mut alpha = NULL_SEGMENT;
            if x == NULL_SEGMENT {
                alpha = y;
                y = NULL_SEGMENT;
            } else if y == NULL_SEGMENT {
                alpha = x;
                x = NULL_SEGMENT;
            } else {
                if self.segments[y].left < self.segments[x].left {
                    std::mem::swap(&mut x, &mut y);
                }
                let seg_x = self.segments[x];
                let seg_y = self.segments[y];
                if seg_x.right <= seg_y.left {
                    // x wholly to the left: forward it
                    alpha = x;
                    x = seg_x.next;
                    self.segments[alpha].next = NULL_SEGMENT;
                } else if seg_x.left != seg_y.left {
                    // partial overlap: forward x's leading piece
                    alpha = self.alloc_segment(
                        seg_x.left,
                        seg_y.left,
                        seg_x.node,
                        seg_x.population,
                        NULL_SEGMENT,
                        NULL_SEGMENT,
                    )?;
                    self.segments[x].left = seg_y.left;
                } else {
                    // coalescence over [l, r)
                    let l = seg_x.left;
                    let r_max = seg_x.right.min(seg_y.right);
                    if !coalescence {
                        coalescence = true;
                        new_node = self.store_node(NodeFlags::empty(), self.time, population);
                    }
                    let v = new_node;
                    self.ensure_overlap_key(l);
                    self.ensure_overlap_key(r_max);
                    let r = self.consume_overlaps(l, r_max, 2);
                    if !self.interval_fully_coalesced(l) {
                        alpha = self.alloc_segment(
                            l,
                            r,
                            v,
                            seg_x.population,
                            NULL_SEGMENT,
                            NULL_SEGMENT,
                        )?;
                    }
                    self.store_edge(l, r, v, seg_x.node);
                    self.store_edge(l, r, v, seg_y.node);
                    if self.segments[x].right == r {
                        let nx = self.segments[x].next;
                        self.free_segment(x);
                        x = nx;
                    } else {
                        self.segments[x].left = r;
                    }
                    if self.segments[y].right == r {
                        let ny = self.segments[y].next;
                        self.free_segment(y);
                        y = ny;
                    } else {
                        self.segments[y].left = r;
                    }
                }
            }
            if alpha != NULL_SEGMENT {
                defrag_required |= self.append_to_chain(population, &mut z, alpha);
            }
        }
        if coalescence {
            self.compress_overlap_counts();
        }
        if defrag_required {
            self.defrag_chain(z);
        }
        Ok(())
    }

    /// Merge any number of lineage chains, heap-ordered by left endpoint.
    /// Used by bottlenecks and the multiple-merger models.
    fn merge_ancestors(&mut self, population: usize, heads: Vec<u32>) -> Result<(), CoalseqError> {
        use std::cmp::Reverse;
        use std::collections::BinaryHeap;
        let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();
        for h in heads {
            if h != NULL_SEGMENT {
                heap.push(Reverse((self.segments[h].left, h)));
            }
        }
        let mut coalescence = false;
        let mut defrag_required = false;
        let mut new_node = NodeId::NULL;
        let mut z = NULL_SEGMENT;
        let mut xs: Vec<u32> = Vec::new();
        while let Some(&Reverse((l, _))) = heap.peek() {
            xs.clear();
            while matches!(heap.peek(), Some(&Reverse((pl, _))) if pl == l) {
                if let Some(Reverse((_, id))) = heap.pop() {
                    xs.push(id);
                }
            }
            let next_left = heap.peek().map(|&Reverse((pl, _))| pl);
            let mut alpha = NULL_SEGMENT;
            if xs.len() == 1 {
                let x = xs[0];
                let seg_x = self.segments[x];
                match next_left {
                    Some(nl) if nl < seg_x.right => {
                        alpha = self.alloc_segment(
                            seg_x.left,
                            nl,
                            seg_x.node,
                            seg_x.population,
                            NULL_SEGMENT,
                            NULL_SEGMENT,
                        )?;
                        self.segments[x].left = nl;
                        heap.push(Reverse((nl, x)));
                    }
                    _ => {
                        alpha = x;
                        let nx = seg_x.next;
                        self.segments[alpha].next = NULL_SEGMENT;
                        if nx != NULL_SEGMENT {
                            self.segments[nx].prev = NULL_SEGMENT;
                            heap.push(Reverse((self.segments[nx].left, nx)));
                        }
                    }
                }
            } else {
                let h = xs.len() as u32;
                if !coalescence {
                    coalescence = true;
                    new_node = self.store_node(NodeFlags::empty(), self.time, population);
                }
                let v = new_node;
                let mut r_max = xs
                    .iter()
                    .map(|x| self.segments[*x].right)
                    .min()
                    .unwrap_or(self.num_loci);
                if let Some(nl) = next_left {
                    r_max = r_max.min(nl);
                }
                self.ensure_overlap_key(l);
                self.ensure_overlap_key(r_max);
                let r = self.consume_overlaps(l, r_max, h);
                if !self.interval_fully_coalesced(l) {
                    alpha = self.alloc_segment(
                        l,
                        r,
                        v,
                        PopulationId::try_from(population).unwrap_or_default(),
                        NULL_SEGMENT,
                        NULL_SEGMENT,
                    )?;
                }
                for i in 0..xs.len() {
                    let x = xs[i];
                    let seg_x = self.segments[x];
                    self.store_edge(l, r, v, seg_x.node);
                    if seg_x.right == r {
                        let nx = seg_x.next;
                        self.free_segment(x);
                        if nx != NULL_SEGMENT {
                            self.segments[nx].prev = NULL_SEGMENT;
                            heap.push(Reverse((self.segments[nx].left, nx)));
                        }
                    } else {
                        self.segments[x].left = r;
                        heap.push(Reverse((r, x)));
                    }
                }
            }
            if alpha != NULL_SEGMENT {
                defrag_required |= self.append_to_chain(population, &mut z, alpha);
            }
        }
        if coalescence {
            self.compress_overlap_counts();
        }
        if defrag_required {
            self.defrag_chain(z);
        }
        Ok(())
    }

    /// Append `alpha` to the merged chain whose tail is `*z`, keeping the
    /// Fenwick weights in their telescoping form. Returns whether the new
    /// joint needs defragmentation.
    fn append_to_chain(&mut self, population: usize, z: &mut u32, alpha: u32) -> bool {
        let seg_a = self.segments[alpha];
        if *z == NULL_SEGMENT {
            self.populations[population].ancestors.insert(alpha);
            self.segments[alpha].prev = NULL_SEGMENT;
            self.links
                .set_value(alpha as usize, (seg_a.right - seg_a.left) as i64 - 1);
            *z = alpha;
            return false;
        }
        let seg_z = self.segments[*z];
        let defrag = seg_z.right == seg_a.left && seg_z.node == seg_a.node;
        self.segments[*z].next = alpha;
        self.segments[alpha].prev = *z;
        self.links
            .set_value(alpha as usize, (seg_a.right - seg_z.right) as i64);
        *z = alpha;
        defrag
    }

    /// Walk the overlap-count map over `[l, r_max)` for a merge of `h`
    /// lineages: a leading count equal to `h` means the interval reaches
    /// its MRCA (count drops to zero and the walk stops at the next key);
    /// otherwise each mapping loses `h - 1` coverers until a count of `h`
    /// or `r_max` stops the walk. Returns the resolved right bound.
    fn consume_overlaps(&mut self, l: u32, r_max: u32, h: u32) -> u32 {
        let count_at_l = self.overlap_count_at_exact(l);
        if count_at_l == h {
            self.overlap_counts.insert(l, 0);
            self.next_overlap_key(l)
        } else {
            let mut cursor = l;
            loop {
                let c = self.overlap_count_at_exact(cursor);
                if c == h || cursor >= r_max {
                    break;
                }
                self.overlap_counts.insert(cursor, c - (h - 1));
                cursor = self.next_overlap_key(cursor);
            }
            cursor
        }
    }

    /// True when the interval starting at `l` just resolved to its MRCA
    /// (its count was zeroed by [`Simulator::consume_overlaps`]).
    fn interval_fully_coalesced(&self, l: u32) -> bool {
        self.overlap_count_at_exact(l) == 0
    }

    fn overlap_count_at_exact(&self, key: u32) -> u32 {
        match self.overlap_counts.get(&key) {
            Some(c) => *c,
            None => 0,
        }
    }

    fn next_overlap_key(&self, key: u32) -> u32 {
        self.overlap_counts
            .range(key + 1..)
            .next()
            .map(|(k, _)| *k)
            .unwrap_or(self.num_loci)
    }

    /// Install a mapping at `pos` copying the count in force there.
    fn ensure_overlap_key(&mut self, pos: u32) {
        if self.overlap_counts.contains_key(&pos) {
            return;
        }
        let value = self
            .overlap_counts
            .range(..pos)
            .next_back()
            .map(|(_, v)| *v)
            .unwrap_or(0);
        self.overlap_counts.insert(pos, value);
    }

    /// Drop mappings that repeat their predecessor's count.
    fn compress_overlap_counts(&mut self) {
        let mut to_remove: Vec<u32> = Vec::new();
        let mut prev: Option<u32> = None;
        for (k, v) in &self.overlap_counts {
            if prev == Some(*v) {
                to_remove.push(*k);
            } else {
                prev = Some(*v);
            }
        }
        for k in to_remove {
            self.overlap_counts.remove(&k);
        }
    }

    /// Squash abutting same-node segments left behind by a merge.
    fn defrag_chain(&mut self, z: u32) {
        let mut y = z;
        while y != NULL_SEGMENT && self.segments[y].prev != NULL_SEGMENT {
            let x = self.segments[y].prev;
            let seg_y = self.segments[y];
            let seg_x = self.segments[x];
            if seg_x.right == seg_y.left && seg_x.node == seg_y.node {
                self.segments[x].right = seg_y.right;
                self.segments[x].next = seg_y.next;
                if seg_y.next != NULL_SEGMENT {
                    self.segments[seg_y.next].prev = x;
                }
                self.links
                    .increment(x as usize, (seg_y.right - seg_y.left) as i64);
                self.free_segment(y);
            }
            y = x;
        }
    }

    fn insert_sample_lineage(
        &mut self,
        node: NodeId,
        population: PopulationId,
    ) -> Result<(), CoalseqError> {
        let seg = self.alloc_segment(0, self.num_loci, node, population, NULL_SEGMENT, NULL_SEGMENT)?;
        self.links
            .set_value(seg as usize, self.num_loci as i64 - 1);
        self.populations[population.as_usize()]
            .ancestors
            .insert(seg);
        Ok(())
    }

    fn alloc_segment(
        &mut self,
        left: u32,
        right: u32,
        node: NodeId,
        population: PopulationId,
        prev: u32,
        next: u32,
    ) -> Result<u32, CoalseqError> {
        if self.segments.needs_new_block()
            && self
                .segments
                .allocated_bytes()
                .saturating_add(self.segments.block_bytes())
                > self.max_memory
        {
            self.state = SimulatorState::Failed;
            return Err(CoalseqError::OutOfMemory);
        }
        let id = self.segments.alloc(left, right, node, population, prev, next);
        if id as usize > self.links.size() {
            self.links.expand(self.segments.capacity());
        }
        Ok(id)
    }

    fn free_segment(&mut self, id: u32) {
        self.links.set_value(id as usize, 0);
        self.segments.free(id);
    }

    fn store_node(&mut self, flags: NodeFlags, time: f64, population: usize) -> NodeId {
        self.nodes.push(NodeRecord {
            flags,
            time,
            population: PopulationId::try_from(population).unwrap_or_default(),
        });
        NodeId::from((self.nodes.len() - 1) as i32)
    }

    fn store_edge(&mut self, left: u32, right: u32, parent: NodeId, child: NodeId) {
        self.edges.push(EdgeRecord {
            left,
            right,
            parent,
            child,
        });
    }

    // Demographic-event appliers, dispatched by
    // [`DemographicEvent::apply`].

    pub(crate) fn apply_population_parameters_change(
        &mut self,
        population: Option<PopulationId>,
        initial_size: Option<f64>,
        growth_rate: Option<f64>,
        time: f64,
    ) -> Result<(), CoalseqError> {
        let targets: Vec<usize> = match population {
            Some(p) => vec![p.as_usize()],
            None => (0..self.populations.len()).collect(),
        };
        for t in targets {
            let current_size = self.populations[t].size_at(time);
            let pop = &mut self.populations[t];
            pop.initial_size = initial_size.unwrap_or(current_size);
            if let Some(g) = growth_rate {
                pop.growth_rate = g;
            }
            pop.start_time = time;
        }
        Ok(())
    }

    pub(crate) fn apply_migration_rate_change(
        &mut self,
        index: Option<(usize, usize)>,
        rate: f64,
    ) -> Result<(), CoalseqError> {
        let n = self.populations.len();
        match index {
            Some((i, j)) => self.migration_matrix[i * n + j] = rate,
            None => {
                for i in 0..n {
                    for j in 0..n {
                        if i != j {
                            self.migration_matrix[i * n + j] = rate;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn apply_mass_migration(
        &mut self,
        source: PopulationId,
        dest: PopulationId,
        proportion: f64,
    ) -> Result<(), CoalseqError> {
        let s = source.as_usize();
        let d = dest.as_usize();
        let snapshot: Vec<u32> = self.populations[s].ancestors.as_slice().to_vec();
        for head in snapshot {
            if self.rng.gen::<f64>() < proportion {
                self.move_lineage(head, s, d, false);
            }
        }
        Ok(())
    }

    pub(crate) fn apply_simple_bottleneck(
        &mut self,
        population: PopulationId,
        proportion: f64,
    ) -> Result<(), CoalseqError> {
        let p = population.as_usize();
        let snapshot: Vec<u32> = self.populations[p].ancestors.as_slice().to_vec();
        let mut participants = Vec::new();
        for head in snapshot {
            if self.rng.gen::<f64>() < proportion {
                participants.push(head);
            }
        }
        if participants.len() < 2 {
            return Ok(());
        }
        for head in &participants {
            self.populations[p].ancestors.remove(*head);
        }
        self.merge_ancestors(p, participants)
    }

    /// A Kingman jump chain of total duration `strength`, executed
    /// instantaneously. The chain runs over lineage *clusters* first and
    /// each cluster then merges once, so every new node parents only
    /// strictly older nodes.
    pub(crate) fn apply_instantaneous_bottleneck(
        &mut self,
        population: PopulationId,
        strength: f64,
    ) -> Result<(), CoalseqError> {
        let p = population.as_usize();
        let mut clusters: Vec<Vec<u32>> = self.populations[p]
            .ancestors
            .as_slice()
            .iter()
            .map(|h| vec![*h])
            .collect();
        let mut virtual_time = 0.0;
        while clusters.len() >= 2 {
            let k = clusters.len();
            let rate = (k * (k - 1)) as f64 / 2.0;
            virtual_time += exponential_deviate(&mut self.rng, rate);
            if virtual_time >= strength {
                break;
            }
            let i = self.rng.gen_range(0..k);
            let mut j = self.rng.gen_range(0..k - 1);
            if j >= i {
                j += 1;
            }
            let absorbed = clusters.swap_remove(j.max(i));
            clusters[j.min(i)].extend(absorbed);
        }
        for cluster in clusters {
            if cluster.len() < 2 {
                continue;
            }
            for head in &cluster {
                self.populations[p].ancestors.remove(*head);
            }
            self.merge_ancestors(p, cluster)?;
        }
        Ok(())
    }

    /// Emit the accumulated records, converting genetic coordinates to
    /// physical positions via `recomb_map` and scaling times by the
    /// reference population size `ne`. Rows are appended; the caller owns
    /// the tables.
    pub fn populate_tables(
        &self,
        ne: f64,
        recomb_map: &RecombinationMap,
        nodes: &mut NodeTable,
        edges: &mut EdgeTable,
        migrations: &mut MigrationTable,
    ) -> Result<(), CoalseqError> {
        if recomb_map.num_loci() != self.num_loci {
            return Err(value_error!(
                recomb_map.num_loci(),
                format!("a recombination map over {} loci", self.num_loci)
            ));
        }
        if !(ne > 0.0 && ne.is_finite()) {
            return Err(value_error!(ne, "a finite reference size > 0"));
        }
        for rec in &self.nodes {
            nodes.add_row(rec.flags, rec.time * ne, rec.population, b"")?;
        }
        for rec in &self.edges {
            edges.add_row(
                recomb_map.genetic_to_physical(rec.left as f64),
                recomb_map.genetic_to_physical(rec.right as f64),
                rec.parent,
                rec.child,
            )?;
        }
        for rec in &self.migrations {
            migrations.add_row(
                recomb_map.genetic_to_physical(rec.left as f64),
                recomb_map.genetic_to_physical(rec.right as f64),
                rec.node,
                rec.source,
                rec.dest,
                rec.time * ne,
            )?;
        }
        Ok(())
    }

    /// Convenience wrapper building a [`crate::TableCollection`] from the
    /// accumulated records. The result is not yet canonically sorted.
    pub fn tables(
        &self,
        ne: f64,
        recomb_map: &RecombinationMap,
    ) -> Result<crate::TableCollection, CoalseqError> {
        let mut nodes = NodeTable::new();
        let mut edges = EdgeTable::new();
        let mut migrations = MigrationTable::new();
        self.populate_tables(ne, recomb_map, &mut nodes, &mut edges, &mut migrations)?;
        let mut tables = crate::TableCollection::new(recomb_map.sequence_length())?;
        *tables.nodes_mut() = nodes;
        *tables.edges_mut() = edges;
        *tables.migrations_mut() = migrations;
        Ok(tables)
    }

    // Accessors and statistics.

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn model(&self) -> SimulationModel {
        self.model
    }

    pub fn store_migrations(&self) -> bool {
        self.store_migrations
    }

    pub fn sample_size(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn num_loci(&self) -> u32 {
        self.num_loci
    }

    pub fn num_populations(&self) -> usize {
        self.initial_populations.len()
    }

    pub fn is_completed(&self) -> bool {
        self.state == SimulatorState::Completed
    }

    /// The number of extant lineages across all populations.
    pub fn num_ancestors(&self) -> usize {
        self.populations.iter().map(|p| p.ancestors.len()).sum()
    }

    pub fn num_ancestors_in(&self, population: usize) -> Result<usize, CoalseqError> {
        self.populations
            .get(population)
            .map(|p| p.ancestors.len())
            .ok_or(CoalseqError::IndexError)
    }

    pub fn num_common_ancestor_events(&self) -> usize {
        self.num_ca_events
    }

    pub fn num_rejected_common_ancestor_events(&self) -> usize {
        self.num_rejected_ca_events
    }

    pub fn num_recombination_events(&self) -> usize {
        self.num_re_events
    }

    pub fn num_trapped_recombination_events(&self) -> usize {
        self.num_trapped_re_events
    }

    pub fn num_multiple_recombination_events(&self) -> usize {
        self.num_multiple_re_events
    }

    /// Per ordered population pair, row-major.
    pub fn num_migration_events(&self) -> &[usize] {
        &self.num_migration_events
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_migrations(&self) -> usize {
        self.migrations.len()
    }

    pub fn breakpoints(&self) -> Vec<u32> {
        self.breakpoints.iter().copied().collect()
    }

    pub fn num_breakpoints(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn migration_matrix(&self) -> &[f64] {
        &self.migration_matrix
    }

    pub fn population_configuration(
        &self,
        population: usize,
    ) -> Result<(f64, f64), CoalseqError> {
        self.populations
            .get(population)
            .map(|p| (p.initial_size, p.growth_rate))
            .ok_or(CoalseqError::IndexError)
    }

    pub fn used_memory(&self) -> usize {
        self.segments.allocated_bytes()
    }

    pub fn num_live_segments(&self) -> usize {
        self.segments.len()
    }
}
