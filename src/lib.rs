//! Coalescent simulation of recombining ancestries as succinct tree
//! sequences.
//!
//! The [`Simulator`] runs an event-driven coalescent with recombination,
//! migration between populations, and scheduled demographic events,
//! producing node, edge, and migration records. Records are emitted into
//! a [`TableCollection`], canonicalised with
//! [`TableCollection::full_sort`] and [`TableCollection::squash_edges`],
//! and consumed either as a [`TreeSequence`] (streaming local trees with
//! [`StreamingIterator`]) or rewritten onto a sample subset with
//! [`TableCollection::simplify`].
//!
//! ```
//! use coalseq::prelude::*;
//! use rand::SeedableRng;
//!
//! let samples = vec![Sample::new(0, 0.0), Sample::new(0, 0.0)];
//! let rng = rand_pcg::Pcg64::seed_from_u64(54321);
//! let mut sim = coalseq::Simulator::new(&samples, rng).unwrap();
//! sim.initialise().unwrap();
//! assert_eq!(sim.run(f64::INFINITY, u64::MAX).unwrap(), RunStatus::Coalesced);
//!
//! let map = coalseq::RecombinationMap::uniform(1, 100.0, 0.0).unwrap();
//! let mut tables = sim.tables(1.0, &map).unwrap();
//! tables.full_sort().unwrap();
//! tables.squash_edges();
//! let ts = tables.tree_sequence().unwrap();
//! assert_eq!(ts.num_trees(), 1);
//! ```

mod _macros;

mod arena;
mod demography;
mod edge_differences;
mod edge_table;
mod error;
mod fenwick;
mod flags;
mod migration_table;
mod model;
mod mutation_table;
mod mutgen;
mod newtypes;
mod node_table;
mod population;
pub mod prelude;
mod recomb_map;
mod segment;
mod simplify;
mod simulator;
mod site_table;
mod table_collection;
mod table_iterator;
mod trees;
mod util;

pub use demography::DemographicEvent;
pub use edge_differences::{EdgeDifferences, EdgeDifferencesIterator};
pub use edge_table::{EdgeTable, EdgeTableRow};
pub use error::CoalseqError;
pub use flags::{NodeFlags, SimplificationOptions, TreeFlags};
pub use migration_table::{MigrationTable, MigrationTableRow};
pub use model::SimulationModel;
pub use mutation_table::{MutationTable, MutationTableRow};
pub use mutgen::MutationGenerator;
pub use newtypes::{
    EdgeId, MigrationId, MutationId, NodeId, PopulationId, Position, SiteId, Time,
};
pub use node_table::{NodeTable, NodeTableRow};
pub use population::PopulationConfiguration;
pub use recomb_map::RecombinationMap;
pub use simulator::{RunStatus, Sample, Simulator};
pub use site_table::{SiteTable, SiteTableRow};
pub use table_collection::TableCollection;
pub use trees::{Tree, TreeSequence};

pub use streaming_iterator::DoubleEndedStreamingIterator;
pub use streaming_iterator::StreamingIterator;
