//! Export commonly-use types and traits

pub use crate::DoubleEndedStreamingIterator;
pub use crate::StreamingIterator;
pub use {
    crate::EdgeId, crate::MigrationId, crate::MutationId, crate::NodeId, crate::PopulationId,
    crate::Position, crate::SiteId, crate::Time,
};
pub use {
    crate::NodeFlags, crate::RunStatus, crate::Sample, crate::SimplificationOptions,
    crate::SimulationModel, crate::TreeFlags,
};
