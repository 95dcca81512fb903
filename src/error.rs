//! Error handling

use thiserror::Error;

/// All errors produced by this crate.
///
/// The original engine reported faults as negative integer codes plus a
/// `strerror` lookup; here each kind is an enum variant and the message is
/// the `Display` implementation.
#[derive(Error, Debug, PartialEq)]
pub enum CoalseqError {
    /// Used when bad input is encountered.
    #[error("we received {} but expected {}", *got, *expected)]
    ValueError { got: String, expected: String },
    /// Used when array access is out of range.
    #[error("Invalid index")]
    IndexError,
    /// An allocation would push the simulator's arenas past `max_memory`.
    /// The simulator cannot be resumed after this error.
    #[error("arena memory limit exceeded")]
    OutOfMemory,
    /// A scheduled demographic event is not executable,
    /// e.g. it names a population that does not exist.
    #[error("inconsistent demography: {0}")]
    DemographyError(String),
    /// Simulation model parameters are outside their admissible domain.
    #[error("model precondition violated: {0}")]
    ModelError(String),
    /// `run` was called on a simulation that already fully coalesced.
    #[error("simulation already completed")]
    AlreadyCompleted,
    /// Tables were not in the canonical sorted order required
    /// by the simplifier and the tree iterators.
    #[error("tables are not canonically sorted")]
    UnsortedTables,
    /// An edge, mutation, or migration refers to a node that
    /// does not exist.
    #[error("node out of bounds")]
    NodeOutOfBounds,
    /// Tables are internally inconsistent (negative intervals,
    /// out-of-range ids, and similar corruption).
    #[error("inconsistent tables: {0}")]
    IntegrityError(String),
    /// A sample-list or sample-count query was made on a tree
    /// built without the corresponding flag.
    #[error("samples are not being tracked")]
    NotTrackingSamples,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_error_formatting() {
        let e = CoalseqError::ValueError {
            got: "-1".to_string(),
            expected: "a non-negative rate".to_string(),
        };
        assert_eq!(format!("{}", e), "we received -1 but expected a non-negative rate");
    }

    #[test]
    fn test_variant_messages() {
        assert_eq!(
            format!("{}", CoalseqError::OutOfMemory),
            "arena memory limit exceeded"
        );
        assert_eq!(
            format!("{}", CoalseqError::UnsortedTables),
            "tables are not canonically sorted"
        );
    }
}
