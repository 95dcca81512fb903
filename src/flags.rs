use bitflags::bitflags;

bitflags! {
    /// Node flags
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u32 {
        /// The node is a sample.
        const IS_SAMPLE = 1;
    }
}

impl NodeFlags {
    /// Flags for a new sample node.
    pub fn new_sample() -> Self {
        Self::IS_SAMPLE
    }

    pub fn is_sample(&self) -> bool {
        self.contains(Self::IS_SAMPLE)
    }
}

bitflags! {
    /// Control the behavior of [`crate::TableCollection::simplify`]
    /// and [`crate::TreeSequence::simplify`].
    ///
    /// Inclusion of values sets an option to `true`.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SimplificationOptions: u32 {
        /// Drop sites that are left without any mutation
        /// under the restricted sample set.
        const FILTER_INVARIANT_SITES = 1;
    }
}

bitflags! {
    /// Modify the behavior of [`crate::TreeSequence::tree_iterator`].
    ///
    /// The first bit enables the per-node sample-count queries,
    /// the second the per-node sample lists.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TreeFlags: u32 {
        /// Enable [`num_samples`](crate::Tree::num_samples) and the
        /// tracked-sample overlay.
        const SAMPLE_COUNTS = 1;
        /// Enable [`samples`](crate::Tree::samples).
        const SAMPLE_LISTS = 1 << 1;
    }
}

impl From<u32> for NodeFlags {
    fn from(value: u32) -> Self {
        Self::from_bits_retain(value)
    }
}

impl From<u32> for SimplificationOptions {
    fn from(value: u32) -> Self {
        Self::from_bits_retain(value)
    }
}

impl From<u32> for TreeFlags {
    fn from(value: u32) -> Self {
        Self::from_bits_retain(value)
    }
}
