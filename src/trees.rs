mod tree;
mod treeseq;

pub use tree::Tree;
pub use treeseq::TreeSequence;
