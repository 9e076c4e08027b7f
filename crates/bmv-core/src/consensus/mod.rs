pub mod block;
pub mod votes;

pub use block::*;
pub use votes::*;
