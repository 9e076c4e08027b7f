pub mod rlp;

pub use rlp::*;
