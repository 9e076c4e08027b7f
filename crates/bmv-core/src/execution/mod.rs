pub mod event;
pub mod mpt;
pub mod receipt;

pub use event::*;
pub use mpt::*;
pub use receipt::*;
