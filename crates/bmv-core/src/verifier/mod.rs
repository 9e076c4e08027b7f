pub mod config;
pub mod engine;
pub mod state;

pub use config::*;
pub use engine::*;
pub use state::*;
