// core.rs splits chain storage and chain validation into submodules.
pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;
