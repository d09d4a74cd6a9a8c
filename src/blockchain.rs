// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// chain storage and chain validation.

pub mod core;
pub use core::*;
