//! powledger - A proof-of-work transaction ledger with longest-valid-chain consensus
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, canonical hashing and chain validation
//! - [`transaction`] - Value transfer records
//! - [`ledger`] - Shared, lock-protected chain and pending buffer
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work puzzle and parallel proof search
//! - [`consensus`] - Longest-valid-chain resolution against peers
//!
//! ## Networking
//! - [`network`] - Peer addresses, peer registry and HTTP chain fetching
//! - [`node`] - Ties ledger, miner, peers and consensus together
//! - [`api`] - HTTP interface (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod ledger;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
