//! Proof-of-work puzzle and search
//!
//! A proof `p` is valid for the previous proof `l` when the SHA-256 hex digest of
//! the decimal string `"{l}{p}"` begins with [`DIFFICULTY`] zero characters.
//! Searching returns the smallest such `p`, scanning upward from zero.

use crate::error::ChainError;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Leading zero hex characters a proof digest must carry.
pub const DIFFICULTY: usize = 4;

/// Candidate proofs handed to each worker per round.
const PROOFS_PER_THREAD: u64 = 4096;

pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    let digest = Sha256::digest(guess.as_bytes());
    has_leading_zero_nibbles(&digest, DIFFICULTY)
}

fn has_leading_zero_nibbles(digest: &[u8], nibbles: usize) -> bool {
    let full_bytes = nibbles / 2;
    if digest.len() < full_bytes + nibbles % 2 {
        return false;
    }
    if digest[..full_bytes].iter().any(|b| *b != 0) {
        return false;
    }
    nibbles % 2 == 0 || digest[full_bytes] >> 4 == 0
}

/// Single-threaded reference search.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let mut proof = 0;
    while !valid_proof(last_proof, proof) {
        proof += 1;
    }
    proof
}

/// Parallel proof search on a dedicated thread pool.
///
/// The search space is scanned in consecutive rounds; within a round the range is
/// split across the pool and the lowest hit wins, so the result is identical to
/// [`proof_of_work`]. [`Miner::cancel`] aborts every search in flight at the next
/// round boundary.
pub struct Miner {
    pool: rayon::ThreadPool,
    round_size: u64,
    generation: AtomicU64,
}

impl Miner {
    pub fn new(threads: usize) -> Result<Self, ChainError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("powledger-miner-{}", i))
            .build()
            .map_err(|e| ChainError::ConfigError(format!("Failed to start miner threads: {}", e)))?;

        Ok(Self {
            pool,
            round_size: PROOFS_PER_THREAD * threads as u64,
            generation: AtomicU64::new(0),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Find the smallest valid proof following `last_proof`. Blocks the calling
    /// thread until a proof is found or the search is cancelled.
    pub fn search(&self, last_proof: u64) -> Result<u64, ChainError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let mut start = 0u64;

        loop {
            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::info!(last_proof, scanned = start, "mining cancelled");
                return Err(ChainError::MiningCancelled);
            }

            let end = start.saturating_add(self.round_size);
            let found = self.pool.install(|| {
                (start..end)
                    .into_par_iter()
                    .find_first(|proof| valid_proof(last_proof, *proof))
            });

            if let Some(proof) = found {
                tracing::debug!(last_proof, proof, "proof found");
                return Ok(proof);
            }

            if end == u64::MAX {
                return Err(ChainError::SearchExhausted(last_proof));
            }
            start = end;
        }
    }

    /// Abort all searches currently running. Searches started afterwards are unaffected.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::GENESIS_PROOF;
    use std::sync::Arc;

    fn digest_hex(last_proof: u64, proof: u64) -> String {
        hex::encode(Sha256::digest(format!("{}{}", last_proof, proof).as_bytes()))
    }

    #[test]
    fn test_valid_proof_matches_hex_prefix() {
        for proof in 0..2000u64 {
            let expected = digest_hex(GENESIS_PROOF, proof).starts_with("0000");
            assert_eq!(valid_proof(GENESIS_PROOF, proof), expected);
        }
    }

    #[test]
    fn test_proof_of_work_returns_smallest() {
        let proof = proof_of_work(GENESIS_PROOF);

        assert!(valid_proof(GENESIS_PROOF, proof));
        assert!(digest_hex(GENESIS_PROOF, proof).starts_with("0000"));
        assert!((0..proof).all(|p| !valid_proof(GENESIS_PROOF, p)));
    }

    #[test]
    fn test_leading_zero_nibbles() {
        assert!(has_leading_zero_nibbles(&[0x00, 0x00, 0xff], 4));
        assert!(!has_leading_zero_nibbles(&[0x00, 0x01, 0xff], 4));
        assert!(has_leading_zero_nibbles(&[0x00, 0x0f], 3));
        assert!(!has_leading_zero_nibbles(&[0x00, 0x10], 3));
        assert!(!has_leading_zero_nibbles(&[0x00], 4));
    }

    #[test]
    fn test_parallel_search_matches_sequential() {
        let miner = Miner::new(4).unwrap();
        assert_eq!(miner.threads(), 4);

        let mut last_proof = GENESIS_PROOF;
        for _ in 0..3 {
            let expected = proof_of_work(last_proof);
            assert_eq!(miner.search(last_proof).unwrap(), expected);
            last_proof = expected;
        }
    }

    #[test]
    fn test_zero_threads_falls_back_to_one() {
        let miner = Miner::new(0).unwrap();
        assert_eq!(miner.threads(), 1);
    }

    #[test]
    fn test_cancel_stops_running_search() {
        // A tiny round keeps the search polling the cancel flag often.
        let miner = Arc::new(Miner {
            pool: rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap(),
            round_size: 1,
            generation: AtomicU64::new(0),
        });

        let worker = {
            let miner = miner.clone();
            std::thread::spawn(move || {
                // Keep searching until a cancel lands mid-search.
                let mut last_proof = GENESIS_PROOF;
                loop {
                    match miner.search(last_proof) {
                        Ok(proof) => last_proof = proof,
                        Err(e) => return e,
                    }
                }
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        // A cancel landing between two searches is seen by neither.
        while !worker.is_finished() {
            miner.cancel();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        let err = worker.join().unwrap();
        assert!(matches!(err, ChainError::MiningCancelled));
    }

    #[test]
    fn test_cancel_does_not_affect_later_searches() {
        let miner = Miner::new(1).unwrap();
        miner.cancel();
        assert_eq!(miner.search(GENESIS_PROOF).unwrap(), proof_of_work(GENESIS_PROOF));
    }
}
