use crate::error::ChainError;
use crate::miner::valid_proof;

use super::chain::Block;

/// Check linkage and proof-of-work of every adjacent pair, reporting the first
/// offending block. A genesis-only chain is valid; an empty chain is not.
///
/// The genesis block itself is not inspected, so chains rooted in a different
/// genesis are accepted as long as they are internally consistent.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    if chain.is_empty() {
        return Err(ChainError::EmptyChain);
    }

    for pair in chain.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);

        if block.previous_hash != previous.hash() {
            return Err(ChainError::InvalidBlockLinkage(block.index));
        }

        if !valid_proof(previous.proof, block.proof) {
            return Err(ChainError::InvalidProofOfWork(block.index));
        }
    }

    Ok(())
}

pub fn valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}
