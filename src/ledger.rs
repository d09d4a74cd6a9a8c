//! Thread-safe ledger shared by request handlers, the miner and consensus.
//!
//! All mutations of the chain and the pending buffer happen under one write lock,
//! so readers always observe a matching chain/buffer pair.

use crate::blockchain::{Block, Blockchain};
use crate::error::ChainError;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Ledger {
    inner: Arc<RwLock<Blockchain>>,
}

impl Ledger {
    /// Create a ledger holding only the genesis block.
    pub fn new() -> Self {
        Ledger {
            inner: Arc::new(RwLock::new(Blockchain::new())),
        }
    }

    /// Queue a transaction; returns the index of the block that will include it.
    pub fn new_transaction(
        &self,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
    ) -> u64 {
        let tx = Transaction::new(sender, receiver, amount);
        let index = self.inner.write().new_transaction(tx);
        tracing::debug!(index, "transaction queued");
        index
    }

    /// Seal the pending buffer into a new block and append it.
    ///
    /// `previous_hash` defaults to the hash of the last block. The proof is not
    /// checked here; see [`Ledger::forge_on_tip`] for the checked variant.
    pub fn forge_block(&self, proof: u64, previous_hash: Option<String>) -> Block {
        let block = self.inner.write().new_block(proof, previous_hash);
        tracing::info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "block forged"
        );
        block
    }

    /// Forge a block only if the last block still hashes to `parent_hash` and
    /// `proof` solves the puzzle against it. `reward` is queued in the same step.
    ///
    /// Used by mining, where the tip can move while the proof is being searched.
    pub fn forge_on_tip(
        &self,
        parent_hash: &str,
        proof: u64,
        reward: Option<Transaction>,
    ) -> Result<Block, ChainError> {
        let mut chain = self.inner.write();

        let tip_hash = chain.last_block().hash();
        if tip_hash != parent_hash {
            return Err(ChainError::StaleTip {
                expected: parent_hash.to_string(),
                found: tip_hash,
            });
        }

        if !chain.next_proof_is_valid(proof) {
            return Err(ChainError::InvalidProofOfWork(chain.next_index()));
        }

        if let Some(tx) = reward {
            chain.new_transaction(tx);
        }
        let block = chain.new_block(proof, Some(tip_hash));
        drop(chain);

        tracing::info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "block forged"
        );
        Ok(block)
    }

    pub fn last_block(&self) -> Block {
        self.inner.read().last_block().clone()
    }

    /// Snapshot of the full chain.
    pub fn chain(&self) -> Vec<Block> {
        self.inner.read().blocks.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Never true: the genesis block is always present.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.inner.read().current_transactions.clone()
    }

    /// Swap in `candidate` if it is strictly longer than the chain held at the
    /// moment of the swap. The caller is responsible for validating it.
    ///
    /// The pending buffer is kept.
    pub fn replace_if_longer(&self, candidate: Vec<Block>) -> bool {
        let mut chain = self.inner.write();
        let current = chain.len();
        if candidate.len() <= current {
            return false;
        }

        let new_len = candidate.len();
        chain.blocks = candidate;
        drop(chain);

        tracing::info!(old_length = current, new_length = new_len, "chain replaced");
        true
    }
}
