use crate::miner;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 100;

/// `previous_hash` of the genesis block. Not a 64-character hex digest, so it can
/// never collide with a real block hash.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Fixed genesis timestamp (2023-01-01T00:00:00Z) so independently started nodes
/// share the same first block.
pub const GENESIS_TIMESTAMP: f64 = 1_672_531_200.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn genesis() -> Self {
        Block {
            index: 1,
            timestamp: GENESIS_TIMESTAMP,
            transactions: Vec::new(),
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// SHA-256 over the canonical JSON form of the block, as lowercase hex.
    pub fn hash(&self) -> String {
        // Only maps with non-string keys fail to convert, and a block has none.
        let value = serde_json::to_value(self).expect("block fields are all JSON-representable");
        hex::encode(Sha256::digest(canonicalize(value).to_string().as_bytes()))
    }
}

/// Rebuilds every object with its keys in sorted order so the serialized form
/// does not depend on field declaration or insertion order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Unsynchronized chain plus pending buffer. Shared access goes through
/// [`crate::ledger::Ledger`].
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub blocks: Vec<Block>,
    pub current_transactions: Vec<Transaction>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    pub fn new() -> Self {
        Blockchain {
            blocks: vec![Block::genesis()],
            current_transactions: Vec::new(),
        }
    }

    /// Queue a transaction and return the index of the block that will carry it.
    pub fn new_transaction(&mut self, transaction: Transaction) -> u64 {
        self.current_transactions.push(transaction);
        self.next_index()
    }

    /// Seal the pending buffer into a new block and append it.
    ///
    /// `previous_hash` defaults to the hash of the current last block.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash = previous_hash.unwrap_or_else(|| self.last_block().hash());
        let block = Block {
            index: self.next_index(),
            timestamp: now_seconds(),
            transactions: std::mem::take(&mut self.current_transactions),
            proof,
            previous_hash,
        };

        self.blocks.push(block.clone());
        block
    }

    pub fn last_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always contains the genesis block")
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Index the next forged block gets. Derived from the length, not from the
    /// last block's `index`, which an adopted peer chain does not constrain.
    pub fn next_index(&self) -> u64 {
        self.blocks.len() as u64 + 1
    }

    /// Never true: the genesis block is always present.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Proof the next block must build on.
    pub fn last_proof(&self) -> u64 {
        self.last_block().proof
    }

    pub fn next_proof_is_valid(&self, proof: u64) -> bool {
        miner::valid_proof(self.last_proof(), proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            index: 2,
            timestamp: 1_700_000_000.25,
            transactions: vec![Transaction::new("A", "B", 1.0)],
            proof: 35293,
            previous_hash: Block::genesis().hash(),
        }
    }

    #[test]
    fn test_genesis_block() {
        let chain = Blockchain::new();
        let genesis = chain.last_block();

        assert_eq!(chain.len(), 1);
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.is_genesis());
    }

    #[test]
    fn test_genesis_sentinel_is_not_a_hash() {
        let hash = Block::genesis().hash();
        assert_eq!(hash.len(), 64);
        assert_ne!(GENESIS_PREVIOUS_HASH.len(), hash.len());
        assert_ne!(GENESIS_PREVIOUS_HASH, hash);
    }

    #[test]
    fn test_hash_is_lowercase_hex() {
        let hash = sample_block().hash();
        assert_eq!(hash.len(), 64);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = sample_block();
        assert_eq!(block.hash(), block.hash());
        assert_eq!(block.hash(), block.clone().hash());
    }

    #[test]
    fn test_hash_ignores_field_order() {
        let block = sample_block();
        let previous_hash = block.previous_hash.clone();

        // Same logical block decoded from JSON with a different key order.
        let reordered = format!(
            r#"{{"proof":35293,"previous_hash":"{}","transactions":[{{"amount":1.0,"receiver":"B","sender":"A"}}],"timestamp":1700000000.25,"index":2}}"#,
            previous_hash
        );
        let decoded: Block = serde_json::from_str(&reordered).unwrap();

        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.hash());
    }

    #[test]
    fn test_hash_changes_with_any_field() {
        let block = sample_block();
        let base = block.hash();

        let mut changed = block.clone();
        changed.proof += 1;
        assert_ne!(changed.hash(), base);

        let mut changed = block.clone();
        changed.timestamp += 0.5;
        assert_ne!(changed.hash(), base);

        let mut changed = block.clone();
        changed.transactions[0].amount = 2.0;
        assert_ne!(changed.hash(), base);

        let mut changed = block;
        changed.previous_hash = GENESIS_PREVIOUS_HASH.to_string();
        assert_ne!(changed.hash(), base);
    }

    #[test]
    fn test_canonical_form_sorts_nested_keys() {
        let value = serde_json::json!({"b": 1, "a": {"z": true, "y": [ {"d": 0, "c": 1} ]}});
        assert_eq!(
            canonicalize(value).to_string(),
            r#"{"a":{"y":[{"c":1,"d":0}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn test_new_transaction_returns_next_index() {
        let mut chain = Blockchain::new();
        assert_eq!(chain.new_transaction(Transaction::new("A", "B", 1.0)), 2);
        assert_eq!(chain.new_transaction(Transaction::new("B", "C", 2.0)), 2);
        assert_eq!(chain.current_transactions.len(), 2);
    }

    #[test]
    fn test_new_block_consumes_pending() {
        let mut chain = Blockchain::new();
        let genesis_hash = chain.last_block().hash();
        chain.new_transaction(Transaction::new("A", "B", 1.0));

        let block = chain.new_block(12345, None);

        assert_eq!(block.index, 2);
        assert_eq!(block.previous_hash, genesis_hash);
        assert_eq!(block.transactions, vec![Transaction::new("A", "B", 1.0)]);
        assert!(chain.current_transactions.is_empty());
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.last_block(), &block);

        chain.new_transaction(Transaction::new("C", "D", 3.0));
        assert_eq!(chain.current_transactions.len(), 1);
    }

    #[test]
    fn test_next_index_ignores_stored_index() {
        let mut chain = Blockchain::new();
        let mut odd = chain.new_block(1, None);
        odd.index = u64::MAX;
        chain.blocks[1] = odd;

        assert_eq!(chain.new_transaction(Transaction::new("A", "B", 1.0)), 3);
        assert_eq!(chain.new_block(2, None).index, 3);
    }

    #[test]
    fn test_new_block_uses_explicit_previous_hash() {
        let mut chain = Blockchain::new();
        let block = chain.new_block(7, Some("abc".to_string()));
        assert_eq!(block.previous_hash, "abc");
    }
}
