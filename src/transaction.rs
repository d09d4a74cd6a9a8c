//! Transaction type carried by blocks

use serde::{Deserialize, Serialize};

/// Sender used by mining reward transactions.
pub const REWARD_SENDER: &str = "0";

/// A value transfer waiting in the pending buffer or sealed in a block.
///
/// No validation is applied: any sender, receiver and amount is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: f64) -> Self {
        Transaction {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
        }
    }

    /// Mining reward paid to `receiver`.
    pub fn reward(receiver: impl Into<String>, amount: f64) -> Self {
        Self::new(REWARD_SENDER, receiver, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}
