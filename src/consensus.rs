//! Longest-valid-chain consensus
//!
//! A node pulls the full chain of every known peer and adopts the longest one
//! that is strictly longer than its own and passes validation. Peers that cannot
//! be reached, answer with an error, or send a malformed or invalid chain are
//! skipped. Resolution itself never fails.

use crate::blockchain::{validate_chain, Block};
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::network::PeerAddress;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A peer's chain together with the length it reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerChain {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl PeerChain {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// Where peer chains come from. Failures are reported per peer.
pub trait ChainSource {
    fn fetch_chain(
        &self,
        peer: &PeerAddress,
    ) -> impl Future<Output = Result<PeerChain, ChainError>> + Send;
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub replaced: bool,
    pub chain: Vec<Block>,
}

/// Pick the longest chain that beats `local_len` and every earlier candidate and
/// is valid. Equal lengths keep the first one seen.
pub fn select_longest_valid<'a, I>(local_len: usize, responses: I) -> Option<Vec<Block>>
where
    I: IntoIterator<Item = (&'a PeerAddress, Result<PeerChain, ChainError>)>,
{
    let mut max_length = local_len;
    let mut best = None;

    for (peer, response) in responses {
        let candidate = match response {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "peer skipped");
                continue;
            }
        };

        if candidate.length != candidate.chain.len() {
            tracing::warn!(
                peer = %peer,
                reported = candidate.length,
                actual = candidate.chain.len(),
                "peer skipped: reported length does not match chain"
            );
            continue;
        }

        if candidate.length <= max_length {
            tracing::debug!(peer = %peer, length = candidate.length, max_length, "peer chain not longer");
            continue;
        }

        if let Err(e) = validate_chain(&candidate.chain) {
            tracing::warn!(peer = %peer, length = candidate.length, error = %e, "peer skipped: invalid chain");
            continue;
        }

        max_length = candidate.length;
        best = Some(candidate.chain);
    }

    best
}

pub struct ConsensusResolver<S> {
    source: S,
}

impl<S: ChainSource> ConsensusResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Query all `peers` concurrently and adopt the winning chain, if any.
    ///
    /// The swap re-checks length against the ledger at swap time, so a chain
    /// that grew locally during the fan-out is never shortened.
    pub async fn resolve(&self, ledger: &Ledger, peers: &[PeerAddress]) -> Resolution {
        let local_len = ledger.len();

        let responses = join_all(peers.iter().map(|peer| async move {
            let response = self.source.fetch_chain(peer).await;
            (peer, response)
        }))
        .await;

        let replaced = match select_longest_valid(local_len, responses) {
            Some(chain) => ledger.replace_if_longer(chain),
            None => false,
        };

        if !replaced {
            tracing::debug!(peers = peers.len(), local_len, "local chain is authoritative");
        }

        Resolution {
            replaced,
            chain: ledger.chain(),
        }
    }
}
