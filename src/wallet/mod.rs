//! Funding account management
//!
//! The funding account pays for every deployment and contract call. Its
//! secret key never leaves [`FundingSigner`].

mod signer;

pub use signer::FundingSigner;

use tokio::sync::{Mutex, MutexGuard};

/// Funding signer plus the broker handing out its sequence numbers.
///
/// A node only advances the account sequence once a transaction lands in a
/// ledger, so the sequence it reports lags behind transactions still in the
/// pending queue. The broker remembers the last sequence the node accepted
/// and builds on whichever is higher. Confirmation polling happens after the
/// lease is released.
#[derive(Debug)]
pub struct FundingAccount {
    signer: FundingSigner,
    last_sent: Mutex<Option<i64>>,
}

/// Exclusive right to the funding account's next sequence number.
///
/// Dropping the lease without [`commit`](Self::commit) leaves the broker
/// unchanged, which rolls back a sequence whose transaction never reached
/// the node.
pub struct SequenceLease<'a> {
    last_sent: MutexGuard<'a, Option<i64>>,
}

impl SequenceLease<'_> {
    /// Sequence to build the next transaction on
    pub fn base(&self, node_sequence: i64) -> i64 {
        match *self.last_sent {
            Some(last) => last.max(node_sequence),
            None => node_sequence,
        }
    }

    /// Records that the node accepted a transaction using `sequence`
    pub fn commit(&mut self, sequence: i64) {
        *self.last_sent = Some(sequence);
    }
}

impl FundingAccount {
    pub fn new(signer: FundingSigner) -> Self {
        Self {
            signer,
            last_sent: Mutex::new(None),
        }
    }

    pub fn signer(&self) -> &FundingSigner {
        &self.signer
    }

    pub fn account_id(&self) -> &str {
        self.signer.account_id()
    }

    /// Waits for exclusive use of the account's next sequence number
    pub async fn lease(&self) -> SequenceLease<'_> {
        SequenceLease {
            last_sent: self.last_sent.lock().await,
        }
    }
}
