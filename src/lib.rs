//! Passkey Wallet Engine
//!
//! Provisions passkey-controlled smart wallets and executes operations on
//! their behalf:
//! - Converts WebAuthn COSE keys into the on-chain key format
//! - Deploys wallets through a factory contract
//! - Verifies passkey assertions before any wallet operation
//! - Drives simulate, assemble, sign, send and confirm for every transaction
//!
//! # Security Model
//!
//! - Signature verification is rate limited and fails closed with a uniform result
//! - The funding secret never leaves the `wallet` module
//! - Sequence numbers are brokered per funding account, so pending transactions never reuse one
//! - Wallet addresses come only from the factory's return value

pub mod config;
pub mod directory;
pub mod executor;
pub mod keys;
pub mod ledger;
pub mod poll;
pub mod provisioner;
pub mod rate_limit;
pub mod submit;
pub mod verifier;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{Config, RpcConfig};
pub use directory::{DeviceDirectory, DeviceRecord, InMemoryDeviceDirectory};
pub use error::{Error, Result};
pub use executor::{PendingOperation, TransactionExecutor};
pub use poll::PollPolicy;
pub use provisioner::{AccountProvisioner, DeployParams, DeployResult, ProvisionRequest};
pub use rate_limit::{InMemoryRateLimiter, RateLimitStatus, RateLimiter};
pub use submit::TransactionSubmitter;
pub use verifier::SignatureVerifier;
pub use wallet::{FundingAccount, FundingSigner};
