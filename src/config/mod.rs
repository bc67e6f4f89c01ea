//! Configuration for the passkey wallet engine

pub mod rpc;

use crate::executor::{CONTRACT_CALL_FEE, TX_TIMEOUT_SECONDS};
use crate::poll::PollPolicy;
use crate::rate_limit::InMemoryRateLimiter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Signature verification attempt limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Verification attempts allowed per window, per address
    pub max_attempts: u32,
    /// Window length (seconds)
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 15 * 60,
        }
    }
}

impl RateLimitConfig {
    pub fn build_limiter(&self) -> InMemoryRateLimiter {
        InMemoryRateLimiter::new(self.max_attempts, Duration::from_secs(self.window_seconds))
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network passphrase mixed into every transaction hash
    pub network_passphrase: String,
    pub factory_contract_id: String,
    pub auth_controller_contract_id: String,
    /// Fee for wallet contract calls and deployments (stroops)
    pub contract_call_fee: u64,
    pub tx_timeout_seconds: u64,
    pub rate_limit: RateLimitConfig,
    pub deployment_poll: PollPolicy,
    pub confirmation_poll: PollPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_passphrase: rpc::testnet::NETWORK_PASSPHRASE.to_string(),
            factory_contract_id: String::new(),
            auth_controller_contract_id: String::new(),
            contract_call_fee: CONTRACT_CALL_FEE,
            tx_timeout_seconds: TX_TIMEOUT_SECONDS,
            rate_limit: RateLimitConfig::default(),
            deployment_poll: PollPolicy::DEPLOYMENT,
            confirmation_poll: PollPolicy::CONFIRMATION,
        }
    }
}

impl Config {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Environment values win over file values
    pub fn with_rpc_overrides(mut self, rpc: &RpcConfig) -> Self {
        if let Some(passphrase) = &rpc.network_passphrase {
            self.network_passphrase = passphrase.clone();
        }
        if let Some(factory) = &rpc.factory_contract_id {
            self.factory_contract_id = factory.clone();
        }
        if let Some(controller) = &rpc.auth_controller_contract_id {
            self.auth_controller_contract_id = controller.clone();
        }
        self
    }

    /// Checks the settings needed to provision wallets
    pub fn validate_for_deploy(&self) -> Result<()> {
        if self.factory_contract_id.is_empty() {
            return Err(Error::Config(format!(
                "factory contract id not set (config file or {})",
                rpc::env_vars::FACTORY_CONTRACT_ID
            )));
        }
        if self.auth_controller_contract_id.is_empty() {
            return Err(Error::Config(format!(
                "auth controller contract id not set (config file or {})",
                rpc::env_vars::AUTH_CONTROLLER_CONTRACT_ID
            )));
        }
        self.validate_polling()
    }

    pub fn validate_polling(&self) -> Result<()> {
        for (name, policy) in [
            ("deployment_poll", self.deployment_poll),
            ("confirmation_poll", self.confirmation_poll),
        ] {
            if policy.max_attempts == 0 {
                return Err(Error::Config(format!("{}.max_attempts must be at least 1", name)));
            }
        }
        Ok(())
    }
}
