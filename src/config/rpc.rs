//! Ledger endpoint configuration
//!
//! Read from environment variables (a `.env` file is loaded by the CLI):
//!
//! ```bash
//! export LEDGER_RPC_URL="https://rpc.example.org"
//! export NETWORK_PASSPHRASE="Public Global Stellar Network ; September 2015"
//! export FACTORY_CONTRACT_ID="C..."
//! export AUTH_CONTROLLER_CONTRACT_ID="C..."
//! export FUNDING_ACCOUNT_ID="G..."
//! export FUNDING_SECRET_KEY="<hex ed25519 seed>"
//! ```
//!
//! Without `LEDGER_RPC_URL` the public testnet endpoint is used, which is
//! rate limited and only suitable for testing.

/// Environment variable names
pub mod env_vars {
    pub const LEDGER_RPC_URL: &str = "LEDGER_RPC_URL";
    pub const NETWORK_PASSPHRASE: &str = "NETWORK_PASSPHRASE";
    pub const FACTORY_CONTRACT_ID: &str = "FACTORY_CONTRACT_ID";
    pub const AUTH_CONTROLLER_CONTRACT_ID: &str = "AUTH_CONTROLLER_CONTRACT_ID";
    pub const FUNDING_ACCOUNT_ID: &str = "FUNDING_ACCOUNT_ID";
    pub const FUNDING_SECRET_KEY: &str = "FUNDING_SECRET_KEY";
}

/// Public testnet (rate limited, for testing only)
pub mod testnet {
    pub const RPC_URL: &str = "https://soroban-testnet.stellar.org";
    pub const NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";
}

/// Endpoint and contract ids taken from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub rpc_url: String,
    pub network_passphrase: Option<String>,
    pub factory_contract_id: Option<String>,
    pub auth_controller_contract_id: Option<String>,
    pub funding_account_id: Option<String>,
}

impl RpcConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let rpc_url = match get(env_vars::LEDGER_RPC_URL) {
            Some(url) => {
                tracing::debug!("Using LEDGER_RPC_URL");
                url
            }
            None => {
                tracing::warn!("No LEDGER_RPC_URL configured, using public testnet RPC (rate limited)");
                testnet::RPC_URL.to_string()
            }
        };

        Self {
            rpc_url,
            network_passphrase: get(env_vars::NETWORK_PASSPHRASE),
            factory_contract_id: get(env_vars::FACTORY_CONTRACT_ID),
            auth_controller_contract_id: get(env_vars::AUTH_CONTROLLER_CONTRACT_ID),
            funding_account_id: get(env_vars::FUNDING_ACCOUNT_ID),
        }
    }

    /// True when falling back to the public testnet
    pub fn is_public_fallback(&self) -> bool {
        self.rpc_url == testnet::RPC_URL
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn falls_back_to_public_testnet() {
        let config = RpcConfig::from_lookup(lookup(&[]));
        assert_eq!(config.rpc_url, testnet::RPC_URL);
        assert!(config.is_public_fallback());
        assert_eq!(config.factory_contract_id, None);
    }

    #[test]
    fn reads_configured_values() {
        let config = RpcConfig::from_lookup(lookup(&[
            (env_vars::LEDGER_RPC_URL, "https://rpc.internal:8000"),
            (env_vars::NETWORK_PASSPHRASE, "Standalone Network"),
            (env_vars::FACTORY_CONTRACT_ID, "CFACTORY"),
            (env_vars::FUNDING_ACCOUNT_ID, "  "),
        ]));
        assert_eq!(config.rpc_url, "https://rpc.internal:8000");
        assert!(!config.is_public_fallback());
        assert_eq!(config.network_passphrase.as_deref(), Some("Standalone Network"));
        assert_eq!(config.factory_contract_id.as_deref(), Some("CFACTORY"));
        assert_eq!(config.funding_account_id, None);
    }
}
