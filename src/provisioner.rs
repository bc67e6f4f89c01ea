//! Smart wallet provisioning
//!
//! Turns a passkey credential into a wallet contract deployed through the
//! factory. The wallet address is whatever the factory returns; it is never
//! computed locally.

use crate::keys;
use crate::ledger::{verify_contract_exists, InvokeContract, ScAddress, ScVal};
use crate::poll::PollPolicy;
use crate::submit::{ConfirmationKind, SubmitOptions, TransactionSubmitter};
use crate::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Host error markers meaning the auth controller rejected the factory
const CONTROLLER_ERROR_MARKERS: [&str; 3] =
    ["scecMissingValue", "HostContextError", "HostStorageError"];

/// Input to [`AccountProvisioner::deploy`]
#[derive(Debug, Clone)]
pub struct DeployParams {
    pub credential_id: String,
    /// COSE-encoded P-256 public key from registration
    pub public_key_cose: Vec<u8>,
    /// Defaults to SHA-256 of the credential id
    pub salt: Option<[u8; 32]>,
    /// Defaults to SHA-256 of the uncompressed public key
    pub device_id: Option<[u8; 32]>,
}

/// Provisioning request as received from the registration flow
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub credential_id: String,
    /// Base64 COSE key
    pub public_key: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Hex
    #[serde(default)]
    pub salt: Option<String>,
    /// Hex
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Outcome of a successful deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub address: String,
    pub transaction_hash: String,
    /// Always false: deploying an existing wallet fails in simulation
    pub is_existing: bool,
    /// Hex
    pub salt: String,
    /// Hex
    pub device_id: String,
}

/// Ledger-derived wallet state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    Active,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartWalletAccount {
    pub address: String,
    pub status: WalletStatus,
}

/// Deploys smart wallets through the factory contract
pub struct AccountProvisioner {
    submitter: TransactionSubmitter,
    factory_contract_id: String,
    auth_controller_contract_id: String,
    options: SubmitOptions,
}

impl AccountProvisioner {
    pub fn new(
        submitter: TransactionSubmitter,
        factory_contract_id: impl Into<String>,
        auth_controller_contract_id: impl Into<String>,
        fee: u64,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            submitter,
            factory_contract_id: factory_contract_id.into(),
            auth_controller_contract_id: auth_controller_contract_id.into(),
            options: SubmitOptions {
                fee,
                timeout_seconds,
                poll: PollPolicy::DEPLOYMENT,
                kind: ConfirmationKind::Deployment,
            },
        }
    }

    /// Override the confirmation polling policy
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.options.poll = poll;
        self
    }

    pub async fn deploy(&self, params: DeployParams) -> Result<DeployResult> {
        let salt = params
            .salt
            .unwrap_or_else(|| keys::default_salt(&params.credential_id));
        let public_key = keys::cose_public_key_to_uncompressed(&params.public_key_cose)?;
        let device_id = params
            .device_id
            .unwrap_or_else(|| keys::device_id_for_point(&public_key));

        self.ensure_deployed("Factory", &self.factory_contract_id)
            .await?;
        self.ensure_deployed("Auth controller", &self.auth_controller_contract_id)
            .await?;

        let factory = ScAddress::parse(&self.factory_contract_id)?;
        let operation = InvokeContract::new(
            factory,
            "deploy",
            vec![
                ScVal::bytes(salt),
                ScVal::bytes(device_id),
                ScVal::bytes(public_key),
            ],
        );

        info!(
            credential_id = %params.credential_id,
            salt = %hex::encode(salt),
            device_id = %hex::encode(device_id),
            "Deploying smart wallet"
        );

        let confirmed = self
            .submitter
            .submit(operation, self.options)
            .await
            .map_err(rewrite_controller_error)?;

        let address = match confirmed.return_value.as_ref().and_then(ScVal::as_address) {
            Some(address) => address.to_string(),
            None => {
                let got = confirmed
                    .return_value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "no return value".to_string());
                error!(hash = %confirmed.hash, returned = %got, "Factory did not return an address");
                return Err(Error::UnexpectedReturn(format!(
                    "factory deploy returned {} instead of an address",
                    got
                )));
            }
        };

        info!(address = %address, hash = %confirmed.hash, "Smart wallet deployed");
        Ok(DeployResult {
            address,
            transaction_hash: confirmed.hash,
            is_existing: false,
            salt: hex::encode(salt),
            device_id: hex::encode(device_id),
        })
    }

    /// Deploy from the registration flow's request shape
    pub async fn deploy_from_request(&self, request: ProvisionRequest) -> Result<DeployResult> {
        let public_key_cose = base64::engine::general_purpose::STANDARD
            .decode(request.public_key.trim())
            .or_else(|_| {
                base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(request.public_key.trim())
            })
            .map_err(|_| Error::InvalidArgument("publicKey must be base64 COSE".to_string()))?;

        let salt = request.salt.as_deref().map(keys::parse_hex32).transpose()?;
        let device_id = request
            .device_id
            .as_deref()
            .map(keys::parse_hex32)
            .transpose()?;

        if let Some(user_id) = &request.user_id {
            info!(user_id = %user_id, credential_id = %request.credential_id, "Provisioning wallet for user");
        }

        self.deploy(DeployParams {
            credential_id: request.credential_id,
            public_key_cose,
            salt,
            device_id,
        })
        .await
    }

    /// Whether a wallet contract exists at `address`
    pub async fn account_status(&self, address: &str) -> Result<SmartWalletAccount> {
        ScAddress::parse(address)?;
        let exists = verify_contract_exists(self.submitter.node().as_ref(), address).await?;
        Ok(SmartWalletAccount {
            address: address.to_string(),
            status: if exists {
                WalletStatus::Active
            } else {
                WalletStatus::NotFound
            },
        })
    }

    async fn ensure_deployed(&self, name: &str, contract_id: &str) -> Result<()> {
        if verify_contract_exists(self.submitter.node().as_ref(), contract_id).await? {
            return Ok(());
        }
        error!(contract = %contract_id, "{} contract is not deployed", name);
        Err(Error::ContractNotDeployed {
            name: name.to_string(),
            contract_id: contract_id.to_string(),
        })
    }
}

/// Replaces the raw host error with the operator checklist, keeping the
/// transaction context and diagnostic events.
fn rewrite_controller_error(err: Error) -> Error {
    let rendered = err.to_string();
    let Some(marker) = CONTROLLER_ERROR_MARKERS
        .iter()
        .find(|marker| rendered.contains(*marker))
    else {
        return err;
    };

    let (hash, ledger, events) = match err {
        Error::Simulation { events, .. } => (None, None, events),
        Error::TransactionFailed {
            hash,
            ledger,
            events,
        } => (Some(hash), ledger, events),
        other => return other,
    };
    error!(marker = %marker, hash = ?hash, ledger = ?ledger, "Auth controller rejected the factory deployment");
    Error::ControllerMisconfigured {
        detail: marker.to_string(),
        hash,
        ledger,
        events,
    }
}
