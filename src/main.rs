//! Passkey Wallet CLI
//!
//! Command-line interface for provisioning passkey wallets and executing
//! passkey-authorized operations.

use base64::Engine as _;
use clap::{Parser, Subcommand};
use passkey_wallet_engine::config::rpc::env_vars;
use passkey_wallet_engine::ledger::RpcLedgerNode;
use passkey_wallet_engine::{
    keys, AccountProvisioner, Config, DeviceDirectory, Error, FundingAccount, FundingSigner,
    InMemoryDeviceDirectory, ProvisionRequest, Result, RpcConfig, SignatureVerifier,
    TransactionExecutor, TransactionSubmitter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "passkey-wallet")]
#[command(about = "Passkey smart wallet provisioning and execution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a smart wallet for a passkey credential
    Deploy {
        /// Credential id from registration
        #[arg(long)]
        credential_id: String,

        /// COSE public key (base64)
        #[arg(long)]
        public_key: String,

        /// Deployment salt (hex, 32 bytes)
        #[arg(long)]
        salt: Option<String>,

        /// Device id (hex, 32 bytes)
        #[arg(long)]
        device_id: Option<String>,
    },

    /// Verify a passkey assertion for a wallet
    Verify {
        /// Wallet address
        #[arg(long)]
        address: String,

        /// Signature envelope JSON
        #[arg(long)]
        envelope: String,

        /// Expected challenge
        #[arg(long)]
        challenge: String,

        /// Device directory JSON file
        #[arg(long)]
        directory: Option<PathBuf>,
    },

    /// Verify and execute a wallet operation
    Execute {
        /// Wallet address
        #[arg(long)]
        address: String,

        /// Operation JSON
        #[arg(long)]
        operation: String,

        /// Signature envelope JSON
        #[arg(long)]
        signature: String,

        /// Device directory JSON file
        #[arg(long)]
        directory: PathBuf,
    },

    /// Print the device id for a COSE public key
    DeviceId {
        /// COSE public key (base64)
        #[arg(long)]
        public_key: String,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let rpc = RpcConfig::from_env();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_rpc_overrides(&rpc);

    match cli.command {
        Commands::Deploy {
            credential_id,
            public_key,
            salt,
            device_id,
        } => {
            let request = ProvisionRequest {
                credential_id,
                public_key,
                user_id: None,
                salt,
                device_id,
            };
            run_deploy(request, &config, &rpc).await?;
        }
        Commands::Verify {
            address,
            envelope,
            challenge,
            directory,
        } => {
            let directory = match directory {
                Some(path) => load_directory(&path).await?,
                None => InMemoryDeviceDirectory::new(),
            };
            let verifier = build_verifier(&config, directory);
            let verified = verifier.verify(&address, &envelope, &challenge).await;
            verifier.shutdown().await;
            println!("{}", serde_json::json!({ "address": address, "verified": verified }));
        }
        Commands::Execute {
            address,
            operation,
            signature,
            directory,
        } => {
            let directory = load_directory(&directory).await?;
            run_execute(&address, &operation, &signature, directory, &config, &rpc).await?;
        }
        Commands::DeviceId { public_key } => {
            let cose = decode_cose(&public_key)?;
            let point = keys::cose_public_key_to_uncompressed(&cose)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "deviceId": hex::encode(keys::device_id_for_point(&point)),
                    "publicKey": hex::encode(point),
                }))?
            );
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("RPC endpoint: {}", rpc.rpc_url);
        }
    }

    Ok(())
}

async fn run_deploy(request: ProvisionRequest, config: &Config, rpc: &RpcConfig) -> Result<()> {
    config.validate_for_deploy()?;
    let submitter = build_submitter(config, rpc)?;
    let provisioner = AccountProvisioner::new(
        submitter,
        &config.factory_contract_id,
        &config.auth_controller_contract_id,
        config.contract_call_fee,
        config.tx_timeout_seconds,
    )
    .with_poll_policy(config.deployment_poll);

    tracing::info!(
        credential_id = %request.credential_id,
        factory = %config.factory_contract_id,
        "Provisioning smart wallet"
    );

    let result = provisioner.deploy_from_request(request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_execute(
    address: &str,
    operation: &str,
    signature: &str,
    directory: InMemoryDeviceDirectory,
    config: &Config,
    rpc: &RpcConfig,
) -> Result<()> {
    config.validate_polling()?;
    if directory.lookup(address).await?.is_none() {
        tracing::warn!(address = %address, "Address not present in device directory");
    }

    let verifier = build_verifier(config, directory);
    let executor = TransactionExecutor::new(build_submitter(config, rpc)?, verifier.clone())
        .with_fee(config.contract_call_fee, config.tx_timeout_seconds)
        .with_poll_policy(config.confirmation_poll);

    let result = executor.execute(address, operation, signature).await;
    verifier.shutdown().await;

    let hash = result?;
    println!("{}", serde_json::json!({ "address": address, "transactionHash": hash }));
    Ok(())
}

fn build_submitter(config: &Config, rpc: &RpcConfig) -> Result<TransactionSubmitter> {
    let account_id = rpc.funding_account_id.clone().ok_or_else(|| {
        Error::Config(format!(
            "Environment variable {} not set. Required for the funding signer.",
            env_vars::FUNDING_ACCOUNT_ID
        ))
    })?;
    let signer = FundingSigner::from_env(env_vars::FUNDING_SECRET_KEY, account_id)?;
    tracing::info!(account = %signer.account_id(), "Loaded funding signer");

    let node = Arc::new(RpcLedgerNode::new(&rpc.rpc_url)?);

    // Ctrl-C stops confirmation polling instead of killing mid-request
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling confirmation polling");
            on_signal.cancel();
        }
    });

    Ok(TransactionSubmitter::new(
        node,
        Arc::new(FundingAccount::new(signer)),
        config.network_passphrase.clone(),
    )
    .with_cancellation(cancel))
}

fn build_verifier(config: &Config, directory: InMemoryDeviceDirectory) -> SignatureVerifier {
    SignatureVerifier::new(
        Arc::new(config.rate_limit.build_limiter()),
        Arc::new(directory),
    )
}

async fn load_directory(path: &Path) -> Result<InMemoryDeviceDirectory> {
    InMemoryDeviceDirectory::load_from_file(path).await
}

fn decode_cose(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(encoded.trim()))
        .map_err(|_| Error::InvalidArgument("public key must be base64 COSE".to_string()))
}
