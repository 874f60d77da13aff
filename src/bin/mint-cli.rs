use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::process::ExitCode;

use provenance_mint::ledger::{Network, SecretString, WalletContext};

#[derive(Parser)]
#[command(name = "mint-cli")]
#[command(about = "Operator CLI for the provenance-mint service", long_about = None)]
struct Cli {
    /// Base URL of a running service.
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Custodial seed phrase.
    #[arg(long, env = "SECRET_SEED", hide_env_values = true, global = true)]
    secret_seed: Option<String>,

    /// Blockfrost project id.
    #[arg(long, env = "BLOCKFROST_KEY", hide_env_values = true, global = true)]
    blockfrost_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the custodial address derived from SECRET_SEED
    DeriveAddress {
        #[arg(short, long, default_value = "preprod")]
        network: Network,

        /// Fail unless the derived address equals this one
        #[arg(long)]
        expect: Option<String>,
    },
    /// Mint a batch token through the service
    Mint {
        #[arg(long)]
        token_name: String,

        /// CIP-25 payload as a JSON object
        #[arg(long)]
        metadata: String,

        /// Minting script template override
        #[arg(long)]
        cbor_hex: Option<String>,
    },
    /// Record a status update through the service
    UpdateStatus {
        #[arg(long)]
        asset_unit: String,

        #[arg(long)]
        status: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        note: Option<String>,

        /// Send the token here instead of back to the custodial address
        #[arg(long)]
        recipient: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let seed = SecretString::from(cli.secret_seed.unwrap_or_default());
    if seed.is_empty() {
        eprintln!("Error: SECRET_SEED is not set");
        return Ok(ExitCode::FAILURE);
    }

    match cli.command {
        Commands::DeriveAddress { network, expect } => {
            let wallet = match WalletContext::derive(seed.expose(), network) {
                Ok(wallet) => wallet,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            let derived = wallet.address().to_bech32();
            println!("{}", derived);
            if let Some(expected) = expect {
                if expected.trim() != derived {
                    eprintln!("Mismatch: expected {}", expected.trim());
                    return Ok(ExitCode::FAILURE);
                }
                eprintln!("Match: seed controls the expected address");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mint {
            token_name,
            metadata,
            cbor_hex,
        } => {
            let key = provider_key(cli.blockfrost_key)?;
            let metadata: Value = serde_json::from_str(&metadata)?;
            let mut body = json!({
                "blockfrostKey": key.expose(),
                "secretSeed": seed.expose(),
                "tokenName": token_name,
                "metadata": metadata,
            });
            if let Some(hex) = cbor_hex {
                body["cborHex"] = Value::String(hex);
            }
            post(&cli.url, "/mint", body).await
        }
        Commands::UpdateStatus {
            asset_unit,
            status,
            description,
            note,
            recipient,
        } => {
            let key = provider_key(cli.blockfrost_key)?;
            let body = json!({
                "blockfrostKey": key.expose(),
                "secretSeed": seed.expose(),
                "assetUnit": asset_unit,
                "metadata": {
                    "status": status,
                    "description": description,
                    "note": note,
                },
                "selfTransfer": recipient.is_none(),
                "recipientAddress": recipient,
            });
            post(&cli.url, "/transfer", body).await
        }
    }
}

fn provider_key(value: Option<String>) -> Result<SecretString, Box<dyn std::error::Error>> {
    let key = SecretString::from(value.unwrap_or_default());
    if key.is_empty() {
        return Err("BLOCKFROST_KEY is not set".into());
    }
    Ok(key)
}

async fn post(base: &str, path: &str, body: Value) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}{}", base.trim_end_matches('/'), path))
        .json(&body)
        .send()
        .await?;

    let status = res.status();
    let retry_after = res
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);

    if status == reqwest::StatusCode::ACCEPTED {
        eprintln!(
            "Outcome unknown: check transaction {} on chain before submitting again",
            json["txHash"].as_str().unwrap_or("-")
        );
        return Ok(ExitCode::from(2));
    }
    if status.is_success() {
        return Ok(ExitCode::SUCCESS);
    }
    match retry_after {
        Some(secs) => eprintln!("Service asked to retry in {}s (status {})", secs, status),
        None => eprintln!("Error: service returned status {}", status),
    }
    Ok(ExitCode::FAILURE)
}
