//! Relay client binary: sign a token transfer and have a relayer pay for it.

use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_core::api::{JsonRpcClient, RetryPolicy};
use relay_core::calls::{scale_amount, TokenCall};
use relay_core::signing::ForwardRequestSigner;
use relay_client::{token_decimals, RelayClient, RequestOptions, TransferSender};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Gasless token transfers through a meta-transaction relayer.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Base URL of the relayer API.
    #[arg(long, env = "RELAYER_URL", default_value = "http://localhost:3000")]
    relayer_url: String,

    /// Private key of the user signing the request (hex string, 0x...).
    #[arg(long, env = "SIGNER_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// RPC URL, used to read token decimals.
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// HTTP timeout in seconds. Relaying waits for the receipt.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// ERC-20 `transfer(to, amount)`.
    Transfer {
        #[arg(long)]
        token: Address,
        #[arg(long)]
        to: Address,
        /// Amount in token units, e.g. `1.5`.
        #[arg(long)]
        amount: Decimal,
        /// Token decimals; read from the token via `--rpc-url` when omitted.
        #[arg(long)]
        decimals: Option<u8>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// ERC-721 `transferFrom(signer, to, tokenId)`.
    TransferFrom {
        #[arg(long)]
        token: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        token_id: U256,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print the forwarder nonce of an address (the signer's by default).
    Nonce {
        address: Option<Address>,
    },
    /// Print the relayer's EIP-712 domain.
    Domain,
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// Gas for the inner call.
    #[arg(long)]
    gas: Option<u64>,
    /// Seconds the signature stays valid.
    #[arg(long)]
    valid_for: Option<u64>,
}

impl From<&RequestArgs> for RequestOptions {
    fn from(args: &RequestArgs) -> Self {
        RequestOptions {
            gas: args.gas,
            valid_for_secs: args.valid_for,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "relay_client=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client = RelayClient::new(&cli.relayer_url, Duration::from_secs(cli.timeout_secs))?;

    match &cli.command {
        Command::Domain => {
            let domain = client.domain().await?;
            println!("{}", serde_json::to_string_pretty(&domain)?);
        }
        Command::Nonce { address } => {
            let address = match address {
                Some(address) => *address,
                None => signer_key(&cli)?.address(),
            };
            println!("{}", client.nonce(address).await?);
        }
        Command::Transfer {
            token,
            to,
            amount,
            decimals,
            request,
        } => {
            let decimals = match decimals {
                Some(decimals) => *decimals,
                None => {
                    let rpc_url = cli
                        .rpc_url
                        .as_deref()
                        .context("--decimals or --rpc-url is required for ERC-20 transfers")?;
                    let rpc = JsonRpcClient::new(rpc_url, Duration::from_secs(15), RetryPolicy::default())?;
                    token_decimals(&rpc, *token).await?
                }
            };
            let call = TokenCall::Transfer {
                to: *to,
                amount: scale_amount(*amount, decimals)?,
            };
            send(&cli, client, *token, call, request.into()).await?;
        }
        Command::TransferFrom {
            token,
            to,
            token_id,
            request,
        } => {
            let from = signer_key(&cli)?.address();
            let call = TokenCall::TransferFrom {
                from,
                to: *to,
                token_id: *token_id,
            };
            send(&cli, client, *token, call, request.into()).await?;
        }
    }

    Ok(())
}

fn signer_key(cli: &Cli) -> Result<PrivateKeySigner> {
    let key = cli
        .private_key
        .as_deref()
        .context("missing signer key: provide --private-key or set SIGNER_PRIVATE_KEY")?;
    key.trim().parse().context("invalid signer private key")
}

async fn send(
    cli: &Cli,
    client: RelayClient,
    token: Address,
    call: TokenCall,
    options: RequestOptions,
) -> Result<()> {
    let domain = client.domain().await.context("Failed to fetch relayer domain")?;
    let signer = ForwardRequestSigner::new(signer_key(cli)?, domain);
    let sender = TransferSender::new(client, signer);

    let receipt = sender.send(token, &call, options).await?;
    println!("{}", receipt.tx_hash);
    Ok(())
}
