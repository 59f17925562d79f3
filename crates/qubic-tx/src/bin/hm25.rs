//! Command-line client for the HM25 contract.

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use clap::{Parser, Subcommand};
use qubic_tx::{
    ClientConfig, ContractQuery, ContractQueryClient, HttpRpcTransport, Identity, Seed,
    SubmitClient, TickSource,
    config::{DEFAULT_RPC_URL, DEFAULT_TICK_OFFSET, parse_tick_offset},
    contracts::hm25::{self, CREATE_PROJECT_AMOUNT, CreateProject, GetNumberOfProjects},
    logging::init_tracing,
};
use serde_json::json;
use zeroize::Zeroizing;

/// Reads and writes the HM25 sustainable-projects contract through an RPC gateway.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Gateway base URL.
    #[arg(long, env = "QUBIC_RPC_URL", default_value = DEFAULT_RPC_URL, global = true)]
    rpc_url: String,

    /// Ticks between the current tick and the scheduled tick; overrides `QUBIC_TICK_OFFSET`.
    /// Zero or non-numeric values fall back to the default offset.
    #[arg(long, global = true)]
    tick_offset: Option<String>,

    /// Action to run.
    #[command(subcommand)]
    command: Command,
}

/// CLI actions.
#[derive(Subcommand)]
enum Command {
    /// Prints the current tick info.
    Tick,
    /// Prints the number of registered projects.
    Projects,
    /// Runs a raw contract query and prints the response as base64.
    Query {
        /// Contract index.
        #[arg(long)]
        contract_index: u32,
        /// Function selector.
        #[arg(long)]
        input_type: u16,
        /// Base64 request data.
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Registers a new project.
    CreateProject {
        /// Project title handle.
        #[arg(long)]
        title: u64,
        /// Amount attached to the transaction.
        #[arg(long, default_value_t = CREATE_PROJECT_AMOUNT)]
        amount: i64,
        /// Paying identity.
        #[arg(long, env = "QUBIC_SOURCE_ID")]
        source_id: String,
        /// Seed controlling the paying identity.
        #[arg(
            long,
            env = "QUBIC_SOURCE_SEED",
            hide_env_values = true,
            value_parser = parse_secret
        )]
        seed: Zeroizing<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = client_config(ClientConfig::from_env(), cli.rpc_url, cli.tick_offset.as_deref());

    match cli.command {
        Command::Tick => print_tick(&config).await,
        Command::Projects => print_projects(&config).await,
        Command::Query {
            contract_index,
            input_type,
            data,
        } => print_query(&config, contract_index, input_type, &data).await,
        Command::CreateProject {
            title,
            amount,
            source_id,
            seed,
        } => create_project(&config, title, amount, &source_id, &seed).await,
    }
}

/// Keeps secret flag values in memory that is wiped on drop.
fn parse_secret(text: &str) -> Result<Zeroizing<String>, std::convert::Infallible> {
    Ok(Zeroizing::new(text.to_owned()))
}

/// Applies command-line overrides on top of the environment configuration.
///
/// The tick offset flag follows the same rule as `QUBIC_TICK_OFFSET`.
fn client_config(base: ClientConfig, rpc_url: String, tick_offset: Option<&str>) -> ClientConfig {
    let mut config = base.with_rpc_url(rpc_url);
    if let Some(text) = tick_offset {
        let offset = parse_tick_offset(text).unwrap_or_else(|| {
            tracing::warn!(
                value = text,
                default = DEFAULT_TICK_OFFSET,
                "ignoring invalid tick offset"
            );
            DEFAULT_TICK_OFFSET
        });
        config = config.with_tick_offset(offset);
    }
    config.normalized()
}

/// Prints the gateway's tick info.
async fn print_tick(config: &ClientConfig) -> Result<()> {
    let transport = HttpRpcTransport::from_config(config)?;
    let info = transport
        .tick_info()
        .await
        .context("failed to read tick info")?;
    println!(
        "{}",
        json!({
            "tick": info.tick,
            "duration": info.duration,
            "epoch": info.epoch,
            "initialTick": info.initial_tick,
        })
    );
    Ok(())
}

/// Prints the HM25 project count; an unpopulated contract reads as zero.
async fn print_projects(config: &ClientConfig) -> Result<()> {
    let client = ContractQueryClient::from_config(config)?;
    let projects = client
        .call_or_default(&GetNumberOfProjects)
        .await
        .context("failed to query project count")?;
    println!("{}", json!({ "numberOfProjects": projects.count }));
    Ok(())
}

/// Prints the raw response of an arbitrary contract function.
async fn print_query(
    config: &ClientConfig,
    contract_index: u32,
    input_type: u16,
    data: &str,
) -> Result<()> {
    let request = BASE64_STANDARD
        .decode(data.trim())
        .context("request data is not valid base64")?;
    let query = ContractQuery::new(contract_index, input_type, request)?;
    let client = ContractQueryClient::from_config(config)?;
    let response = client
        .query_raw(&query)
        .await
        .context("contract query failed")?;
    println!(
        "{}",
        json!({
            "responseData": BASE64_STANDARD.encode(&response),
            "length": response.len(),
        })
    );
    Ok(())
}

/// Submits a `CreateProject` call scheduled ahead of the current tick.
async fn create_project(
    config: &ClientConfig,
    title: u64,
    amount: i64,
    source_id: &str,
    seed: &Zeroizing<String>,
) -> Result<()> {
    let source = Identity::from_str(source_id.trim()).context("invalid source identity")?;
    let seed = Seed::from_str(seed.trim()).map_err(|error| anyhow!("invalid seed: {error}"))?;
    let client = SubmitClient::from_config(config)?;
    let receipt = client
        .submit(
            &CreateProject { title },
            &source,
            &seed,
            &hm25::contract_identity(),
            amount,
        )
        .await
        .map_err(|error| {
            anyhow!(
                "create-project failed at stage {} ({}): {error}",
                error.failed_stage(),
                error.kind()
            )
        })?;
    println!(
        "{}",
        json!({
            "transactionId": receipt.transaction_id,
            "scheduledTick": receipt.scheduled_tick,
            "observedTick": receipt.observed_tick,
            "peersBroadcasted": receipt.peers_broadcasted,
        })
    );
    Ok(())
}
