//! Example: Approve a multisig proposal
//!
//! Usage: `approve_proposal <keypair.json> <transaction-index> [status] [url]`
//!
//! The multisig is taken from the URL (`?multisig=` or `/squads/{address}`)
//! or from the settings file written by earlier runs.

use anyhow::{anyhow, Context};
use futures::StreamExt;
use squads_client::{
    ClientConfig, FileStore, KeypairWallet, MultisigClient, ProposalStatus, StaticLocation,
    SubmissionStatus,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("squads_client=info")
        .init();

    let mut args = std::env::args().skip(1);
    let keypair_path = args
        .next()
        .ok_or_else(|| anyhow!("missing keypair path"))?;
    let transaction_index: u64 = args
        .next()
        .ok_or_else(|| anyhow!("missing transaction index"))?
        .parse()
        .context("transaction index must be a number")?;
    let status: ProposalStatus = args
        .next()
        .as_deref()
        .unwrap_or("Active")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let location = match args.next() {
        Some(url) => StaticLocation::parse(&url)?,
        None => StaticLocation::empty(),
    };

    println!("=== Squads Proposal Approval ===\n");

    let client = MultisigClient::new(
        ClientConfig::default(),
        Arc::new(FileStore::open("squads-settings.json")?),
        Arc::new(location),
        Arc::new(KeypairWallet::from_file(&keypair_path)?),
    )?;

    let settings = client.settings().resolve()?;
    println!("Network: {}", settings.network);
    println!("RPC URL: {}", settings.rpc_url);
    println!("Program: {}\n", settings.program_id);

    let addresses = client.addresses().require(&settings)?;
    println!("Multisig: {}", addresses.multisig);
    println!("Vault {}: {}\n", addresses.vault_index, addresses.vault);

    let (tx, mut rx) = futures::channel::mpsc::unbounded::<squads_client::SubmissionUpdate>();
    let progress = tokio::spawn(async move {
        while let Some(update) = rx.next().await {
            match update.status {
                SubmissionStatus::Pending => println!("… {}", update.phase),
                SubmissionStatus::Confirmed => println!("✓ {}", update.phase),
                SubmissionStatus::Failed(_) => println!("✗ {}", update.phase),
            }
            if let Some(detail) = update.detail {
                println!("  {}", detail);
            }
        }
    });

    let result = client
        .approve_proposal_with_progress(transaction_index, status, tx)
        .await;
    let _ = progress.await;

    match result {
        Ok(signature) => {
            println!("\n✓ Approved: {}", settings.explorer_tx_url(&signature));
            Ok(())
        }
        Err(e) => {
            eprintln!("\n{}", e.notification());
            Err(e.into())
        }
    }
}
