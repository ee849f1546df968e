//! Example: Resolve settings and the selected multisig
//!
//! Usage: `resolve_settings [url]`, e.g.
//! `resolve_settings "https://app.example/#/?network=mainnet&multisig=<address>"`

use squads_client::{ClientConfig, KeypairWallet, MemoryStore, MultisigClient, StaticLocation};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("squads_client=debug")
        .init();

    let location = match std::env::args().nth(1) {
        Some(url) => StaticLocation::parse(&url)?,
        None => StaticLocation::empty(),
    };

    let client = MultisigClient::new(
        ClientConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(location),
        Arc::new(KeypairWallet::disconnected()),
    )?;

    let settings = client.settings().resolve()?;
    println!("{}", serde_json::to_string_pretty(&settings)?);

    match client.addresses().resolve(&settings)? {
        Some(addresses) => println!("{}", serde_json::to_string_pretty(&addresses)?),
        None => println!("No multisig selected"),
    }

    println!("\nChecking {}...", settings.rpc_url);
    match client.health_check().await {
        Ok(_) => println!("✓ Health check passed"),
        Err(e) => eprintln!("✗ Health check failed: {}", e),
    }

    Ok(())
}
