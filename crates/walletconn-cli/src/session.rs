//! `walletconn session`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tokio::sync::watch;

use walletconn_connector::{Connector, InMemoryConnector};
use walletconn_core::{identity_library, ActivateOptions, ConnectionManager, ConnectionState, ManagerConfig};
use walletconn_types::ConnectorError;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Chain id the wallet starts on
    #[arg(long, default_value = "0x1")]
    chain_id: String,

    /// Account the wallet exposes (omit with --locked)
    #[arg(long, default_value = "0x0000000000000000000000000000000000000001")]
    account: String,

    /// Wallet exposes no account
    #[arg(long)]
    locked: bool,

    /// Chains the connector accepts (comma separated; empty means any)
    #[arg(long, env = "WALLETCONN_SUPPORTED_CHAINS", value_delimiter = ',')]
    supported: Vec<u64>,

    /// Chains to switch to after activation, in order
    #[arg(long = "switch-chain")]
    switch_chain: Vec<String>,

    /// Emit a connector error after the chain switches
    #[arg(long)]
    fail_with: Option<String>,

    /// Wallet rejects the connection request
    #[arg(long)]
    reject: bool,

    /// Return activation errors instead of resetting state
    #[arg(long, env = "WALLETCONN_THROW_ERRORS")]
    throw_errors: bool,
}

pub async fn run(args: SessionArgs) -> anyhow::Result<()> {
    let mut wallet = InMemoryConnector::new("in-memory")
        .with_chain_id(args.chain_id.clone())
        .with_account((!args.locked).then_some(args.account.as_str()));
    if !args.supported.is_empty() {
        wallet = wallet.with_supported_chain_ids(args.supported.iter().copied());
    }
    if args.reject {
        wallet = wallet.rejecting(ConnectorError::user_rejected());
    }
    let wallet = Arc::new(wallet);

    let manager = ConnectionManager::new(
        ManagerConfig::new()
            .with_transform(identity_library())
            .throw_errors(args.throw_errors),
    );

    let activated = manager
        .activate_with(wallet.clone(), ActivateOptions::new())
        .await;
    print_step("activate", &manager.state())?;
    activated.context("activation failed")?;

    if manager.state().connector.is_none() {
        return Ok(());
    }

    // Every connector event is reconciled into exactly one write, even when
    // the written values equal the stored ones.
    let mut rx = manager.watch();
    for raw in &args.switch_chain {
        rx.borrow_and_update();
        wallet.switch_chain(raw.as_str());
        let state = next_change(&mut rx).await?;
        print_step(&format!("switch-chain {}", raw), &state)?;
    }

    if let Some(message) = &args.fail_with {
        rx.borrow_and_update();
        wallet.events().emit_error(ConnectorError::new(message.clone()));
        let state = next_change(&mut rx).await?;
        print_step("error", &state)?;
    }

    manager.deactivate();
    let state = settle(&manager, |s| s.connector.is_none()).await?;
    print_step("deactivate", &state)?;

    tracing::info!(
        switches = args.switch_chain.len(),
        released = !wallet.is_active(),
        "scripted session finished"
    );
    Ok(())
}

async fn settle(
    manager: &ConnectionManager,
    predicate: impl FnMut(&ConnectionState) -> bool,
) -> anyhow::Result<ConnectionState> {
    let mut rx = manager.watch();
    let state = tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(predicate))
        .await
        .context("timed out waiting for the connection state")??;
    Ok(state.clone())
}

async fn next_change(rx: &mut watch::Receiver<ConnectionState>) -> anyhow::Result<ConnectionState> {
    tokio::time::timeout(SETTLE_TIMEOUT, rx.changed())
        .await
        .context("timed out waiting for the connection state")??;
    let state = rx.borrow_and_update().clone();
    Ok(state)
}

fn print_step(step: &str, state: &ConnectionState) -> anyhow::Result<()> {
    let snapshot = serde_json::to_string(&state.snapshot())?;
    println!("{:<20} {}", step, snapshot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SessionArgs {
        SessionArgs {
            chain_id: "0x1".to_string(),
            account: "0x0000000000000000000000000000000000000001".to_string(),
            locked: false,
            supported: vec![1, 137],
            switch_chain: Vec::new(),
            fail_with: None,
            reject: false,
            throw_errors: false,
        }
    }

    #[tokio::test]
    async fn test_repeated_unsupported_switch_settles() {
        let args = SessionArgs {
            switch_chain: vec!["4".to_string(), "4".to_string()],
            ..args()
        };
        run(args).await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_switch_then_error_settles() {
        let args = SessionArgs {
            switch_chain: vec!["0x89".to_string(), "0x89".to_string()],
            fail_with: Some("bridge dropped".to_string()),
            ..args()
        };
        run(args).await.unwrap();
    }
}
