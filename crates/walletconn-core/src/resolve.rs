//! Update parsing: turn a partial connector update into a resolved one
//!
//! Missing fields are queried from the connector concurrently, the chain
//! id is normalized, and the connector's supported-chain restriction is
//! enforced. Nothing here touches shared state.

use walletconn_connector::Connector;
use walletconn_types::{
    normalize_chain_id, ChainId, ConnectorUpdate, ResolvedUpdate, Result, SessionError,
};

pub async fn parse_update(connector: &dyn Connector, update: ConnectorUpdate) -> Result<ResolvedUpdate> {
    let ConnectorUpdate {
        provider,
        chain_id,
        account,
    } = update;

    let (provider, raw_chain_id, account) = tokio::try_join!(
        async {
            match provider {
                Some(provider) => Ok(provider),
                None => connector.get_provider().await,
            }
        },
        async {
            match chain_id {
                Some(chain_id) => Ok(chain_id),
                None => connector.get_chain_id().await,
            }
        },
        async {
            match account {
                Some(account) => Ok(account),
                None => connector.get_account().await,
            }
        },
    )?;

    let chain_id = normalize_chain_id(&raw_chain_id)?;
    ensure_supported(connector, chain_id)?;

    Ok(ResolvedUpdate {
        provider,
        chain_id,
        account,
    })
}

/// Fail with `UnsupportedChainId` if the connector restricts its chains
/// and `chain_id` is not one of them.
pub fn ensure_supported(connector: &dyn Connector, chain_id: ChainId) -> Result<()> {
    match connector.supported_chain_ids() {
        Some(supported) if !supported.contains(&chain_id) => Err(SessionError::UnsupportedChainId {
            chain_id,
            supported: supported.to_vec(),
        }),
        _ => Ok(()),
    }
}
