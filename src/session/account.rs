//! Active account session
//!
//! Exactly one signing identity is active at a time. Only `load`,
//! `reconnect` and `disconnect` write it; executors only read.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use super::{Identity, KeyVault};
use crate::{
    errors::{EngineResult, LedgerError},
    network::{retry_with_backoff, LedgerGateway, RetryConfig},
    types::AccountAddress,
    utils::from_base_units,
};

pub struct AccountSession {
    vault: Arc<dyn KeyVault>,
    identity: RwLock<Option<Identity>>,
    balance: RwLock<Option<Decimal>>,
    decimals: u32,
    retry: RetryConfig,
}

impl AccountSession {
    pub fn new(vault: Arc<dyn KeyVault>, decimals: u32) -> Self {
        Self {
            vault,
            identity: RwLock::new(None),
            balance: RwLock::new(None),
            decimals,
            retry: RetryConfig::default(),
        }
    }

    /// Loads the stored identity on first use; later calls return the
    /// active one.
    pub async fn load(&self) -> EngineResult<Identity> {
        let mut active = self.identity.write().await;
        if let Some(identity) = active.as_ref() {
            return Ok(identity.clone());
        }
        let identity = self.vault.load_or_create_identity(None)?;
        info!(address = %identity.address(), "Loaded signing identity");
        *active = Some(identity.clone());
        Ok(identity)
    }

    /// Re-keys the session from `seed`, replacing the active identity.
    pub async fn reconnect(&self, seed: [u8; 32]) -> EngineResult<Identity> {
        let identity = self.vault.load_or_create_identity(Some(seed))?;
        let mut active = self.identity.write().await;
        *active = Some(identity.clone());
        *self.balance.write().await = None;
        info!(address = %identity.address(), "Signing identity replaced");
        Ok(identity)
    }

    pub async fn disconnect(&self) -> EngineResult<()> {
        self.vault.clear()?;
        *self.identity.write().await = None;
        *self.balance.write().await = None;
        info!("Signing identity cleared");
        Ok(())
    }

    pub async fn active_identity(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    pub async fn active_address(&self) -> Option<AccountAddress> {
        self.identity.read().await.as_ref().map(|i| *i.address())
    }

    pub async fn require_identity(&self) -> Result<Identity, LedgerError> {
        self.active_identity()
            .await
            .ok_or(LedgerError::NoActiveIdentity)
    }

    /// Last refreshed balance in whole native-asset units.
    pub async fn balance(&self) -> Option<Decimal> {
        *self.balance.read().await
    }

    pub async fn refresh_balance(&self, gateway: &dyn LedgerGateway) -> Result<Decimal, LedgerError> {
        let identity = self.require_identity().await?;
        let address = *identity.address();

        let units = retry_with_backoff(
            || gateway.balance(&address),
            &self.retry,
            "balance refresh",
        )
        .await
        .inspect_err(|e| warn!(address = %address, error = %e, "Balance refresh failed"))?;

        let balance = from_base_units(units, self.decimals);
        // The identity may have been replaced while the read was in flight.
        if self.active_address().await == Some(address) {
            *self.balance.write().await = Some(balance);
        }
        info!(address = %address, balance = %balance, "Balance refreshed");
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryKeyVault;

    #[tokio::test]
    async fn load_is_lazy_and_stable() {
        let session = AccountSession::new(Arc::new(MemoryKeyVault::with_seed([1; 32])), 8);
        assert!(session.active_identity().await.is_none());
        let first = session.load().await.unwrap();
        let second = session.load().await.unwrap();
        assert_eq!(first.address(), second.address());
    }

    #[tokio::test]
    async fn disconnect_clears_identity() {
        let session = AccountSession::new(Arc::new(MemoryKeyVault::new()), 8);
        session.reconnect([2; 32]).await.unwrap();
        session.disconnect().await.unwrap();
        assert!(matches!(
            session.require_identity().await,
            Err(LedgerError::NoActiveIdentity)
        ));
    }
}
