//! Issuer-backed capacity grantor.
//!
//! Submits the issuer's `apply` transaction for a newly deployed contract
//! and only reports success once the transaction is confirmed. Gas price and
//! limit always come from the grant itself; gas estimation is deliberately
//! not used because it is unreliable on the small test networks this tool
//! targets.

use {
    crate::traits::{CapacityGrant, CapacityGrantor, GrantOutcome},
    alloy::providers::{PendingTransactionError, WatchTxError},
    contracts::TRC21Issuer,
    std::time::Duration,
};

pub struct IssuerGrantor {
    issuer: TRC21Issuer::Instance,
    /// Upper bound on the confirmation wait. Exceeding it reports
    /// [`GrantOutcome::TimedOut`]: the transaction may still be mined later,
    /// so callers must check on-chain state before submitting the grant
    /// again.
    timeout: Duration,
}

impl IssuerGrantor {
    pub fn new(issuer: TRC21Issuer::Instance, timeout: Duration) -> Self {
        Self { issuer, timeout }
    }
}

#[async_trait::async_trait]
impl CapacityGrantor for IssuerGrantor {
    async fn grant(&self, grant: &CapacityGrant) -> GrantOutcome {
        tracing::debug!(
            beneficiary = %grant.beneficiary,
            value = %grant.value,
            issuer = %self.issuer.address(),
            "applying for capacity"
        );
        let pending = match self
            .issuer
            .apply(grant.beneficiary)
            .value(grant.value)
            .gas_price(grant.gas_price)
            .gas(grant.gas_limit)
            .send()
            .await
        {
            Ok(pending) => pending,
            Err(err) => return GrantOutcome::Failed(err.to_string()),
        };
        match pending.with_timeout(Some(self.timeout)).get_receipt().await {
            Ok(receipt) if receipt.status() => GrantOutcome::Succeeded {
                transaction: receipt.transaction_hash,
            },
            Ok(receipt) => GrantOutcome::Failed(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )),
            Err(PendingTransactionError::TxWatcher(WatchTxError::Timeout)) => {
                GrantOutcome::TimedOut
            }
            Err(err) => GrantOutcome::Failed(err.to_string()),
        }
    }
}
