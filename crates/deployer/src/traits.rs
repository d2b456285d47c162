//! Trait definitions for external system boundaries.
//!
//! These traits abstract the chain node, the issuer contract and artifact
//! persistence to enable unit testing with mocks.

use {
    crate::{artifacts::Artifact, plan::ArgValue},
    alloy::primitives::{Address, B256, U256},
    anyhow::Result,
};

/// A single authorization transaction against the issuer contract.
///
/// Grants are additive on-chain: submitting the same grant twice increases
/// the beneficiary's allowance twice. Callers must not blindly retry a grant
/// whose outcome is unknown without checking on-chain state first.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityGrant {
    pub beneficiary: Address,
    /// Allowance in wei.
    pub value: U256,
    /// Explicit gas price in wei. Gas estimation is unreliable on the small
    /// test networks this tool targets, so both gas parameters are always
    /// supplied by the caller.
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// Outcome of a capacity grant. Only `Succeeded` means the transaction was
/// confirmed. `TimedOut` means the transaction may still land later.
#[derive(Debug, Clone, PartialEq)]
pub enum GrantOutcome {
    Succeeded { transaction: B256 },
    Failed(String),
    TimedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("deployment transaction rejected or reverted: {0}")]
    Rejected(String),
    #[error("no contract address in receipt for transaction {0}")]
    NoAddress(B256),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Abstracts contract creation on the chain node.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Deploys the artifact's creation bytecode with the given, fully
    /// resolved constructor arguments. Returns the new contract address once
    /// the deployment transaction is confirmed.
    async fn deploy(&self, artifact: &Artifact, args: &[ArgValue]) -> Result<Address, DeployError>;
}

/// Abstracts the issuer contract granting capacity allowances.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CapacityGrantor: Send + Sync {
    /// Submits one authorization transaction. Never retries internally.
    async fn grant(&self, grant: &CapacityGrant) -> GrantOutcome;
}

/// Persists deployment outputs for downstream consumers.
///
/// Atomicity and ordering per key is the recorder's contract. The
/// orchestrator only guarantees that it persists each step before starting
/// the next one.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArtifactRecorder: Send + Sync {
    async fn persist(&self, key: &str, value: &serde_json::Value) -> Result<()>;
}
