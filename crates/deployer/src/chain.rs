//! Chain client backed by an alloy provider.
//!
//! Deploys creation bytecode with ABI-encoded constructor arguments and only
//! reports an address once the deployment transaction is confirmed. The ABI
//! stays opaque except for the constructor inputs, which are needed to
//! encode the arguments.

use {
    crate::{
        artifacts::Artifact,
        plan::ArgValue,
        traits::{ChainClient, DeployError},
    },
    alloy::{
        dyn_abi::{DynSolValue, JsonAbiExt},
        json_abi::JsonAbi,
        network::TransactionBuilder,
        primitives::Address,
        providers::{DynProvider, Provider},
        rpc::types::TransactionRequest,
    },
    anyhow::Context,
    std::time::Duration,
};

pub struct RpcChainClient {
    provider: DynProvider,
    /// Upper bound on the confirmation wait per deployment transaction.
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(provider: DynProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait::async_trait]
impl ChainClient for RpcChainClient {
    async fn deploy(&self, artifact: &Artifact, args: &[ArgValue]) -> Result<Address, DeployError> {
        let code = encode_deployment(artifact, args)?;
        let request = TransactionRequest::default().with_deploy_code(code);
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|err| DeployError::Rejected(err.to_string()))?;
        let receipt = pending
            .with_timeout(Some(self.timeout))
            .get_receipt()
            .await
            .map_err(|err| DeployError::Rejected(err.to_string()))?;
        if !receipt.status() {
            return Err(DeployError::Rejected(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        receipt
            .contract_address
            .ok_or(DeployError::NoAddress(receipt.transaction_hash))
    }
}

/// Creation bytecode followed by the ABI-encoded constructor arguments.
fn encode_deployment(artifact: &Artifact, args: &[ArgValue]) -> anyhow::Result<Vec<u8>> {
    let mut code = artifact.bytecode.to_vec();
    let abi: JsonAbi = serde_json::from_value(artifact.abi.clone())
        .with_context(|| format!("artifact {} has a malformed ABI", artifact.name))?;
    match &abi.constructor {
        Some(constructor) => {
            let values: Vec<_> = args.iter().map(to_sol_value).collect();
            let encoded = constructor.abi_encode_input(&values).with_context(|| {
                format!(
                    "constructor arguments for artifact {} do not match its ABI",
                    artifact.name
                )
            })?;
            code.extend(encoded);
        }
        None if args.is_empty() => (),
        None => anyhow::bail!(
            "artifact {} has no constructor but {} arguments were supplied",
            artifact.name,
            args.len()
        ),
    }
    Ok(code)
}

fn to_sol_value(arg: &ArgValue) -> DynSolValue {
    match arg {
        ArgValue::Address(value) => DynSolValue::Address(*value),
        ArgValue::Uint(value) => DynSolValue::Uint(*value, 256),
        ArgValue::Bool(value) => DynSolValue::Bool(*value),
        ArgValue::String(value) => DynSolValue::String(value.clone()),
    }
}
