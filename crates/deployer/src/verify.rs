//! Best-effort source verification on the block explorer.
//!
//! Mirrors the explorer's `POST /api/contracts` endpoint. Verification is an
//! optional side channel; nothing here affects the deployment outcome.

use {
    alloy::primitives::Address,
    anyhow::{Context, Result},
    serde::Serialize,
    url::Url,
};

/// Compiler version selector the explorer expects for the vendored
/// contracts.
const SOLC_VERSION: u32 = 2;
/// Whether the source was compiled with the optimizer enabled.
const OPTIMIZATION: u32 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificationRequest<'a> {
    contract_address: String,
    contract_name: &'a str,
    source_code: &'a str,
    version: u32,
    optimization: u32,
}

pub struct ExplorerClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl ExplorerClient {
    pub fn new(client: reqwest::Client, explorer: Url) -> Result<Self> {
        Ok(Self {
            endpoint: explorer
                .join("api/contracts")
                .context("malformed explorer url")?,
            client,
        })
    }

    /// Submits flattened source for the contract at `address`. The explorer
    /// compiles and matches it asynchronously; a 2xx response only means the
    /// submission was accepted.
    pub async fn verify(&self, address: Address, name: &str, source: &str) -> Result<()> {
        let request = VerificationRequest {
            contract_address: address.to_string(),
            contract_name: name,
            source_code: source,
            version: SOLC_VERSION,
            optimization: OPTIMIZATION,
        };
        self.client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .context("explorer request failed")?
            .error_for_status()
            .context("explorer rejected the verification request")?;
        Ok(())
    }
}
