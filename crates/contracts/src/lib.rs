//! Typed bindings for the well-known contracts the deployment tooling talks
//! to, generated with `alloy::sol!` from the JSON artifacts in `./artifacts`.
//!
//! Contracts created by the deployer itself are handled as opaque artifacts at
//! runtime; only contracts with fixed, well-known addresses get bindings here.

pub mod networks {
    pub const TOMOCHAIN: u64 = 88;
    pub const TOMOCHAIN_TESTNET: u64 = 89;
}

pub use alloy::providers::DynProvider as Provider;

/// Extension trait to attach some useful functions to the contract instance.
pub trait InstanceExt: Sized {
    /// Creates a contract instance at the expected address for the current
    /// network.
    fn deployed(
        provider: &Provider,
    ) -> impl std::future::Future<Output = anyhow::Result<Self>> + Send;
}

#[macro_export]
macro_rules! bindings {
    ($contract:ident, $($deployment_info:expr)?) => {
        paste::paste! {
            // Generate the main bindings in a private module. That allows
            // us to re-export all items in our own module while also adding
            // some items ourselves.
            #[allow(non_snake_case)]
            mod [<$contract Private>] {
                alloy::sol!(
                    #[allow(missing_docs)]
                    #[sol(rpc)]
                    $contract,
                    concat!("./artifacts/", stringify!($contract), ".json"),
                );
            }

            #[allow(non_snake_case)]
            pub mod $contract {
                use alloy::providers::DynProvider;

                pub use super::[<$contract Private>]::*;
                pub type Instance = $contract::[<$contract Instance>]<DynProvider>;

                $(
                use {
                    std::{sync::LazyLock, collections::HashMap},
                    alloy::{
                        providers::Provider,
                        primitives::{address, Address},
                    },
                    anyhow::{Context, Result},
                    $crate::networks::*,
                };

                pub static DEPLOYMENT_INFO: LazyLock<HashMap<u64, Address>> = LazyLock::new(|| {
                    $deployment_info
                });

                impl $crate::InstanceExt for Instance {
                    fn deployed(provider: &DynProvider) -> impl std::future::Future<Output = Result<Self>> + Send {
                        async move {
                            let chain_id = provider
                                .get_chain_id()
                                .await
                                .context("could not fetch current chain id")?;
                            let address = DEPLOYMENT_INFO
                                .get(&chain_id)
                                .with_context(|| format!("no deployment info for chain {chain_id:?}"))?;

                            Ok(Instance::new(
                                address.clone(),
                                provider.clone(),
                            ))
                        }
                    }
                }
                )*
            }
        }
    };
}

bindings!(
    TRC21Issuer,
    maplit::hashmap! {
        TOMOCHAIN => address!("0x8c0faeb5c6bed2129b8674f262fd45c4e9468bee"),
        TOMOCHAIN_TESTNET => address!("0x0e2c88753131ce01c7551b726b28bfd04e44003f"),
    }
);
