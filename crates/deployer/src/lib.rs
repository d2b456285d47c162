//! Deploys a set of interdependent contracts in plan order, grants each new
//! contract a capacity allowance with the chain's issuer and persists the
//! resulting addresses and ABIs for downstream services.

pub mod arguments;
pub mod artifacts;
pub mod chain;
pub mod grant;
pub mod orchestrator;
pub mod plan;
pub mod recorder;
pub mod traits;
pub mod verify;

use {
    self::{
        arguments::Arguments,
        artifacts::Artifact,
        chain::RpcChainClient,
        grant::IssuerGrantor,
        orchestrator::{GrantParams, Orchestrator, RunResult},
        plan::Plan,
        recorder::JsonFileRecorder,
        traits::ArtifactRecorder,
        verify::ExplorerClient,
    },
    alloy::{
        network::EthereumWallet,
        providers::{Provider, ProviderBuilder},
        signers::local::PrivateKeySigner,
    },
    anyhow::{Context, Result},
    contracts::{InstanceExt, TRC21Issuer},
    std::{collections::HashMap, path::Path},
};

pub async fn main(args: Arguments) {
    match run(args).await {
        Ok(result) if result.is_success() => (),
        Ok(_) => std::process::exit(1),
        Err(err) => {
            tracing::error!(?err, "deployment could not be started");
            std::process::exit(1);
        }
    }
}

async fn run(args: Arguments) -> Result<RunResult> {
    let plan: Plan = serde_json::from_str(
        &std::fs::read_to_string(&args.plan)
            .with_context(|| format!("failed to read plan {}", args.plan.display()))?,
    )
    .context("malformed plan")?;
    let artifacts = load_artifacts(&plan, &args.artifacts)?;

    let signer: PrivateKeySigner = args.private_key.parse().context("malformed private key")?;
    tracing::info!(account = %signer.address(), "deploying");
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::new(signer))
        .connect_http(args.node_url.clone())
        .erased();

    let issuer = match args.issuer {
        Some(address) => TRC21Issuer::Instance::new(address, provider.clone()),
        None => TRC21Issuer::Instance::deployed(&provider)
            .await
            .context("no well-known issuer for this network, pass --issuer")?,
    };

    let recorder = args
        .config_file
        .as_ref()
        .map(|path| Box::new(JsonFileRecorder::new(path)) as Box<dyn ArtifactRecorder>);
    let orchestrator = Orchestrator::new(
        Box::new(RpcChainClient::new(
            provider.clone(),
            args.confirmation_timeout,
        )),
        Box::new(IssuerGrantor::new(issuer, args.confirmation_timeout)),
        recorder,
        GrantParams {
            value: args.capacity,
            gas_price: args.grant_gas_price,
            gas_limit: args.grant_gas_limit,
        },
    );

    let result = orchestrator.run(&plan, &artifacts).await?;
    report(&result);
    verify_sources(&args, &plan, &result).await;
    Ok(result)
}

fn load_artifacts(plan: &Plan, dir: &Path) -> Result<HashMap<String, Artifact>> {
    let mut artifacts = HashMap::new();
    for step in &plan.steps {
        if artifacts.contains_key(&step.artifact) {
            continue;
        }
        artifacts.insert(step.artifact.clone(), Artifact::load(dir, &step.artifact)?);
    }
    Ok(artifacts)
}

fn report(result: &RunResult) {
    for contract in &result.completed {
        tracing::info!(
            step = %contract.step,
            address = %contract.address,
            grant = ?contract.grant,
            "completed"
        );
    }
    if let Some(failed) = &result.failed {
        tracing::error!(
            step = %failed.step,
            error = ?failed.error,
            "run aborted; completed steps were kept and not rolled back"
        );
    }
}

async fn verify_sources(args: &Arguments, plan: &Plan, result: &RunResult) {
    let (Some(explorer), Some(sources)) = (&args.explorer_url, &args.contract_sources) else {
        return;
    };
    let client = match ExplorerClient::new(reqwest::Client::new(), explorer.clone()) {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(?err, "skipping source verification");
            return;
        }
    };
    for contract in &result.completed {
        let Some(step) = plan.steps.iter().find(|step| step.name == contract.step) else {
            continue;
        };
        let path = sources.join(format!("{}.sol", step.artifact));
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    ?err,
                    "no flattened source, skipping verification"
                );
                continue;
            }
        };
        match client.verify(contract.address, &step.artifact, &source).await {
            Ok(()) => tracing::info!(step = %contract.step, "submitted source for verification"),
            Err(err) => tracing::warn!(step = %contract.step, ?err, "source verification failed"),
        }
    }
}
