//! Executes a validated deployment plan step by step: deploy, optionally
//! grant capacity, persist, advance.
//!
//! Steps run strictly sequentially. Every step may depend on an address
//! produced by an earlier one, and the signing account tolerates only one
//! in-flight transaction at a time, so there is no parallelism here on
//! purpose. Nothing is ever retried automatically; retry policy belongs to
//! the caller, operating on the returned [`RunResult`].

use {
    crate::{
        artifacts::Artifact,
        plan::{Arg, ArgValue, DeploymentStep, Plan, PlanError},
        traits::{
            ArtifactRecorder,
            CapacityGrant,
            CapacityGrantor,
            ChainClient,
            DeployError,
            GrantOutcome,
        },
    },
    alloy::primitives::{Address, U256},
    std::collections::HashMap,
};

/// Allowance and gas parameters applied to every capacity grant of a run.
#[derive(Debug, Clone)]
pub struct GrantParams {
    pub value: U256,
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// Record of one successfully deployed contract. Created exactly once per
/// step and immutable afterwards.
#[derive(Debug, Clone)]
pub struct DeployedContract {
    pub step: String,
    pub address: Address,
    pub abi: serde_json::Value,
    /// Outcome of the follow-up capacity grant, `None` when the step did not
    /// request one. A failed or timed-out grant leaves the contract deployed
    /// and usable; the allowance can be granted separately later.
    pub grant: Option<GrantOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Deploy(#[from] DeployError),
    /// A placeholder referenced a step that has not completed yet. Plan
    /// validation makes this unreachable for valid plans; hitting it is a
    /// programming error.
    #[error("unresolved reference to step {0:?}")]
    UnresolvedReference(String),
    #[error("step references unknown artifact {0:?}")]
    UnknownArtifact(String),
}

/// What a run produced. Partial-success tolerant: completed steps are never
/// rolled back when a later step fails, and callers must inspect the result
/// instead of assuming an all-or-nothing outcome.
#[derive(Debug)]
pub struct RunResult {
    /// Completed steps in execution order.
    pub completed: Vec<DeployedContract>,
    pub failed: Option<FailedStep>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

#[derive(Debug)]
pub struct FailedStep {
    pub step: String,
    pub error: StepError,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StepState {
    Deploying,
    Deployed,
    GrantPending,
    Granted,
    GrantFailed,
    DeployFailed,
}

fn transition(step: &str, state: StepState) {
    tracing::debug!(step, ?state, "step state");
}

pub struct Orchestrator {
    chain: Box<dyn ChainClient>,
    grantor: Box<dyn CapacityGrantor>,
    recorder: Option<Box<dyn ArtifactRecorder>>,
    grant_params: GrantParams,
}

impl Orchestrator {
    pub fn new(
        chain: Box<dyn ChainClient>,
        grantor: Box<dyn CapacityGrantor>,
        recorder: Option<Box<dyn ArtifactRecorder>>,
        grant_params: GrantParams,
    ) -> Self {
        Self {
            chain,
            grantor,
            recorder,
            grant_params,
        }
    }

    /// Validates the plan and executes it in a topological order.
    ///
    /// Validation errors surface before any transaction is sent. A
    /// deployment failure stops the run and is reported in the result
    /// together with all prior progress. A grant failure is recorded on the
    /// affected step and does not stop the run. Each completed step is
    /// persisted before the next one starts, so a crash mid-run leaves prior
    /// steps durably recorded.
    pub async fn run(
        &self,
        plan: &Plan,
        artifacts: &HashMap<String, Artifact>,
    ) -> Result<RunResult, PlanError> {
        let order = plan.execution_order()?;
        let mut addresses = HashMap::new();
        let mut completed = Vec::new();
        for index in order {
            let step = &plan.steps[index];
            match self.execute_step(step, &addresses, artifacts).await {
                Ok(contract) => {
                    addresses.insert(step.name.clone(), contract.address);
                    self.record(&contract).await;
                    completed.push(contract);
                }
                Err(error) => {
                    transition(&step.name, StepState::DeployFailed);
                    tracing::error!(step = %step.name, ?error, "step failed, aborting run");
                    return Ok(RunResult {
                        completed,
                        failed: Some(FailedStep {
                            step: step.name.clone(),
                            error,
                        }),
                    });
                }
            }
        }
        Ok(RunResult {
            completed,
            failed: None,
        })
    }

    async fn execute_step(
        &self,
        step: &DeploymentStep,
        addresses: &HashMap<String, Address>,
        artifacts: &HashMap<String, Artifact>,
    ) -> Result<DeployedContract, StepError> {
        let args = resolve_args(&step.constructor_args, addresses)?;
        let artifact = artifacts
            .get(&step.artifact)
            .ok_or_else(|| StepError::UnknownArtifact(step.artifact.clone()))?;

        transition(&step.name, StepState::Deploying);
        let address = self.chain.deploy(artifact, &args).await?;
        transition(&step.name, StepState::Deployed);
        tracing::info!(step = %step.name, %address, "deployed");

        let grant = if step.grant_capacity {
            transition(&step.name, StepState::GrantPending);
            let grant = CapacityGrant {
                beneficiary: address,
                value: self.grant_params.value,
                gas_price: self.grant_params.gas_price,
                gas_limit: self.grant_params.gas_limit,
            };
            let outcome = self.grantor.grant(&grant).await;
            match &outcome {
                GrantOutcome::Succeeded { transaction } => {
                    transition(&step.name, StepState::Granted);
                    tracing::info!(step = %step.name, %transaction, "capacity granted");
                }
                GrantOutcome::Failed(reason) => {
                    transition(&step.name, StepState::GrantFailed);
                    tracing::warn!(
                        step = %step.name,
                        %reason,
                        "capacity grant failed; the contract stays deployed and the grant can \
                         be submitted separately"
                    );
                }
                GrantOutcome::TimedOut => {
                    transition(&step.name, StepState::GrantFailed);
                    tracing::warn!(
                        step = %step.name,
                        "capacity grant not confirmed in time; check on-chain state before \
                         granting again, the transaction may still be mined"
                    );
                }
            }
            Some(outcome)
        } else {
            None
        };

        Ok(DeployedContract {
            step: step.name.clone(),
            address,
            abi: artifact.abi.clone(),
            grant,
        })
    }

    async fn record(&self, contract: &DeployedContract) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let entries = [
            (
                config_key(&contract.step, "ADDRESS"),
                serde_json::Value::String(contract.address.to_string()),
            ),
            (config_key(&contract.step, "ABI"), contract.abi.clone()),
        ];
        for (key, value) in entries {
            if let Err(err) = recorder.persist(&key, &value).await {
                tracing::error!(step = %contract.step, key, ?err, "failed to persist output");
            }
        }
    }
}

/// Key under which a step's output is persisted in the shared configuration,
/// e.g. `PRIVACY_SMART_CONTRACT_ADDRESS` for a step named `privacy`.
pub fn config_key(step: &str, suffix: &str) -> String {
    format!("{}_SMART_CONTRACT_{}", step.to_uppercase(), suffix)
}

fn resolve_args(
    args: &[Arg],
    addresses: &HashMap<String, Address>,
) -> Result<Vec<ArgValue>, StepError> {
    args.iter()
        .map(|arg| match arg {
            Arg::Value(value) => Ok(value.clone()),
            Arg::ContractAddress(name) => addresses
                .get(name)
                .map(|address| ArgValue::Address(*address))
                .ok_or_else(|| StepError::UnresolvedReference(name.clone())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::traits::{MockArtifactRecorder, MockCapacityGrantor, MockChainClient},
        alloy::primitives::{B256, address},
        mockall::Sequence,
        std::sync::{Arc, Mutex},
    };

    const TOKEN: Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const ANONYMIZER: Address = address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

    fn artifact(name: &str) -> Artifact {
        Artifact {
            name: name.to_string(),
            abi: serde_json::json!([{ "type": "fallback" }]),
            bytecode: vec![0x60, 0x80].into(),
        }
    }

    fn artifacts(names: &[&str]) -> HashMap<String, Artifact> {
        names
            .iter()
            .map(|name| (name.to_string(), artifact(name)))
            .collect()
    }

    fn step(name: &str) -> DeploymentStep {
        DeploymentStep {
            name: name.to_string(),
            artifact: name.to_string(),
            constructor_args: vec![],
            depends_on: vec![],
            grant_capacity: false,
        }
    }

    fn grant_params() -> GrantParams {
        GrantParams {
            value: U256::from(10_000_000_000_000_000_000_u128),
            gas_price: 250_000_000,
            gas_limit: 2_000_000,
        }
    }

    fn orchestrator(
        chain: MockChainClient,
        grantor: MockCapacityGrantor,
        recorder: Option<MockArtifactRecorder>,
    ) -> Orchestrator {
        Orchestrator::new(
            Box::new(chain),
            Box::new(grantor),
            recorder.map(|recorder| Box::new(recorder) as Box<dyn ArtifactRecorder>),
            grant_params(),
        )
    }

    #[tokio::test]
    async fn invalid_plan_sends_no_transactions() {
        // No expectations at all: any deploy or grant call panics the test.
        let orchestrator = orchestrator(MockChainClient::new(), MockCapacityGrantor::new(), None);

        let mut a = step("a");
        a.depends_on = vec!["b".to_string()];
        let mut b = step("b");
        b.depends_on = vec!["a".to_string()];
        let plan = Plan { steps: vec![a, b] };

        let result = orchestrator.run(&plan, &artifacts(&["a", "b"])).await;
        assert!(matches!(result, Err(PlanError::CyclicDependency(_))));
    }

    #[tokio::test]
    async fn deploys_in_order_and_grants_capacity() {
        observe::tracing::initialize_reentrant("warn,deployer=debug");
        let mut chain = MockChainClient::new();
        let mut sequence = Sequence::new();
        chain
            .expect_deploy()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|artifact, args| artifact.name == "TRC21Token" && args.is_empty())
            .returning(|_, _| Ok(TOKEN));
        chain
            .expect_deploy()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|artifact, args| {
                // The placeholder has been resolved to the token's address.
                artifact.name == "PrivacyCT"
                    && args == [ArgValue::Address(TOKEN), ArgValue::Bool(true)]
            })
            .returning(|_, _| Ok(ANONYMIZER));

        let mut grantor = MockCapacityGrantor::new();
        grantor
            .expect_grant()
            .times(1)
            .withf(|grant| {
                *grant
                    == CapacityGrant {
                        beneficiary: ANONYMIZER,
                        value: grant_params().value,
                        gas_price: grant_params().gas_price,
                        gas_limit: grant_params().gas_limit,
                    }
            })
            .returning(|_| GrantOutcome::Succeeded {
                transaction: B256::ZERO,
            });

        let mut token = step("token");
        token.artifact = "TRC21Token".to_string();
        let mut anonymizer = step("anonymizer");
        anonymizer.artifact = "PrivacyCT".to_string();
        anonymizer.constructor_args = vec![
            Arg::ContractAddress("token".to_string()),
            Arg::Value(ArgValue::Bool(true)),
        ];
        anonymizer.grant_capacity = true;
        let plan = Plan {
            steps: vec![token, anonymizer],
        };

        let result = orchestrator(chain, grantor, None)
            .run(&plan, &artifacts(&["TRC21Token", "PrivacyCT"]))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.completed.len(), 2);
        assert_eq!(result.completed[0].step, "token");
        assert_eq!(result.completed[0].address, TOKEN);
        assert_eq!(result.completed[0].grant, None);
        assert_eq!(result.completed[1].step, "anonymizer");
        assert_eq!(result.completed[1].address, ANONYMIZER);
        assert_eq!(
            result.completed[1].grant,
            Some(GrantOutcome::Succeeded {
                transaction: B256::ZERO,
            })
        );
    }

    #[tokio::test]
    async fn first_step_failure_prevents_dependent_deploys() {
        let mut chain = MockChainClient::new();
        chain
            .expect_deploy()
            .times(1)
            .withf(|artifact, _| artifact.name == "token")
            .returning(|_, _| Err(DeployError::Rejected("insufficient funds".to_string())));

        let token = step("token");
        let mut anonymizer = step("anonymizer");
        anonymizer.constructor_args = vec![Arg::ContractAddress("token".to_string())];
        let plan = Plan {
            steps: vec![token, anonymizer],
        };

        let result = orchestrator(chain, MockCapacityGrantor::new(), None)
            .run(&plan, &artifacts(&["token", "anonymizer"]))
            .await
            .unwrap();

        assert!(result.completed.is_empty());
        let failed = result.failed.unwrap();
        assert_eq!(failed.step, "token");
        assert!(matches!(failed.error, StepError::Deploy(_)));
    }

    #[tokio::test]
    async fn completed_steps_are_persisted_before_the_next_deploy() {
        let mut sequence = Sequence::new();
        let mut chain = MockChainClient::new();
        let mut recorder = MockArtifactRecorder::new();

        chain
            .expect_deploy()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|artifact, _| artifact.name == "token")
            .returning(|_, _| Ok(TOKEN));
        recorder
            .expect_persist()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|key, value| {
                key == "TOKEN_SMART_CONTRACT_ADDRESS"
                    && *value == serde_json::Value::String(TOKEN.to_string())
            })
            .returning(|_, _| Ok(()));
        recorder
            .expect_persist()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|key, _| key == "TOKEN_SMART_CONTRACT_ABI")
            .returning(|_, _| Ok(()));
        chain
            .expect_deploy()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|artifact, _| artifact.name == "anonymizer")
            .returning(|_, _| Err(DeployError::Rejected("reverted".to_string())));

        let plan = Plan {
            steps: vec![step("token"), step("anonymizer")],
        };

        let result = orchestrator(chain, MockCapacityGrantor::new(), Some(recorder))
            .run(&plan, &artifacts(&["token", "anonymizer"]))
            .await
            .unwrap();

        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].step, "token");
        assert_eq!(result.failed.unwrap().step, "anonymizer");
    }

    #[tokio::test]
    async fn grant_failure_does_not_stop_the_run() {
        let mut chain = MockChainClient::new();
        chain
            .expect_deploy()
            .times(1)
            .withf(|artifact, _| artifact.name == "token")
            .returning(|_, _| Ok(TOKEN));
        chain
            .expect_deploy()
            .times(1)
            .withf(|artifact, _| artifact.name == "anonymizer")
            .returning(|_, _| Ok(ANONYMIZER));

        let mut grantor = MockCapacityGrantor::new();
        grantor
            .expect_grant()
            .times(2)
            .returning(|grant| {
                if grant.beneficiary == TOKEN {
                    GrantOutcome::Failed("out of gas".to_string())
                } else {
                    GrantOutcome::TimedOut
                }
            });

        let mut token = step("token");
        token.grant_capacity = true;
        let mut anonymizer = step("anonymizer");
        anonymizer.grant_capacity = true;
        let plan = Plan {
            steps: vec![token, anonymizer],
        };

        let result = orchestrator(chain, grantor, None)
            .run(&plan, &artifacts(&["token", "anonymizer"]))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.completed.len(), 2);
        assert_eq!(
            result.completed[0].grant,
            Some(GrantOutcome::Failed("out of gas".to_string()))
        );
        assert_eq!(result.completed[1].grant, Some(GrantOutcome::TimedOut));
    }

    #[tokio::test]
    async fn grants_are_submitted_independently_not_merged() {
        let mut chain = MockChainClient::new();
        chain.expect_deploy().times(2).returning({
            let mut addresses = vec![ANONYMIZER, TOKEN];
            move |_, _| Ok(addresses.pop().unwrap())
        });

        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut grantor = MockCapacityGrantor::new();
        grantor.expect_grant().times(2).returning({
            let calls = calls.clone();
            move |grant| {
                calls.lock().unwrap().push(grant.clone());
                GrantOutcome::Succeeded {
                    transaction: B256::ZERO,
                }
            }
        });

        let mut first = step("a");
        first.grant_capacity = true;
        let mut second = step("b");
        second.grant_capacity = true;
        let plan = Plan {
            steps: vec![first, second],
        };

        let result = orchestrator(chain, grantor, None)
            .run(&plan, &artifacts(&["a", "b"]))
            .await
            .unwrap();
        assert!(result.is_success());

        // Two independent, additive authorizations with unchanged values.
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].beneficiary, TOKEN);
        assert_eq!(calls[1].beneficiary, ANONYMIZER);
        assert_eq!(calls[0].value, grant_params().value);
        assert_eq!(calls[1].value, grant_params().value);
    }

    #[tokio::test]
    async fn unknown_artifact_fails_the_step() {
        let orchestrator = orchestrator(MockChainClient::new(), MockCapacityGrantor::new(), None);
        let plan = Plan {
            steps: vec![step("token")],
        };

        let result = orchestrator.run(&plan, &HashMap::new()).await.unwrap();
        assert!(result.completed.is_empty());
        assert!(matches!(
            result.failed.unwrap().error,
            StepError::UnknownArtifact(_)
        ));
    }

    #[test]
    fn unresolved_placeholder_reports_the_missing_step() {
        let mut addresses = HashMap::new();
        addresses.insert("token".to_string(), TOKEN);
        let args = [
            Arg::Value(ArgValue::Bool(true)),
            Arg::ContractAddress("anonymizer".to_string()),
        ];

        let error = resolve_args(&args, &addresses).unwrap_err();
        assert!(matches!(
            error,
            StepError::UnresolvedReference(step) if step == "anonymizer"
        ));
    }

    #[tokio::test]
    async fn recorder_failure_is_not_fatal() {
        let mut chain = MockChainClient::new();
        chain.expect_deploy().times(1).returning(|_, _| Ok(TOKEN));

        let mut recorder = MockArtifactRecorder::new();
        recorder
            .expect_persist()
            .times(2)
            .returning(|_, _| Err(anyhow::anyhow!("disk full")));

        let plan = Plan {
            steps: vec![step("token")],
        };

        let result = orchestrator(chain, MockCapacityGrantor::new(), Some(recorder))
            .run(&plan, &artifacts(&["token"]))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.completed.len(), 1);
    }
}
