//! Declarative deployment plan: a list of contract-creation steps whose
//! constructor arguments may reference addresses produced by earlier steps.

use {
    alloy::primitives::{Address, U256},
    serde::{Deserialize, Deserializer, de},
    std::collections::HashMap,
};

/// One unit of on-chain contract creation plus an optional follow-up
/// capacity-grant call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentStep {
    /// Unique logical name. Also the key under which the deployed address
    /// and ABI are persisted.
    pub name: String,
    /// Name of the artifact (ABI + creation bytecode) to deploy.
    pub artifact: String,
    #[serde(default)]
    pub constructor_args: Vec<Arg>,
    /// Dependencies in addition to the ones implied by constructor argument
    /// placeholders.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Whether to authorize the new contract with the issuer after
    /// deployment.
    #[serde(default)]
    pub grant_capacity: bool,
}

impl DeploymentStep {
    /// All step names this step depends on, explicit ones and the ones
    /// implied by placeholder arguments.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.depends_on.iter().map(String::as_str).chain(
            self.constructor_args.iter().filter_map(|arg| match arg {
                Arg::ContractAddress(name) => Some(name.as_str()),
                Arg::Value(_) => None,
            }),
        )
    }
}

/// A single constructor argument: either a concrete value or a placeholder
/// resolving to the address of a previously deployed step.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(ArgValue),
    /// Written as `"$<step>.address"` in the plan file.
    ContractAddress(String),
}

/// A concrete constructor argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl<'de> Deserialize<'de> for Arg {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Bool(value) => Ok(Arg::Value(ArgValue::Bool(value))),
            serde_json::Value::Number(value) => {
                // JSON numbers above 2^64-1 lose precision in parsing; large
                // values must be written as decimal strings.
                let value = value.as_u64().ok_or_else(|| {
                    de::Error::custom(
                        "numeric constructor arguments must be unsigned integers that fit in 64 \
                         bits; write larger values as decimal strings",
                    )
                })?;
                Ok(Arg::Value(ArgValue::Uint(U256::from(value))))
            }
            serde_json::Value::String(value) => parse_string_arg(&value).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "unsupported constructor argument: {other}"
            ))),
        }
    }
}

fn parse_string_arg(value: &str) -> Result<Arg, String> {
    if let Some(reference) = value.strip_prefix('$') {
        let name = reference.strip_suffix(".address").ok_or_else(|| {
            format!("malformed placeholder {value:?}, expected \"$<step>.address\"")
        })?;
        if name.is_empty() {
            return Err(format!("placeholder {value:?} references an empty step name"));
        }
        return Ok(Arg::ContractAddress(name.to_string()));
    }
    if value.starts_with("0x") && value.len() == 42 {
        let address = value
            .parse::<Address>()
            .map_err(|err| format!("malformed address {value:?}: {err}"))?;
        return Ok(Arg::Value(ArgValue::Address(address)));
    }
    // Values too large for a JSON number, typically wei-denominated amounts,
    // are written as decimal strings.
    if !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()) {
        let uint = value
            .parse::<U256>()
            .map_err(|err| format!("numeric argument {value:?} does not fit in 256 bits: {err}"))?;
        return Ok(Arg::Value(ArgValue::Uint(uint)));
    }
    Ok(Arg::Value(ArgValue::String(value.to_string())))
}

/// The full plan, in declaration order.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    pub steps: Vec<DeploymentStep>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("duplicate step name {0:?}")]
    DuplicateStep(String),
    #[error("step {step:?} depends on unknown step {dependency:?}")]
    UnknownDependency { step: String, dependency: String },
    #[error("dependency cycle involving steps {0:?}")]
    CyclicDependency(Vec<String>),
}

impl Plan {
    /// Returns step indices in a valid execution order, or an error if the
    /// dependency graph is not a DAG over known step names. Pure; performs no
    /// I/O.
    ///
    /// Ties are broken by declaration order, so a plan that is already
    /// topologically sorted executes exactly as written.
    pub fn execution_order(&self) -> Result<Vec<usize>, PlanError> {
        let mut index_by_name = HashMap::new();
        for (index, step) in self.steps.iter().enumerate() {
            if index_by_name.insert(step.name.as_str(), index).is_some() {
                return Err(PlanError::DuplicateStep(step.name.clone()));
            }
        }

        let dependencies: Vec<Vec<usize>> = self
            .steps
            .iter()
            .map(|step| {
                step.dependencies()
                    .map(|dependency| {
                        index_by_name.get(dependency).copied().ok_or_else(|| {
                            PlanError::UnknownDependency {
                                step: step.name.clone(),
                                dependency: dependency.to_string(),
                            }
                        })
                    })
                    .collect::<Result<_, _>>()
            })
            .collect::<Result<_, _>>()?;

        let mut order = Vec::with_capacity(self.steps.len());
        let mut scheduled = vec![false; self.steps.len()];
        while order.len() < self.steps.len() {
            // Smallest-declaration-index step whose dependencies are all
            // scheduled. The plans are tiny, quadratic is fine.
            let next = (0..self.steps.len()).find(|&index| {
                !scheduled[index]
                    && dependencies[index]
                        .iter()
                        .all(|&dependency| scheduled[dependency])
            });
            match next {
                Some(index) => {
                    scheduled[index] = true;
                    order.push(index);
                }
                None => {
                    let stuck = self
                        .steps
                        .iter()
                        .enumerate()
                        .filter(|(index, _)| !scheduled[*index])
                        .map(|(_, step)| step.name.clone())
                        .collect();
                    return Err(PlanError::CyclicDependency(stuck));
                }
            }
        }
        Ok(order)
    }
}
