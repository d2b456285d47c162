use {
    alloy::primitives::{Address, U256},
    clap::Parser,
    std::{path::PathBuf, time::Duration},
    url::Url,
};

#[derive(Parser)]
pub struct Arguments {
    /// The chain node URL to connect to.
    #[clap(long, env, default_value = "http://localhost:8545")]
    pub node_url: Url,

    /// Hex-encoded private key of the account funding the deployment.
    #[clap(long, env, hide_env_values = true)]
    pub private_key: String,

    /// Path to the deployment plan JSON file.
    #[clap(long, env)]
    pub plan: PathBuf,

    /// Directory containing one `<artifact>.json` file per artifact
    /// referenced by the plan.
    #[clap(long, env, default_value = "build/contracts")]
    pub artifacts: PathBuf,

    /// Shared configuration file deployment outputs are persisted to.
    /// Omit to skip persistence.
    #[clap(long, env)]
    pub config_file: Option<PathBuf>,

    /// Issuer contract address. Defaults to the well-known deployment for
    /// the connected network.
    #[clap(long, env)]
    pub issuer: Option<Address>,

    /// Capacity allowance in wei granted to each deployed contract that
    /// requests one.
    #[clap(long, env, default_value = "10000000000000000000")]
    pub capacity: U256,

    /// Explicit gas price in wei for grant transactions.
    #[clap(long, env, default_value = "10000000000000")]
    pub grant_gas_price: u128,

    /// Explicit gas limit for grant transactions.
    #[clap(long, env, default_value = "4000000")]
    pub grant_gas_limit: u64,

    /// Maximum time to wait for a submitted transaction to be confirmed.
    #[clap(long, env, default_value = "2m", value_parser = humantime::parse_duration)]
    pub confirmation_timeout: Duration,

    /// Block explorer base URL for best-effort source verification.
    #[clap(long, env)]
    pub explorer_url: Option<Url>,

    /// Directory with flattened `<artifact>.sol` sources submitted for
    /// verification.
    #[clap(long, env)]
    pub contract_sources: Option<PathBuf>,
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "node_url: {}", self.node_url)?;
        writeln!(f, "private_key: SECRET")?;
        writeln!(f, "plan: {}", self.plan.display())?;
        writeln!(f, "artifacts: {}", self.artifacts.display())?;
        writeln!(f, "config_file: {:?}", self.config_file)?;
        writeln!(f, "issuer: {:?}", self.issuer)?;
        writeln!(f, "capacity: {}", self.capacity)?;
        writeln!(f, "grant_gas_price: {}", self.grant_gas_price)?;
        writeln!(f, "grant_gas_limit: {}", self.grant_gas_limit)?;
        writeln!(f, "confirmation_timeout: {:?}", self.confirmation_timeout)?;
        writeln!(f, "explorer_url: {:?}", self.explorer_url)?;
        writeln!(f, "contract_sources: {:?}", self.contract_sources)?;
        Ok(())
    }
}
