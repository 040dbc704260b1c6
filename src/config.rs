use crate::{
    address::Address,
    chain::{
        self,
        ChainTarget,
    },
    deployment::{
        ContractDeployment,
        DeploymentEnv,
        DeploymentStore,
    },
};
use clap::{
    Args,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(
    name = "daily-gm",
    about = "Say GM onchain once a day, from the terminal",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub app: AppArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or update the per-network deployments store
    Deployments {
        #[command(subcommand)]
        action: DeploymentsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeploymentsAction {
    /// List recorded deployments for the selected network
    List,
    /// Record a deployed GM contract
    Record {
        #[arg(long)]
        address: Address,

        /// Block the contract was deployed at
        #[arg(long)]
        block: Option<u64>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    /// Chain id of the deployment environment; 8453 selects Base mainnet
    #[arg(long, env = "DAILY_GM_CHAIN_ID", global = true)]
    pub chain_id: Option<String>,

    /// Base URL used for links
    #[arg(long, env = "DAILY_GM_HOME_URL", default_value = "http://localhost:3000", global = true)]
    pub home_url: String,

    /// GM contract (defaults to the latest recorded deployment)
    #[arg(long, env = "DAILY_GM_CONTRACT_ADDRESS", global = true)]
    pub contract_address: Option<Address>,

    /// JSON-RPC endpoint of the signing wallet
    #[arg(long, env = "DAILY_GM_RPC_URL", default_value = "http://localhost:8545", global = true)]
    pub rpc_url: String,

    /// Blockscout-compatible API used for GM counts
    #[arg(long, env = "DAILY_GM_EXPLORER_API_URL", global = true)]
    pub explorer_api_url: Option<String>,

    /// Account to send from (defaults to the wallet's first account)
    #[arg(long, env = "DAILY_GM_ACCOUNT", global = true)]
    pub account: Option<Address>,

    /// Treat the wallet as unable to switch networks
    #[arg(long, global = true)]
    pub no_switch: bool,

    /// How long to wait for a host mini-app context
    #[arg(long, default_value_t = 1_500, global = true)]
    pub probe_timeout_ms: u64,

    /// Directory for log files
    #[arg(long, env = "DAILY_GM_LOG_DIR", default_value = "logs", global = true)]
    pub log_dir: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppConfig {
    pub target: ChainTarget,
    pub home_url: String,
    pub contract: ContractDeployment,
    pub rpc_url: String,
    pub explorer_api_url: String,
    pub account: Option<Address>,
    pub can_switch: bool,
    pub probe_timeout: Duration,
}

impl AppArgs {
    pub fn target(&self) -> ChainTarget {
        chain::resolve(chain::is_production_flag(self.chain_id.as_deref()))
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.log_dir).into_owned())
    }

    pub fn deployment_store(&self, root: impl AsRef<Path>) -> Result<DeploymentStore> {
        let env = DeploymentEnv::for_target(&self.target());
        DeploymentStore::open(root.as_ref(), env)
            .wrap_err_with(|| format!("failed to open {env} deployments store"))
    }

    pub fn resolve(&self, deployments_root: impl AsRef<Path>) -> Result<AppConfig> {
        let target = self.target();
        let contract = self
            .deployment_store(deployments_root)?
            .resolve_contract(self.contract_address)?;
        Ok(AppConfig {
            target,
            home_url: self.home_url.trim_end_matches('/').to_string(),
            contract,
            rpc_url: self.rpc_url.clone(),
            explorer_api_url: self
                .explorer_api_url
                .clone()
                .unwrap_or_else(|| target.explorer_api_url()),
            account: self.account,
            can_switch: !self.no_switch,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        })
    }
}

impl AppConfig {
    pub fn tx_url(&self, tx: &crate::wallet::TxHash) -> String {
        format!("{}/tx/{tx}", self.target.explorer_url())
    }
}
