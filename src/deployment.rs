use crate::{
    address::Address,
    chain::ChainTarget,
};
use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::debug;

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub const DEFAULT_CONTRACT: Address = Address::new([
    0xe4, 0x49, 0xf7, 0x9e, 0xc5, 0x94, 0xe6, 0x09, 0xab, 0xc5, 0xfe, 0x17, 0x0d, 0x67, 0x8a,
    0xe7, 0x58, 0xe8, 0xef, 0xd7,
]);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Mainnet,
    Sepolia,
}

impl DeploymentEnv {
    pub fn for_target(target: &ChainTarget) -> Self {
        if target.is_production() {
            DeploymentEnv::Mainnet
        } else {
            DeploymentEnv::Sepolia
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Mainnet => "mainnet",
            DeploymentEnv::Sepolia => "sepolia",
        }
    }

    /// First block worth scanning for GM events when no record says otherwise.
    pub fn default_from_block(self) -> u64 {
        match self {
            DeploymentEnv::Mainnet => 0,
            DeploymentEnv::Sepolia => 18_000_000,
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Mainnet => "Base Mainnet",
            DeploymentEnv::Sepolia => "Base Sepolia",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: DateTime<Utc>,
    pub contract_address: Address,
    pub network_url: String,
    #[serde(default)]
    pub deployment_block: Option<u64>,
}

/// The contract the app talks to and where its event history starts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContractDeployment {
    pub address: Address,
    pub from_block: u64,
}

#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn open(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { env, path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    pub fn record(
        &self,
        contract_address: Address,
        network_url: impl Into<String>,
        deployment_block: Option<u64>,
    ) -> Result<DeploymentRecord> {
        let record = DeploymentRecord {
            deployed_at: Utc::now(),
            contract_address,
            network_url: network_url.into(),
            deployment_block,
        };
        self.append(record.clone())?;
        Ok(record)
    }

    pub fn latest(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .max_by_key(|record| record.deployed_at))
    }

    /// Explicit address first, then the newest record, then the built-in default.
    pub fn resolve_contract(&self, explicit: Option<Address>) -> Result<ContractDeployment> {
        let fallback_block = self.env.default_from_block();
        if let Some(address) = explicit {
            return Ok(ContractDeployment {
                address,
                from_block: fallback_block,
            });
        }
        let resolved = match self.latest()? {
            Some(record) => ContractDeployment {
                address: record.contract_address,
                from_block: record.deployment_block.unwrap_or(fallback_block),
            },
            None => ContractDeployment {
                address: DEFAULT_CONTRACT,
                from_block: fallback_block,
            },
        };
        debug!(
            env = %self.env,
            address = %resolved.address,
            from_block = resolved.from_block,
            "resolved contract"
        );
        Ok(resolved)
    }

    pub fn env(&self) -> DeploymentEnv {
        self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn ensure_structure(root: impl AsRef<Path>) -> Result<()> {
    for env in [DeploymentEnv::Mainnet, DeploymentEnv::Sepolia] {
        let _ = ensure_store(root.as_ref(), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create deployments directory {}", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).wrap_err_with(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"[]").wrap_err_with(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}
