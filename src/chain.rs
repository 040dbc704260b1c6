use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Raw chain-id value that selects the production network.
pub const PRODUCTION_CHAIN_ID: u64 = 8453;

pub const BASE_MAINNET: ChainTarget = ChainTarget {
    id: ChainId(PRODUCTION_CHAIN_ID),
    display_name: "Base",
};

pub const BASE_SEPOLIA: ChainTarget = ChainTarget {
    id: ChainId(84532),
    display_name: "Base Sepolia",
};

const KNOWN_NETWORKS: [(u64, &str); 4] = [
    (84532, "Base Sepolia"),
    (PRODUCTION_CHAIN_ID, "Base Mainnet"),
    (1, "Ethereum Mainnet"),
    (11155111, "Sepolia"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// `0x`-prefixed quantity form used by JSON-RPC.
    pub fn to_quantity(self) -> String {
        format!("{:#x}", self.0)
    }

    pub fn from_quantity(raw: &str) -> Option<Self> {
        let digits = raw.trim().strip_prefix("0x")?;
        u64::from_str_radix(digits, 16).ok().map(ChainId)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ChainTarget {
    pub id: ChainId,
    pub display_name: &'static str,
}

impl ChainTarget {
    pub fn is_production(&self) -> bool {
        self.id == BASE_MAINNET.id
    }

    pub fn explorer_url(&self) -> &'static str {
        if self.is_production() {
            "https://base.blockscout.com"
        } else {
            "https://base-sepolia.blockscout.com"
        }
    }

    pub fn explorer_api_url(&self) -> String {
        format!("{}/api", self.explorer_url())
    }
}

impl fmt::Display for ChainTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

/// Maps the deployment-environment flag to the network every component
/// agrees on. Pure: the same flag always yields the same target.
pub fn resolve(is_production: bool) -> ChainTarget {
    if is_production {
        BASE_MAINNET
    } else {
        BASE_SEPOLIA
    }
}

/// Reads the raw chain-id environment value. Anything other than the
/// production id (including an unset value) selects the test network.
pub fn is_production_flag(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .and_then(|value| value.parse::<u64>().ok())
        .is_some_and(|id| id == PRODUCTION_CHAIN_ID)
}

pub fn known_network_name(id: ChainId) -> Option<&'static str> {
    KNOWN_NETWORKS
        .iter()
        .find(|(known, _)| *known == id.0)
        .map(|(_, name)| *name)
}
