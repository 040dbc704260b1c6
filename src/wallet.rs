use crate::{
    address::Address,
    chain::ChainId,
};
use sha3::{
    Digest,
    Keccak256,
};
use std::{
    fmt,
    rc::Rc,
    str::FromStr,
};

/// EIP-1193 "user rejected request" provider error code.
pub const USER_REJECTED_CODE: i64 = 4001;

/// A failure reported by the wallet connector. The message is whatever the
/// connector produced; callers classify it, they never parse it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WalletError {
    pub code: Option<i64>,
    pub message: String,
}

impl WalletError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for WalletError {}

/// Submission acknowledgment returned by the wallet.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl FromStr for TxHash {
    type Err = WalletError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digits = raw
            .trim()
            .strip_prefix("0x")
            .ok_or_else(|| WalletError::new(format!("malformed transaction hash {raw}")))?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| WalletError::new(format!("malformed transaction hash {raw}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

/// The GM contract function a request resolves to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GmCall {
    Gm,
    GmTo(Address),
}

impl GmCall {
    pub fn signature(&self) -> &'static str {
        match self {
            GmCall::Gm => "gm()",
            GmCall::GmTo(_) => "gmTo(address)",
        }
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            GmCall::Gm => "gm",
            GmCall::GmTo(_) => "gmTo",
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        selector(self.signature())
    }

    /// ABI-encoded call data: selector followed by the padded arguments.
    pub fn calldata(&self) -> Vec<u8> {
        let mut data = self.selector().to_vec();
        if let GmCall::GmTo(recipient) = self {
            data.extend_from_slice(&recipient.to_word());
        }
        data
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContractCall {
    pub contract: Address,
    pub call: GmCall,
}

pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// What the core needs from a wallet connector. Reads are async so an
/// implementation can ask the wallet every time instead of caching.
pub trait WalletConnector {
    fn is_connected(&self) -> impl Future<Output = bool>;

    fn current_network(&self) -> impl Future<Output = Option<ChainId>>;

    fn account(&self) -> impl Future<Output = Option<Address>>;

    fn can_switch_network(&self) -> bool;

    /// May suspend for as long as the user leaves the wallet prompt open.
    fn switch_network(&self, id: ChainId)
    -> impl Future<Output = Result<(), WalletError>>;

    /// May suspend for as long as the user leaves the signature prompt open.
    fn write_contract(
        &self,
        call: ContractCall,
    ) -> impl Future<Output = Result<TxHash, WalletError>>;
}

impl<W: WalletConnector> WalletConnector for Rc<W> {
    fn is_connected(&self) -> impl Future<Output = bool> {
        (**self).is_connected()
    }

    fn current_network(&self) -> impl Future<Output = Option<ChainId>> {
        (**self).current_network()
    }

    fn account(&self) -> impl Future<Output = Option<Address>> {
        (**self).account()
    }

    fn can_switch_network(&self) -> bool {
        (**self).can_switch_network()
    }

    fn switch_network(
        &self,
        id: ChainId,
    ) -> impl Future<Output = Result<(), WalletError>> {
        (**self).switch_network(id)
    }

    fn write_contract(
        &self,
        call: ContractCall,
    ) -> impl Future<Output = Result<TxHash, WalletError>> {
        (**self).write_contract(call)
    }
}
