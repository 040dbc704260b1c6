use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

const ADDRESS_TEXT_LEN: usize = 42;

/// A 20-byte account address.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AddressError {
    Empty,
    WrongLength(usize),
    MissingPrefix,
    InvalidHex,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::Empty => write!(f, "address is empty"),
            AddressError::WrongLength(len) => write!(
                f,
                "address must be {ADDRESS_TEXT_LEN} characters, got {len}"
            ),
            AddressError::MissingPrefix => write!(f, "address must start with 0x"),
            AddressError::InvalidHex => write!(f, "address contains non-hex characters"),
        }
    }
}

impl std::error::Error for AddressError {}

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-padded 32-byte word, as used for indexed log topics and ABI arguments.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    pub fn to_topic(&self) -> String {
        format!("0x{}", hex::encode(self.to_word()))
    }

    /// `0x1234...abcd`
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }
        if raw.len() != ADDRESS_TEXT_LEN {
            return Err(AddressError::WrongLength(raw.len()));
        }
        let digits = raw.strip_prefix("0x").ok_or(AddressError::MissingPrefix)?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidHex);
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
