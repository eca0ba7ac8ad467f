use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, PartialEq, Eq, Debug, Clone)]
pub enum AddressError {
    #[error("Invalid version byte {0:#04x}")]
    InvalidVersion(u8),

    #[error("Invalid payload length {0}, expected 20")]
    InvalidLength(usize),

    #[error("Checksum is invalid")]
    BadChecksum,

    #[error("Base58 decoding error: {0}")]
    DecodingError(String),
}

impl From<bs58::decode::Error> for AddressError {
    fn from(err: bs58::decode::Error) -> Self {
        match err {
            bs58::decode::Error::InvalidChecksum { .. } => AddressError::BadChecksum,
            err => AddressError::DecodingError(err.to_string()),
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prefix {
    #[default]
    Mainnet,
    Testnet,
}

impl Prefix {
    pub fn version_byte(&self, version: Version) -> u8 {
        match (self, version) {
            (Prefix::Mainnet, Version::PubKeyHash) => 0x00,
            (Prefix::Mainnet, Version::ScriptHash) => 0x05,
            (Prefix::Testnet, Version::PubKeyHash) => 0x6f,
            (Prefix::Testnet, Version::ScriptHash) => 0xc4,
        }
    }

    /// Leading byte of WIF-encoded private keys on this network.
    pub fn secret_key_byte(&self) -> u8 {
        match self {
            Prefix::Mainnet => 0x80,
            Prefix::Testnet => 0xef,
        }
    }

    pub fn from_secret_key_byte(byte: u8) -> Option<Self> {
        match byte {
            0x80 => Some(Prefix::Mainnet),
            0xef => Some(Prefix::Testnet),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Prefix::Mainnet => "mainnet",
            Prefix::Testnet => "testnet",
        }
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" | "main" => Ok(Prefix::Mainnet),
            "testnet" | "test" => Ok(Prefix::Testnet),
            _ => Err(format!("unknown network `{s}`")),
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
pub enum Version {
    /// Pays to the HASH160 of a public key
    PubKeyHash,
    /// Pays to the HASH160 of a redeem script; decoded for recognition only
    ScriptHash,
}

pub const PAYLOAD_SIZE: usize = 20;

/// A base58check address: `1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Address {
    pub prefix: Prefix,
    pub version: Version,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl Address {
    pub fn new(prefix: Prefix, version: Version, payload: [u8; PAYLOAD_SIZE]) -> Self {
        Self { prefix, version, payload }
    }

    pub fn encode(&self) -> String {
        bs58::encode(self.payload).with_check_version(self.prefix.version_byte(self.version)).into_string()
    }

    pub fn decode(address: &str) -> Result<Self, AddressError> {
        let data = bs58::decode(address).with_check(None).into_vec()?;
        let (&version_byte, payload) = data.split_first().ok_or(AddressError::InvalidLength(0))?;
        let (prefix, version) = match version_byte {
            0x00 => (Prefix::Mainnet, Version::PubKeyHash),
            0x05 => (Prefix::Mainnet, Version::ScriptHash),
            0x6f => (Prefix::Testnet, Version::PubKeyHash),
            0xc4 => (Prefix::Testnet, Version::ScriptHash),
            _ => return Err(AddressError::InvalidVersion(version_byte)),
        };
        let payload: [u8; PAYLOAD_SIZE] = payload.try_into().map_err(|_| AddressError::InvalidLength(payload.len()))?;
        Ok(Self { prefix, version, payload })
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::decode(s.trim())
    }
}

impl TryFrom<&str> for Address {
    type Error = AddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Address::decode(value)
    }
}

impl From<&Address> for String {
    fn from(address: &Address) -> Self {
        address.encode()
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Address::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn payload() -> [u8; PAYLOAD_SIZE] {
        // hash160 of the compressed public key for secret 1
        hex::decode("751e76e8199196d454941c45d1b3a323f1433bd6").unwrap().try_into().unwrap()
    }

    fn cases() -> Vec<(Address, &'static str)> {
        vec![
            (Address::new(Prefix::Mainnet, Version::PubKeyHash, payload()), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"),
            (Address::new(Prefix::Testnet, Version::PubKeyHash, payload()), "mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r"),
            (Address::new(Prefix::Mainnet, Version::ScriptHash, payload()), "3CNHUhP3uyB9EUtRLsmvFUmvGdjGdkTxJw"),
        ]
    }

    #[test]
    fn check_into_string() {
        for (address, expected) in cases() {
            assert_eq!(address.to_string(), expected);
        }
    }

    #[test]
    fn check_from_string() {
        for (expected, address_str) in cases() {
            let address: Address = address_str.parse().unwrap();
            assert_eq!(address, expected);
        }
    }

    #[test]
    fn test_errors() {
        // last character altered
        assert_eq!(Address::decode("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMJ"), Err(AddressError::BadChecksum));
        assert!(matches!(Address::decode("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAM0"), Err(AddressError::DecodingError(_))));
        let wif = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
        assert_eq!(Address::decode(wif), Err(AddressError::InvalidVersion(0x80)));
    }

    #[test]
    fn test_address_serde() {
        let address = Address::new(Prefix::Testnet, Version::PubKeyHash, payload());
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
