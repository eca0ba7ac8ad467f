use lockbox_addresses::{Address, Prefix, Version};
use secp256k1::{PublicKey, SECP256K1, SecretKey};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid WIF encoding: {0}")]
    InvalidWif(String),

    #[error("unknown WIF network byte {0:#04x}")]
    UnknownNetwork(u8),

    #[error("invalid private key: {0}")]
    InvalidKey(#[from] secp256k1::Error),
}

/// A signing key together with the encoding choices that determine its address.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PrivateKey {
    secret_key: SecretKey,
    compressed: bool,
    prefix: Prefix,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey").field("address", &self.address()).finish_non_exhaustive()
    }
}

impl PrivateKey {
    pub fn new(secret_key: SecretKey, prefix: Prefix) -> Self {
        Self { secret_key, compressed: true, prefix }
    }

    pub fn from_slice(bytes: &[u8], prefix: Prefix) -> Result<Self, KeyError> {
        Ok(Self::new(SecretKey::from_slice(bytes)?, prefix))
    }

    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let data = bs58::decode(wif.trim()).with_check(None).into_vec().map_err(|err| KeyError::InvalidWif(err.to_string()))?;
        let (&network_byte, rest) = data.split_first().ok_or_else(|| KeyError::InvalidWif("empty payload".to_string()))?;
        let prefix = Prefix::from_secret_key_byte(network_byte).ok_or(KeyError::UnknownNetwork(network_byte))?;
        let (key_bytes, compressed) = match rest.len() {
            32 => (rest, false),
            33 if rest[32] == 0x01 => (&rest[..32], true),
            len => return Err(KeyError::InvalidWif(format!("unexpected payload length {len}"))),
        };
        Ok(Self { secret_key: SecretKey::from_slice(key_bytes)?, compressed, prefix })
    }

    pub fn to_wif(&self) -> String {
        let mut payload = self.secret_key.secret_bytes().to_vec();
        if self.compressed {
            payload.push(0x01);
        }
        bs58::encode(payload).with_check_version(self.prefix.secret_key_byte()).into_string()
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(SECP256K1, &self.secret_key)
    }

    /// The public key in the encoding used by its address.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        let public_key = self.public_key();
        if self.compressed { public_key.serialize().to_vec() } else { public_key.serialize_uncompressed().to_vec() }
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        lockbox_hashes::hash160(self.public_key_bytes())
    }

    pub fn address(&self) -> Address {
        Address::new(self.prefix, Version::PubKeyHash, self.pubkey_hash())
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    /// Accepts WIF, or 64 hex characters interpreted as a compressed mainnet key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            let bytes = hex::decode(s).map_err(|err| KeyError::InvalidWif(err.to_string()))?;
            return Self::from_slice(&bytes, Prefix::Mainnet);
        }
        Self::from_wif(s)
    }
}
