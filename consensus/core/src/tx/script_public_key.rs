use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A locking script attached to an output.
#[derive(Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptPublicKey(#[serde(with = "hex::serde")] Vec<u8>);

impl std::fmt::Debug for ScriptPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ScriptPublicKey").field(&hex::encode(&self.0)).finish()
    }
}

impl ScriptPublicKey {
    pub fn from_vec(script: Vec<u8>) -> Self {
        Self(script)
    }

    pub fn script(&self) -> &[u8] {
        &self.0
    }

    pub fn script_as_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl From<Vec<u8>> for ScriptPublicKey {
    fn from(script: Vec<u8>) -> Self {
        Self(script)
    }
}

impl FromStr for ScriptPublicKey {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(hex::decode(s)?))
    }
}
