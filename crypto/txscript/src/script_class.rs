use crate::opcodes::codes::{
    OpCheckSig, OpData20, OpData33, OpData65, OpDup, OpEqual, OpEqualVerify, OpFalse, OpHash160, OpReturn,
};
use lockbox_addresses::Version;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

#[derive(Error, PartialEq, Eq, Debug, Clone)]
pub enum Error {
    #[error("Invalid script class {0}")]
    InvalidScriptClass(String),
}

/// Standard classes of script payment known to the network.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptClass {
    /// None of the recognized forms
    NonStandard = 0,
    /// Pay to public key hash
    PubKeyHash,
    /// Pay to script hash
    ScriptHash,
    /// Pay to a bare public key
    PubKey,
    /// Provably unspendable data carrier
    NullData,
}

const NON_STANDARD: &str = "nonstandard";
const PUB_KEY_HASH: &str = "pubkeyhash";
const SCRIPT_HASH: &str = "scripthash";
const PUB_KEY: &str = "pubkey";
const NULL_DATA: &str = "nulldata";

impl ScriptClass {
    pub fn from_script(script: &[u8]) -> Self {
        if Self::is_pay_to_pubkey_hash(script) {
            ScriptClass::PubKeyHash
        } else if Self::is_pay_to_script_hash(script) {
            ScriptClass::ScriptHash
        } else if Self::is_pay_to_pubkey(script) {
            ScriptClass::PubKey
        } else if Self::is_null_data(script) {
            ScriptClass::NullData
        } else {
            ScriptClass::NonStandard
        }
    }

    /// Returns true if the script is in the standard pay-to-pubkey-hash form:
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    #[inline(always)]
    pub fn is_pay_to_pubkey_hash(script: &[u8]) -> bool {
        script.len() == 25
            && script[0] == OpDup
            && script[1] == OpHash160
            && script[2] == OpData20
            && script[23] == OpEqualVerify
            && script[24] == OpCheckSig
    }

    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    #[inline(always)]
    pub fn is_pay_to_script_hash(script: &[u8]) -> bool {
        script.len() == 23 && script[0] == OpHash160 && script[1] == OpData20 && script[22] == OpEqual
    }

    /// A compressed or uncompressed public key followed by OP_CHECKSIG.
    #[inline(always)]
    pub fn is_pay_to_pubkey(script: &[u8]) -> bool {
        match script.len() {
            35 => script[0] == OpData33 && script[34] == OpCheckSig,
            67 => script[0] == OpData65 && script[66] == OpCheckSig,
            _ => false,
        }
    }

    /// `OP_RETURN ...` or `OP_FALSE OP_RETURN ...`
    #[inline(always)]
    pub fn is_null_data(script: &[u8]) -> bool {
        match script {
            [OpReturn, ..] => true,
            [OpFalse, OpReturn, ..] => true,
            _ => false,
        }
    }

    /// Returns the committed public key hash of a pay-to-pubkey-hash script.
    pub fn extract_pubkey_hash(script: &[u8]) -> Option<[u8; 20]> {
        if !Self::is_pay_to_pubkey_hash(script) {
            return None;
        }
        script[3..23].try_into().ok()
    }

    fn as_str(&self) -> &'static str {
        match self {
            ScriptClass::NonStandard => NON_STANDARD,
            ScriptClass::PubKeyHash => PUB_KEY_HASH,
            ScriptClass::ScriptHash => SCRIPT_HASH,
            ScriptClass::PubKey => PUB_KEY,
            ScriptClass::NullData => NULL_DATA,
        }
    }
}

impl Display for ScriptClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptClass {
    type Err = Error;

    fn from_str(script_class: &str) -> Result<Self, Self::Err> {
        match script_class {
            NON_STANDARD => Ok(ScriptClass::NonStandard),
            PUB_KEY_HASH => Ok(ScriptClass::PubKeyHash),
            SCRIPT_HASH => Ok(ScriptClass::ScriptHash),
            PUB_KEY => Ok(ScriptClass::PubKey),
            NULL_DATA => Ok(ScriptClass::NullData),

            _ => Err(Error::InvalidScriptClass(script_class.to_string())),
        }
    }
}

impl TryFrom<&str> for ScriptClass {
    type Error = Error;

    fn try_from(script_class: &str) -> Result<Self, Self::Error> {
        script_class.parse()
    }
}

impl From<Version> for ScriptClass {
    fn from(value: Version) -> Self {
        match value {
            Version::PubKeyHash => ScriptClass::PubKeyHash,
            Version::ScriptHash => ScriptClass::ScriptHash,
        }
    }
}
