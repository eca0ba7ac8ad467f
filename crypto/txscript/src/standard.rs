use crate::{
    opcodes::codes::{
        OpCheckSig, OpData20, OpDrop, OpDup, OpEqual, OpEqualVerify, OpHash160, OpHash256, OpNip, OpOver, OpRipemd160, OpSha1, OpSha256,
        OpSplit, OpSwap, OpTrue, Op3,
    },
    script_builder::{ScriptBuilder, ScriptBuilderResult},
    script_class::ScriptClass,
};
use lockbox_addresses::{Address, PAYLOAD_SIZE, Prefix, Version};
use lockbox_consensus_core::tx::ScriptPublicKey;
use lockbox_txscript_errors::TxScriptError;
use secp256k1::{PublicKey, SECP256K1, SecretKey};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    iter::once,
    str::FromStr,
};

/// Creates a new script to pay a transaction output to a 20-byte pubkey hash.
pub fn pay_to_pubkey_hash(pubkey_hash: &[u8; PAYLOAD_SIZE]) -> ScriptPublicKey {
    let script = [OpDup, OpHash160, OpData20].into_iter().chain(pubkey_hash.iter().copied()).chain([OpEqualVerify, OpCheckSig]);
    ScriptPublicKey::from_vec(script.collect())
}

/// Creates a new script to pay a transaction output to a 20-byte script hash.
fn pay_to_script_hash(script_hash: &[u8; PAYLOAD_SIZE]) -> ScriptPublicKey {
    let script = [OpHash160, OpData20].into_iter().chain(script_hash.iter().copied()).chain(once(OpEqual));
    ScriptPublicKey::from_vec(script.collect())
}

/// Creates a new script to pay a transaction output to the specified address.
pub fn pay_to_address_script(address: &Address) -> ScriptPublicKey {
    match address.version {
        Version::PubKeyHash => pay_to_pubkey_hash(&address.payload),
        Version::ScriptHash => pay_to_script_hash(&address.payload),
    }
}

/// Returns the address encoded in a script public key.
///
/// Only pay-to-pubkey-hash and pay-to-script-hash scripts carry an address,
/// anything else returns [`TxScriptError::PubKeyFormat`].
pub fn extract_script_pub_key_address(script_public_key: &ScriptPublicKey, prefix: Prefix) -> Result<Address, TxScriptError> {
    let script = script_public_key.script();
    let (version, payload) = match ScriptClass::from_script(script) {
        ScriptClass::PubKeyHash => (Version::PubKeyHash, &script[3..23]),
        ScriptClass::ScriptHash => (Version::ScriptHash, &script[2..22]),
        _ => return Err(TxScriptError::PubKeyFormat),
    };
    let payload = payload.try_into().map_err(|_| TxScriptError::PubKeyFormat)?;
    Ok(Address::new(prefix, version, payload))
}

/// One-way functions a hash puzzle can commit to. Each maps to the opcode
/// that recomputes it on chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PuzzleHash {
    Sha256,
    Hash256,
    Hash160,
    Ripemd160,
    Sha1,
}

impl PuzzleHash {
    pub const ALL: [PuzzleHash; 5] = [PuzzleHash::Sha256, PuzzleHash::Hash256, PuzzleHash::Hash160, PuzzleHash::Ripemd160, PuzzleHash::Sha1];

    pub fn opcode(self) -> u8 {
        match self {
            PuzzleHash::Sha256 => OpSha256,
            PuzzleHash::Hash256 => OpHash256,
            PuzzleHash::Hash160 => OpHash160,
            PuzzleHash::Ripemd160 => OpRipemd160,
            PuzzleHash::Sha1 => OpSha1,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            PuzzleHash::Sha256 => lockbox_hashes::sha256(data).to_vec(),
            PuzzleHash::Hash256 => lockbox_hashes::sha256d(data).to_vec(),
            PuzzleHash::Hash160 => lockbox_hashes::hash160(data).to_vec(),
            PuzzleHash::Ripemd160 => lockbox_hashes::ripemd160(data).to_vec(),
            PuzzleHash::Sha1 => lockbox_hashes::sha1(data).to_vec(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PuzzleHash::Sha256 => "SHA256",
            PuzzleHash::Hash256 => "HASH256",
            PuzzleHash::Hash160 => "HASH160",
            PuzzleHash::Ripemd160 => "RIPEMD160",
            PuzzleHash::Sha1 => "SHA1",
        }
    }
}

impl Display for PuzzleHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PuzzleHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim_start_matches("OP_").to_ascii_uppercase();
        PuzzleHash::ALL.into_iter().find(|hash| hash.as_str() == name).ok_or_else(|| format!("unknown hash algorithm `{s}`"))
    }
}

/// `OP_<HASH> <digest> OP_EQUAL`: spendable by pushing the preimage of `digest`.
pub fn hash_puzzle_script(hash: PuzzleHash, digest: &[u8]) -> ScriptBuilderResult<Vec<u8>> {
    Ok(ScriptBuilder::new().add_op(hash.opcode())?.add_data(digest)?.add_op(OpEqual)?.drain())
}

/// Opcodes cutting the R value out of a DER signature with its sighash byte
/// sitting under the public key: `30 len 02 rlen R 02 slen S hashtype`.
const EXTRACT_R: [u8; 9] = [OpOver, Op3, OpSplit, OpNip, OpTrue, OpSplit, OpSwap, OpSplit, OpDrop];

/// Locking script accepting any valid signature whose R value (or its hash)
/// equals `commitment`. The signing key is not constrained.
pub fn r_puzzle_script(commitment: &[u8], hash: Option<PuzzleHash>) -> ScriptBuilderResult<Vec<u8>> {
    let mut builder = ScriptBuilder::new();
    builder.add_ops(&EXTRACT_R)?;
    if let Some(hash) = hash {
        builder.add_op(hash.opcode())?;
    }
    builder.add_data(commitment)?.add_ops(&[OpEqualVerify, OpCheckSig])?;
    Ok(builder.drain())
}

/// Encodes a big endian unsigned integer the way DER does: leading zeros
/// stripped and a zero byte prepended when the high bit is set.
pub fn der_integer(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len().saturating_sub(1));
    let trimmed = &bytes[start..];
    match trimmed.first() {
        Some(&first) if first & 0x80 != 0 => [&[0u8][..], trimmed].concat(),
        Some(_) => trimmed.to_vec(),
        None => vec![0],
    }
}

/// The R value a signature made with `nonce` carries, in DER integer form.
pub fn nonce_commitment(nonce: &SecretKey) -> Vec<u8> {
    let point = PublicKey::from_secret_key(SECP256K1, nonce).serialize();
    der_integer(&point[1..33])
}

/// The value an R-puzzle embeds for `nonce`: its R value, optionally hashed.
pub fn r_puzzle_commitment(nonce: &SecretKey, hash: Option<PuzzleHash>) -> Vec<u8> {
    let r = nonce_commitment(nonce);
    match hash {
        Some(hash) => hash.digest(&r),
        None => r,
    }
}
