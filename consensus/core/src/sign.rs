use crate::{
    hashing::{
        sighash::{SigHashReusedValues, calc_signature_hash},
        sighash_type::{SIG_HASH_ALL_FORKID, SigHashType},
    },
    keys::PrivateKey,
    tx::{SignableTransaction, VerifiableTransaction},
};
use itertools::Itertools;
use lockbox_hashes::Hash;
use num_bigint::BigUint;
use num_traits::Zero;
use secp256k1::{Message, PublicKey, SECP256K1, SecretKey, ecdsa::Signature};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("Secp256k1 -> {0}")]
    Secp256k1Error(#[from] secp256k1::Error),

    #[error("input {0} does not exist")]
    InputIndexOutOfRange(usize),

    #[error("input {0} has no populated UTXO entry")]
    MissingUtxoEntry(usize),

    #[error("the nonce produces a degenerate signature")]
    DegenerateNonce,

    #[error("The transaction is partially signed")]
    PartiallySigned,
}

/// A wrapper enum that represents the transaction signed state. A transaction
/// contained by this enum can be either fully signed or partially signed.
pub enum Signed {
    Fully(SignableTransaction),
    Partially(SignableTransaction),
}

impl Signed {
    /// Returns the transaction if it is fully signed, otherwise returns an error
    pub fn fully_signed(self) -> std::result::Result<SignableTransaction, Error> {
        match self {
            Signed::Fully(tx) => Ok(tx),
            Signed::Partially(_) => Err(Error::PartiallySigned),
        }
    }

    /// Returns the transaction regardless of whether it is fully or partially signed
    pub fn unwrap(self) -> SignableTransaction {
        match self {
            Signed::Fully(tx) => tx,
            Signed::Partially(tx) => tx,
        }
    }
}

/// Order of the secp256k1 group.
const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48,
    0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Locking script of a pay-to-pubkey-hash output.
pub fn pay_to_pubkey_hash_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    [&[0x76, 0xa9, 0x14][..], pubkey_hash, &[0x88, 0xac]].concat()
}

/// Pushes `data` with a direct length opcode. Only valid for up to 75 bytes.
fn direct_push(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    std::iter::once(data.len() as u8).chain(data.iter().copied())
}

fn signature_hash(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    script_code: &[u8],
    hash_type: SigHashType,
    reused_values: &SigHashReusedValues,
) -> Result<Hash, Error> {
    if input_index >= tx.inputs().len() {
        return Err(Error::InputIndexOutOfRange(input_index));
    }
    let entry = tx.utxo(input_index).ok_or(Error::MissingUtxoEntry(input_index))?;
    Ok(calc_signature_hash(tx, input_index, script_code, entry.amount, hash_type, reused_values))
}

/// Signs one input and returns the DER signature followed by the sighash type byte.
pub fn sign_input(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    script_code: &[u8],
    private_key: &SecretKey,
    hash_type: SigHashType,
) -> Result<Vec<u8>, Error> {
    let reused_values = SigHashReusedValues::new();
    let hash = signature_hash(tx, input_index, script_code, hash_type, &reused_values)?;
    let msg = Message::from_digest(hash.as_bytes());
    let sig = SECP256K1.sign_ecdsa(&msg, private_key);
    Ok(sig.serialize_der().iter().copied().chain([hash_type.to_u8()]).collect())
}

/// Signs one input using `nonce` as the ECDSA ephemeral key, so the signature's
/// R value is the x coordinate of `nonce * G`.
pub fn sign_input_with_nonce(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    script_code: &[u8],
    private_key: &SecretKey,
    nonce: &SecretKey,
    hash_type: SigHashType,
) -> Result<Vec<u8>, Error> {
    let reused_values = SigHashReusedValues::new();
    let hash = signature_hash(tx, input_index, script_code, hash_type, &reused_values)?;
    let sig = sign_with_nonce(&hash, private_key, nonce)?;
    Ok(sig.serialize_der().iter().copied().chain([hash_type.to_u8()]).collect())
}

/// ECDSA with a caller-chosen nonce: `s = k^-1 (z + r d) mod n`, normalized to low S.
pub fn sign_with_nonce(digest: &Hash, private_key: &SecretKey, nonce: &SecretKey) -> Result<Signature, Error> {
    let n = BigUint::from_bytes_be(&CURVE_ORDER);
    let r_point = PublicKey::from_secret_key(SECP256K1, nonce);
    let r = BigUint::from_bytes_be(&r_point.serialize()[1..33]) % &n;
    if r.is_zero() {
        return Err(Error::DegenerateNonce);
    }

    let z = BigUint::from_bytes_be(&digest.as_bytes());
    let d = BigUint::from_bytes_be(&private_key.secret_bytes());
    let k = BigUint::from_bytes_be(&nonce.secret_bytes());
    // n is prime, so k^(n-2) is the modular inverse
    let k_inv = k.modpow(&(&n - 2u32), &n);
    let mut s = (k_inv * ((z + &r * d) % &n)) % &n;
    if s.is_zero() {
        return Err(Error::DegenerateNonce);
    }
    if s > &n >> 1 {
        s = &n - s;
    }

    let mut compact = [0u8; 64];
    let (r_bytes, s_bytes) = (r.to_bytes_be(), s.to_bytes_be());
    compact[32 - r_bytes.len()..32].copy_from_slice(&r_bytes);
    compact[64 - s_bytes.len()..].copy_from_slice(&s_bytes);
    let sig = Signature::from_compact(&compact)?;

    let msg = Message::from_digest(digest.as_bytes());
    let public_key = PublicKey::from_secret_key(SECP256K1, private_key);
    SECP256K1.verify_ecdsa(&msg, &sig, &public_key)?;
    Ok(sig)
}

/// Signs every pay-to-pubkey-hash input whose hash belongs to one of `keys`,
/// replacing its unlocking script with `<sig> <pubkey>`. Other inputs are left
/// untouched and make the result partial.
pub fn sign_with_multiple(mut mutable_tx: SignableTransaction, keys: &[PrivateKey]) -> Result<Signed, Error> {
    let map: BTreeMap<Vec<u8>, &PrivateKey> = keys.iter().map(|key| (pay_to_pubkey_hash_script(&key.pubkey_hash()), key)).collect();

    let reused_values = SigHashReusedValues::new();
    let mut additional_signatures_required = false;
    for i in 0..mutable_tx.tx.inputs.len() {
        let entry = mutable_tx.entries[i].as_ref().ok_or(Error::MissingUtxoEntry(i))?;
        let script = entry.script_public_key.script();
        if let Some(key) = map.get(script) {
            let hash = calc_signature_hash(&mutable_tx, i, script, entry.amount, SIG_HASH_ALL_FORKID, &reused_values);
            let msg = Message::from_digest(hash.as_bytes());
            let sig = SECP256K1.sign_ecdsa(&msg, key.secret_key());
            let sig = sig.serialize_der().iter().copied().chain([SIG_HASH_ALL_FORKID.to_u8()]).collect_vec();
            let public_key = key.public_key_bytes();
            mutable_tx.tx.inputs[i].signature_script = direct_push(&sig).chain(direct_push(&public_key)).collect();
        } else {
            additional_signatures_required = true;
        }
    }
    if additional_signatures_required { Ok(Signed::Partially(mutable_tx)) } else { Ok(Signed::Fully(mutable_tx)) }
}

/// Checks the `<sig> <pubkey>` unlocking scripts of all pay-to-pubkey-hash inputs.
pub fn verify(tx: &impl VerifiableTransaction) -> Result<(), Error> {
    let reused_values = SigHashReusedValues::new();
    for (i, (input, entry)) in tx.populated_inputs().enumerate() {
        let entry = entry.ok_or(Error::MissingUtxoEntry(i))?;
        let script = input.signature_script.as_slice();
        let (sig, public_key) = split_pushes(script).ok_or_else(|| Error::Message(format!("Signature is malformed for input: {i}")))?;
        let (hash_type, der) = sig.split_last().ok_or_else(|| Error::Message(format!("Signature is empty for input: {i}")))?;
        let hash_type = SigHashType::from_u8(*hash_type).map_err(|err| Error::Message(err.to_string()))?;
        let sig = Signature::from_der(der)?;
        let public_key = PublicKey::from_slice(public_key)?;
        let hash = calc_signature_hash(tx, i, entry.script_public_key.script(), entry.amount, hash_type, &reused_values);
        SECP256K1.verify_ecdsa(&Message::from_digest(hash.as_bytes()), &sig, &public_key)?;
    }

    Ok(())
}

fn split_pushes(script: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&sig_len, rest) = script.split_first()?;
    let (sig, rest) = rest.split_at_checked(sig_len as usize)?;
    let (&key_len, rest) = rest.split_first()?;
    (rest.len() == key_len as usize).then_some((sig, rest))
}
