//! Locking scripts derived from a secret: hash puzzles and R-puzzles.

use crate::{
    codec,
    error::{Error, Result},
};
use lockbox_consensus_core::keys::KeyError;
use lockbox_txscript::{PuzzleHash, hash_puzzle_script, r_puzzle_commitment, r_puzzle_script};
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashPuzzle {
    pub locking_asm: String,
    pub locking_hex: String,
    pub preimage_hex: String,
    pub digest_hex: String,
}

/// Builds `OP_<HASH> <digest> OP_EQUAL` for `secret`. A secret given as text is
/// committed through its UTF-8 bytes.
pub fn build_hash_puzzle(secret: &str, is_hex: bool, hash: PuzzleHash) -> Result<HashPuzzle> {
    if secret.is_empty() {
        return Err(Error::EmptySecret);
    }
    let preimage = if is_hex { codec::from_hex(secret)? } else { secret.as_bytes().to_vec() };
    if preimage.is_empty() {
        return Err(Error::EmptySecret);
    }

    let digest = hash.digest(&preimage);
    let script = hash_puzzle_script(hash, &digest)?;
    Ok(HashPuzzle {
        locking_asm: codec::to_asm(&script)?,
        locking_hex: codec::to_hex(&script),
        preimage_hex: hex::encode(&preimage),
        digest_hex: hex::encode(&digest),
    })
}

/// An R-puzzle lock together with the nonce that opens it. Whoever holds the
/// nonce can spend, with any key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RPuzzle {
    pub nonce_hex: String,
    /// R value of signatures made with the nonce, DER integer encoded
    pub r_hex: String,
    /// The value embedded in the lock: R itself or its hash
    pub commitment_hex: String,
    pub hash: Option<PuzzleHash>,
    pub locking_asm: String,
    pub locking_hex: String,
}

impl RPuzzle {
    pub fn from_nonce(nonce: &SecretKey, hash: Option<PuzzleHash>) -> Result<Self> {
        let r = r_puzzle_commitment(nonce, None);
        let commitment = r_puzzle_commitment(nonce, hash);
        let script = r_puzzle_script(&commitment, hash)?;
        Ok(Self {
            nonce_hex: hex::encode(nonce.secret_bytes()),
            r_hex: hex::encode(r),
            commitment_hex: hex::encode(commitment),
            hash,
            locking_asm: codec::to_asm(&script)?,
            locking_hex: codec::to_hex(&script),
        })
    }
}

/// Draws a fresh nonce from the operating system's CSPRNG and derives its lock.
pub fn generate_r_puzzle(hash: Option<PuzzleHash>) -> Result<RPuzzle> {
    let nonce = SecretKey::new(&mut rand::thread_rng());
    RPuzzle::from_nonce(&nonce, hash)
}

pub fn parse_nonce(nonce_hex: &str) -> Result<SecretKey> {
    let bytes = codec::from_hex(nonce_hex)?;
    SecretKey::from_slice(&bytes).map_err(|err| Error::Key(KeyError::InvalidKey(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_hash_puzzle() {
        let puzzle = build_hash_puzzle("hello", false, PuzzleHash::Sha256).unwrap();
        assert_eq!(puzzle.digest_hex, "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
        assert_eq!(puzzle.preimage_hex, "68656c6c6f");
        assert_eq!(puzzle.locking_asm, format!("OP_SHA256 {} OP_EQUAL", puzzle.digest_hex));

        let from_hex = build_hash_puzzle("68656c6c6f", true, PuzzleHash::Sha256).unwrap();
        assert_eq!(from_hex, puzzle);

        let hash160 = build_hash_puzzle("hello", false, PuzzleHash::Hash160).unwrap();
        assert_eq!(hash160.digest_hex.len(), 40);
        assert!(hash160.locking_asm.starts_with("OP_HASH160 "));
    }

    #[test]
    fn test_hash_puzzle_errors() {
        let err = build_hash_puzzle("", false, PuzzleHash::Sha256).unwrap_err();
        assert!(matches!(err, Error::EmptySecret));
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(matches!(build_hash_puzzle("abc", true, PuzzleHash::Sha256), Err(Error::OddLengthHex(_))));
        assert!(matches!(build_hash_puzzle("zz", true, PuzzleHash::Sha256), Err(Error::Hex(_))));
    }

    #[test]
    fn test_r_puzzle_from_nonce() {
        let nonce = parse_nonce(&"11".repeat(32)).unwrap();
        let raw = RPuzzle::from_nonce(&nonce, None).unwrap();
        assert_eq!(raw.commitment_hex, raw.r_hex);
        assert_eq!(
            raw.locking_asm,
            format!("OP_OVER OP_3 OP_SPLIT OP_NIP OP_1 OP_SPLIT OP_SWAP OP_SPLIT OP_DROP {} OP_EQUALVERIFY OP_CHECKSIG", raw.r_hex)
        );
        // the lock never reveals the nonce
        assert!(!raw.locking_hex.contains(&raw.nonce_hex));

        let hashed = RPuzzle::from_nonce(&nonce, Some(PuzzleHash::Hash160)).unwrap();
        assert_eq!(hashed.r_hex, raw.r_hex);
        assert_eq!(hashed.commitment_hex, hex::encode(PuzzleHash::Hash160.digest(&hex::decode(&raw.r_hex).unwrap())));
        assert!(hashed.locking_asm.contains(&format!("OP_DROP OP_HASH160 {} OP_EQUALVERIFY", hashed.commitment_hex)));
    }

    #[test]
    fn test_generate_r_puzzle() {
        let first = generate_r_puzzle(None).unwrap();
        let second = generate_r_puzzle(None).unwrap();
        assert_ne!(first.nonce_hex, second.nonce_hex);
        let r = hex::decode(&first.r_hex).unwrap();
        assert!(r.len() <= 33 && r[0] & 0x80 == 0);
        assert_eq!(RPuzzle::from_nonce(&parse_nonce(&first.nonce_hex).unwrap(), None).unwrap(), first);
        assert!(parse_nonce(&"00".repeat(32)).is_err());
    }
}
