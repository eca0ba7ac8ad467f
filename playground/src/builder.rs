//! Construction of transactions that create or spend custom script outputs.

use crate::{
    codec,
    context::SpendContext,
    error::{Error, Result},
    settings::Settings,
    trace,
};
use lockbox_addresses::Address;
use lockbox_consensus_core::{
    constants::{LOCK_TIME_ENABLED_SEQUENCE, MAX_TX_IN_SEQUENCE_NUM, TX_VERSION, size},
    hashing::sighash_type::SIG_HASH_ALL_FORKID,
    keys::PrivateKey,
    sign::{self, sign_input, sign_input_with_nonce, sign_with_multiple},
    tx::{
        ScriptPublicKey, SignableTransaction, Transaction, TransactionId, TransactionInput, TransactionOutpoint, TransactionOutput,
        UtxoEntry,
    },
};
use lockbox_txscript::{pay_to_address_script, pay_to_pubkey_hash, script_class::ScriptClass};
use log::{info, warn};
use secp256k1::SecretKey;
use serde::Serialize;

/// Unlocking script token replaced by a SIGHASH_ALL|FORKID signature over the spend.
pub const SIG_PLACEHOLDER: &str = "<sig>";
/// Unlocking script token replaced by the signing key's public key.
pub const PUBKEY_PLACEHOLDER: &str = "<pubkey>";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub txid: TransactionId,
    #[serde(with = "hex::serde")]
    pub bytes: Vec<u8>,
    pub size: usize,
    pub fee: u64,
    /// Satoshis per byte of the serialized transaction
    pub fee_rate: f64,
}

impl BuildResult {
    fn new(tx: &SignableTransaction) -> Self {
        let bytes = tx.tx.serialize();
        let fee = tx.total_input_value().saturating_sub(tx.tx.total_output_value());
        let size = bytes.len();
        Self { txid: tx.tx.id(), bytes, size, fee, fee_rate: fee as f64 / size as f64 }
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// Produces the signatures a transaction needs from `key`.
pub trait InputSigner: Send + Sync {
    fn sign(&self, tx: SignableTransaction, key: &PrivateKey) -> Result<SignableTransaction>;
}

/// Signs every pay-to-pubkey-hash input `key` controls, replacing its unlocking script.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardSigner;

impl InputSigner for StandardSigner {
    fn sign(&self, tx: SignableTransaction, key: &PrivateKey) -> Result<SignableTransaction> {
        Ok(sign_with_multiple(tx, std::slice::from_ref(key))?.unwrap())
    }
}

/// How the unlocking script of a spend is obtained.
#[derive(Clone, Copy)]
enum Unlock<'a> {
    /// ASM text, possibly holding `<sig>` and `<pubkey>` placeholders
    Asm(&'a str),
    /// `<sig> <pubkey>` with the signature made using a committed nonce
    RPuzzle(&'a SecretKey),
}

fn fee_for(size: usize, fee_rate: f64) -> u64 {
    (size as f64 * fee_rate).ceil() as u64
}

struct Source {
    outpoint: TransactionOutpoint,
    entry: UtxoEntry,
}

impl Source {
    fn parse(source: &[u8], output_index: usize) -> Result<Self> {
        let tx = Transaction::deserialize(source)?;
        let output =
            tx.outputs.get(output_index).ok_or(Error::OutputIndexOutOfRange { index: output_index, count: tx.outputs.len() })?;
        Ok(Self { outpoint: TransactionOutpoint::new(tx.id(), output_index as u32), entry: UtxoEntry::from(output) })
    }
}

fn resolve_placeholders(asm: &str, signature: Option<&[u8]>, public_key: Option<&[u8]>) -> Result<String> {
    let tokens = codec::normalize_aliases(asm)
        .split_whitespace()
        .map(|token| match token {
            SIG_PLACEHOLDER => signature.map(hex::encode).ok_or(Error::MissingKey(SIG_PLACEHOLDER)),
            PUBKEY_PLACEHOLDER => public_key.map(hex::encode).ok_or(Error::MissingKey(PUBKEY_PLACEHOLDER)),
            _ => Ok(token.to_string()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(tokens.join(" "))
}

pub struct TransactionBuilder {
    settings: Settings,
    signer: Box<dyn InputSigner>,
}

impl TransactionBuilder {
    pub fn new(settings: Settings) -> Self {
        Self { settings, signer: Box::new(StandardSigner) }
    }

    pub fn with_signer(self, signer: impl InputSigner + 'static) -> Self {
        Self { signer: Box::new(signer), ..self }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Spends output `output_index` of `source`, a pay-to-pubkey-hash output owned by `key`,
    /// into a new output of `amount` locked by `locking_asm`. Change above the dust threshold
    /// goes back to `change_address`, or to the key's own address.
    pub fn build_lock_transaction(
        &self,
        key: &PrivateKey,
        source: &[u8],
        output_index: usize,
        locking_asm: &str,
        amount: u64,
        change_address: Option<&Address>,
    ) -> Result<BuildResult> {
        let source = Source::parse(source, output_index)?;
        let found = ScriptClass::extract_pubkey_hash(source.entry.script_public_key.script()).ok_or(Error::NotPayToPubkeyHash)?;
        let expected = key.pubkey_hash();
        if found != expected {
            return Err(Error::KeyMismatch { expected: hex::encode(expected), found: hex::encode(found) });
        }
        let locking = codec::parse_asm(locking_asm)?;

        let available = source.entry.amount;
        let base_size = size::TX_OVERHEAD + size::P2PKH_INPUT + locking.len() + size::OUTPUT_VALUE + size::OUTPUT_COUNT;
        let fee_with_change = fee_for(base_size + size::P2PKH_OUTPUT, self.settings.fee_rate);
        let change = available.checked_sub(amount).and_then(|rest| rest.checked_sub(fee_with_change));

        let mut outputs = vec![TransactionOutput::new(amount, ScriptPublicKey::from_vec(locking))];
        match change {
            Some(change) if change > self.settings.dust_threshold => {
                let change_script = match change_address {
                    Some(address) => pay_to_address_script(address),
                    None => pay_to_pubkey_hash(&expected),
                };
                outputs.push(TransactionOutput::new(change, change_script));
            }
            _ => {
                let fee = fee_for(base_size, self.settings.fee_rate);
                let required = amount.saturating_add(fee);
                if available < required {
                    return Err(Error::InsufficientFunds { available, required });
                }
            }
        }

        let tx = Transaction::new(TX_VERSION, vec![TransactionInput::unsigned(source.outpoint)], outputs, 0);
        let signed = self.signer.sign(SignableTransaction::with_entries(tx, vec![source.entry]), key)?;
        sign::verify(&signed)?;

        let result = BuildResult::new(&signed);
        info!("built lock transaction {} ({} bytes, fee {})", result.txid, result.size, result.fee);
        Ok(result)
    }

    /// Spends output `output_index` of `source` with `unlocking_asm` as the unlocking
    /// script, sending everything but the fee to `destination`. A key is needed only
    /// when the script uses the `<sig>` or `<pubkey>` placeholders.
    pub fn build_unlock_transaction(
        &self,
        source: &[u8],
        output_index: usize,
        unlocking_asm: &str,
        destination: &Address,
        key: Option<&PrivateKey>,
    ) -> Result<BuildResult> {
        self.build_unlock(source, output_index, Unlock::Asm(unlocking_asm), destination, key, None)
    }

    /// Like [`Self::build_unlock_transaction`], with the transaction lock time set to `lock_time`.
    /// The input sequence is lowered below the maximum so the lock time is enforced.
    pub fn build_unlock_transaction_with_lock_time(
        &self,
        source: &[u8],
        output_index: usize,
        unlocking_asm: &str,
        destination: &Address,
        key: Option<&PrivateKey>,
        lock_time: u32,
    ) -> Result<BuildResult> {
        self.build_unlock(source, output_index, Unlock::Asm(unlocking_asm), destination, key, Some(lock_time))
    }

    /// Spends an R-puzzle output with a signature by `key` made using `nonce`.
    pub fn build_r_puzzle_unlock_transaction(
        &self,
        source: &[u8],
        output_index: usize,
        nonce: &SecretKey,
        key: &PrivateKey,
        destination: &Address,
    ) -> Result<BuildResult> {
        self.build_unlock(source, output_index, Unlock::RPuzzle(nonce), destination, Some(key), None)
    }

    fn build_unlock(
        &self,
        source: &[u8],
        output_index: usize,
        unlock: Unlock<'_>,
        destination: &Address,
        key: Option<&PrivateKey>,
        lock_time: Option<u32>,
    ) -> Result<BuildResult> {
        let source = Source::parse(source, output_index)?;
        let public_key = key.map(|key| key.public_key_bytes());

        // Sized with a worst case signature since the real one commits to the output value
        let estimate_signature = vec![0u8; size::MAX_SIGNATURE_WITH_HASH_TYPE];
        let template = match unlock {
            Unlock::Asm(asm) => asm.to_string(),
            Unlock::RPuzzle(_) => format!("{SIG_PLACEHOLDER} {PUBKEY_PLACEHOLDER}"),
        };
        let estimate = codec::parse_asm(&resolve_placeholders(&template, Some(&estimate_signature), public_key.as_deref())?)?;

        let size = size::TX_OVERHEAD + size::GENERIC_INPUT_OVERHEAD + estimate.len() + size::P2PKH_OUTPUT;
        let fee = fee_for(size, self.settings.fee_rate);
        let available = source.entry.amount;
        let value = available.checked_sub(fee).ok_or(Error::InsufficientFunds { available, required: fee })?;
        if value < self.settings.dust_threshold {
            return Err(Error::Dust { value, threshold: self.settings.dust_threshold });
        }

        let sequence = if lock_time.is_some() { LOCK_TIME_ENABLED_SEQUENCE } else { MAX_TX_IN_SEQUENCE_NUM };
        let input = TransactionInput::new(source.outpoint, vec![], sequence);
        let output = TransactionOutput::new(value, pay_to_address_script(destination));
        let locking = source.entry.script_public_key.script().to_vec();
        let tx = Transaction::new(TX_VERSION, vec![input], vec![output], lock_time.unwrap_or(0));
        let mut tx = SignableTransaction::with_entries(tx, vec![source.entry]);

        let signature = match (unlock, key) {
            (Unlock::RPuzzle(nonce), Some(key)) => {
                Some(sign_input_with_nonce(&tx, 0, &locking, key.secret_key(), nonce, SIG_HASH_ALL_FORKID)?)
            }
            (Unlock::Asm(asm), Some(key)) if asm.split_whitespace().any(|token| token == SIG_PLACEHOLDER) => {
                Some(sign_input(&tx, 0, &locking, key.secret_key(), SIG_HASH_ALL_FORKID)?)
            }
            _ => None,
        };
        let unlocking = codec::parse_asm(&resolve_placeholders(&template, signature.as_deref(), public_key.as_deref())?)?;
        tx.tx.inputs[0].signature_script = unlocking.clone();

        if let Some(key) = key {
            tx = self.signer.sign(tx, key)?;
        }
        let tx = reinstate_unlocking_script(tx, &unlocking)?;
        let context = SpendContext::new(tx, 0)?;
        let verdict = trace::validate(&locking, &unlocking, &context)?;
        if let Some(rejection) = verdict.rejection {
            warn!("unlocking script does not satisfy the locking script: {rejection}");
        }

        let result = BuildResult::new(context.transaction());
        info!("built unlock transaction {} ({} bytes, fee {})", result.txid, result.size, result.fee);
        Ok(result)
    }
}

/// Puts `unlocking` back into input 0 when a signer replaced it, then checks the
/// serialized transaction really carries it.
fn reinstate_unlocking_script(mut tx: SignableTransaction, unlocking: &[u8]) -> Result<SignableTransaction> {
    if let Some(input) = tx.tx.inputs.first_mut()
        && input.signature_script != unlocking
    {
        warn!("signer replaced the unlocking script {}, reinstating it", codec::to_hex(unlocking));
        input.signature_script = unlocking.to_vec();
    }

    let serialized = Transaction::deserialize(&tx.tx.serialize())?;
    let found = serialized.inputs.first().map(|input| input.signature_script.as_slice()).unwrap_or_default();
    if found != unlocking {
        return Err(Error::ScriptMismatch { expected: codec::to_hex(unlocking), found: codec::to_hex(found) });
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, puzzle::RPuzzle};
    use lockbox_addresses::Prefix;

    fn key(byte: u8) -> PrivateKey {
        PrivateKey::from_slice(&[byte; 32], Prefix::Testnet).unwrap()
    }

    fn source(outputs: Vec<TransactionOutput>) -> Vec<u8> {
        let funding = TransactionInput::unsigned(TransactionOutpoint::new(TransactionId::from_bytes([5; 32]), 0));
        Transaction::new(TX_VERSION, vec![funding], outputs, 0).serialize()
    }

    fn p2pkh_source(key: &PrivateKey, value: u64) -> Vec<u8> {
        source(vec![TransactionOutput::new(value, pay_to_pubkey_hash(&key.pubkey_hash()))])
    }

    fn script_source(asm: &str, value: u64) -> Vec<u8> {
        source(vec![TransactionOutput::new(value, ScriptPublicKey::from_vec(codec::parse_asm(asm).unwrap()))])
    }

    fn builder(fee_rate: f64) -> TransactionBuilder {
        TransactionBuilder::new(Settings::default().with_fee_rate(fee_rate).unwrap())
    }

    fn decode(result: &BuildResult) -> Transaction {
        Transaction::deserialize(&result.bytes).unwrap()
    }

    #[test]
    fn test_lock_with_change() {
        let key = key(1);
        let result =
            builder(0.5).build_lock_transaction(&key, &p2pkh_source(&key, 100_000), 0, "OP_ADD OP_5 OP_EQUAL", 10_000, None).unwrap();
        assert_eq!(result.fee, 102);
        let tx = decode(&result);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 10_000);
        assert_eq!(tx.outputs[0].script_public_key.script(), &[0x93, 0x55, 0x87]);
        assert_eq!(tx.outputs[1].value, 89_898);
        assert_eq!(tx.outputs[1].script_public_key, pay_to_pubkey_hash(&key.pubkey_hash()));
        assert_eq!(result.txid, tx.id());
        assert_eq!(result.size, tx.serialize().len());
    }

    #[test]
    fn test_lock_change_address() {
        let (key, other) = (key(1), key(2));
        let change = other.address();
        let result = builder(1.0)
            .build_lock_transaction(&key, &p2pkh_source(&key, 50_000), 0, "OP_1", 1_000, Some(&change))
            .unwrap();
        assert_eq!(decode(&result).outputs[1].script_public_key, pay_to_address_script(&change));
    }

    #[test]
    fn test_lock_dust_change_goes_to_fee() {
        let key = key(1);
        let result =
            builder(1.0).build_lock_transaction(&key, &p2pkh_source(&key, 10_700), 0, "OP_ADD OP_5 OP_EQUAL", 10_000, None).unwrap();
        assert_eq!(result.fee, 700);
        assert_eq!(decode(&result).outputs.len(), 1);
    }

    #[test]
    fn test_lock_insufficient_funds() {
        let key = key(1);
        let err = builder(1.0)
            .build_lock_transaction(&key, &p2pkh_source(&key, 10_100), 0, "OP_ADD OP_5 OP_EQUAL", 10_000, None)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { available: 10_100, required: 10_170 }));
        assert_eq!(err.kind(), ErrorKind::Funds);
    }

    #[test]
    fn test_lock_ownership() {
        let (key, other) = (key(1), key(2));
        let err = builder(0.5).build_lock_transaction(&other, &p2pkh_source(&key, 100_000), 0, "OP_1", 1_000, None).unwrap_err();
        assert!(matches!(err, Error::KeyMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::Ownership);

        let err = builder(0.5).build_lock_transaction(&key, &script_source("OP_1", 100_000), 0, "OP_1", 1_000, None).unwrap_err();
        assert!(matches!(err, Error::NotPayToPubkeyHash));
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }

    #[test]
    fn test_lock_bad_inputs() {
        let key = key(1);
        let err = builder(0.5).build_lock_transaction(&key, &p2pkh_source(&key, 100_000), 1, "OP_1", 1_000, None).unwrap_err();
        assert!(matches!(err, Error::OutputIndexOutOfRange { index: 1, count: 1 }));
        assert_eq!(err.kind(), ErrorKind::Range);

        let err = builder(0.5).build_lock_transaction(&key, &[1, 2, 3], 0, "OP_1", 1_000, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err = builder(0.5).build_lock_transaction(&key, &p2pkh_source(&key, 100_000), 0, "OP_BOGUS", 1_000, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_unlock_hash_puzzle() {
        let locking = "OP_SHA256 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 OP_EQUAL";
        let destination = key(3).address();
        let result = builder(0.5).build_unlock_transaction(&script_source(locking, 10_000), 0, "68656c6c6f", &destination, None).unwrap();
        assert_eq!(result.fee, 46);
        let tx = decode(&result);
        assert_eq!(tx.inputs[0].signature_script, hex::decode("0568656c6c6f").unwrap());
        assert_eq!(tx.inputs[0].sequence, MAX_TX_IN_SEQUENCE_NUM);
        assert_eq!(tx.outputs[0].value, 9_954);
        assert_eq!(tx.outputs[0].script_public_key, pay_to_address_script(&destination));
    }

    #[test]
    fn test_unlock_below_dust() {
        let err =
            builder(0.5).build_unlock_transaction(&script_source("OP_1", 560), 0, "OP_1", &key(3).address(), None).unwrap_err();
        assert!(matches!(err, Error::Dust { value: 517, threshold: 546 }));
        assert_eq!(err.kind(), ErrorKind::Funds);
    }

    #[test]
    fn test_unlock_fee_exceeds_source() {
        let err =
            builder(0.5).build_unlock_transaction(&script_source("OP_1", 40), 0, "OP_1", &key(3).address(), None).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { available: 40, required: 43 }));
        assert_eq!(err.kind(), ErrorKind::Funds);
    }

    #[test]
    fn test_unlock_with_lock_time() {
        let result = builder(0.5)
            .build_unlock_transaction_with_lock_time(
                &script_source("OP_NOP2 OP_DROP OP_1", 10_000),
                0,
                "0065cd1d",
                &key(3).address(),
                None,
                500_000_000,
            )
            .unwrap();
        let tx = decode(&result);
        assert_eq!(tx.lock_time, 500_000_000);
        assert_eq!(tx.inputs[0].sequence, LOCK_TIME_ENABLED_SEQUENCE);
    }

    #[test]
    fn test_unlock_placeholders() {
        let key = key(1);
        let source = p2pkh_source(&key, 20_000);
        let result = builder(0.5).build_unlock_transaction(&source, 0, "<sig> <pubkey>", &key.address(), Some(&key)).unwrap();
        let spending = decode(&result);
        let context = SpendContext::from_transactions(&source, &result.bytes, 0, 0).unwrap();
        let verdict = trace::validate(context.locking_script(), &spending.inputs[0].signature_script, &context).unwrap();
        assert!(verdict.valid, "{:?}", verdict.rejection);

        let err = builder(0.5).build_unlock_transaction(&source, 0, "<sig> <pubkey>", &key.address(), None).unwrap_err();
        assert!(matches!(err, Error::MissingKey(PUBKEY_PLACEHOLDER)));
        assert_eq!(err.kind(), ErrorKind::Context);
    }

    #[test]
    fn test_r_puzzle_unlock() {
        let nonce = SecretKey::from_slice(&[7; 32]).unwrap();
        let puzzle = RPuzzle::from_nonce(&nonce, None).unwrap();
        let source = source(vec![TransactionOutput::new(30_000, ScriptPublicKey::from_vec(hex::decode(&puzzle.locking_hex).unwrap()))]);
        let key = key(4);
        let result = builder(0.5).build_r_puzzle_unlock_transaction(&source, 0, &nonce, &key, &key.address()).unwrap();
        let spending = decode(&result);
        let context = SpendContext::from_transactions(&source, &result.bytes, 0, 0).unwrap();
        let verdict = trace::validate(context.locking_script(), &spending.inputs[0].signature_script, &context).unwrap();
        assert!(verdict.valid, "{:?}", verdict.rejection);
    }

    struct Overwriting;

    impl InputSigner for Overwriting {
        fn sign(&self, mut tx: SignableTransaction, _key: &PrivateKey) -> Result<SignableTransaction> {
            tx.tx.inputs[0].signature_script = vec![0x51];
            Ok(tx)
        }
    }

    struct Dropping;

    impl InputSigner for Dropping {
        fn sign(&self, mut tx: SignableTransaction, _key: &PrivateKey) -> Result<SignableTransaction> {
            tx.tx.inputs.clear();
            tx.entries.clear();
            Ok(tx)
        }
    }

    #[test]
    fn test_unlocking_script_reinstated() {
        let key = key(1);
        let source = script_source("OP_SHA256 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 OP_EQUAL", 10_000);
        let result =
            builder(0.5).with_signer(Overwriting).build_unlock_transaction(&source, 0, "68656c6c6f", &key.address(), Some(&key)).unwrap();
        assert_eq!(decode(&result).inputs[0].signature_script, hex::decode("0568656c6c6f").unwrap());

        let err = builder(0.5)
            .with_signer(Dropping)
            .build_unlock_transaction(&source, 0, "68656c6c6f", &key.address(), Some(&key))
            .unwrap_err();
        assert!(matches!(err, Error::ScriptMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }
}
