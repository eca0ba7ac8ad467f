mod script_public_key;
mod wire;

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::constants::MAX_TX_IN_SEQUENCE_NUM;
pub use script_public_key::ScriptPublicKey;
pub use wire::DecodeError;

/// Represents the ID of a transaction
pub type TransactionId = lockbox_hashes::Hash;

/// The value and locking script of an output being spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub amount: u64,
    pub script_public_key: ScriptPublicKey,
}

impl UtxoEntry {
    pub fn new(amount: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { amount, script_public_key }
    }
}

impl From<&TransactionOutput> for UtxoEntry {
    fn from(output: &TransactionOutput) -> Self {
        Self { amount: output.value, script_public_key: output.script_public_key.clone() }
    }
}

#[derive(Eq, Hash, PartialEq, Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutpoint {
    pub transaction_id: TransactionId,
    pub index: u32,
}

impl TransactionOutpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self { transaction_id, index }
    }
}

impl Display for TransactionOutpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
    #[serde(with = "hex::serde")]
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

impl TransactionInput {
    pub fn new(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>, sequence: u32) -> Self {
        Self { previous_outpoint, signature_script, sequence }
    }

    /// An input with an empty unlocking script and the final sequence number.
    pub fn unsigned(previous_outpoint: TransactionOutpoint) -> Self {
        Self::new(previous_outpoint, vec![], MAX_TX_IN_SEQUENCE_NUM)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub value: u64,
    pub script_public_key: ScriptPublicKey,
}

impl TransactionOutput {
    pub fn new(value: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { value, script_public_key }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>, lock_time: u32) -> Self {
        Self { version, inputs, outputs, lock_time }
    }

    /// The double SHA256 of the serialized transaction.
    pub fn id(&self) -> TransactionId {
        crate::hashing::tx::id(self)
    }

    pub fn serialize(&self) -> Vec<u8> {
        wire::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        wire::deserialize(bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, DecodeError> {
        Self::deserialize(&hex::decode(hex_str.trim())?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        wire::serialized_size(self)
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|output| output.value).sum()
    }
}

/// Represents any kind of transaction which has populated UTXO entry data and can be verified/signed etc
pub trait VerifiableTransaction {
    fn tx(&self) -> &Transaction;

    /// Returns the UTXO entry spent by the input at `index`, if populated.
    fn utxo(&self, index: usize) -> Option<&UtxoEntry>;

    fn inputs(&self) -> &[TransactionInput] {
        &self.tx().inputs
    }

    fn outputs(&self) -> &[TransactionOutput] {
        &self.tx().outputs
    }

    fn populated_input(&self, index: usize) -> Option<(&TransactionInput, &UtxoEntry)> {
        Some((self.inputs().get(index)?, self.utxo(index)?))
    }

    fn populated_inputs(&self) -> PopulatedInputIterator<'_, Self>
    where
        Self: Sized,
    {
        PopulatedInputIterator::new(self)
    }

    fn id(&self) -> TransactionId {
        self.tx().id()
    }
}

pub struct PopulatedInputIterator<'a, T: VerifiableTransaction> {
    tx: &'a T,
    r: std::ops::Range<usize>,
}

impl<'a, T: VerifiableTransaction> PopulatedInputIterator<'a, T> {
    pub fn new(tx: &'a T) -> Self {
        Self { tx, r: 0..tx.inputs().len() }
    }
}

impl<'a, T: VerifiableTransaction> Iterator for PopulatedInputIterator<'a, T> {
    type Item = (&'a TransactionInput, Option<&'a UtxoEntry>);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.r.next()?;
        Some((&self.tx.inputs()[i], self.tx.utxo(i)))
    }
}

/// Represents a read-only referenced transaction along with fully populated UTXO entry data
pub struct PopulatedTransaction<'a> {
    pub tx: &'a Transaction,
    pub entries: Vec<UtxoEntry>,
}

impl<'a> PopulatedTransaction<'a> {
    pub fn new(tx: &'a Transaction, entries: Vec<UtxoEntry>) -> Self {
        assert_eq!(tx.inputs.len(), entries.len());
        Self { tx, entries }
    }
}

impl VerifiableTransaction for PopulatedTransaction<'_> {
    fn tx(&self) -> &Transaction {
        self.tx
    }

    fn utxo(&self, index: usize) -> Option<&UtxoEntry> {
        self.entries.get(index)
    }
}

/// A transaction under construction, owning its (possibly partial) UTXO entries.
#[derive(Debug, Clone)]
pub struct SignableTransaction {
    pub tx: Transaction,
    pub entries: Vec<Option<UtxoEntry>>,
}

impl SignableTransaction {
    pub fn new(tx: Transaction) -> Self {
        let entries = vec![None; tx.inputs.len()];
        Self { tx, entries }
    }

    pub fn with_entries(tx: Transaction, entries: Vec<UtxoEntry>) -> Self {
        assert_eq!(tx.inputs.len(), entries.len());
        Self { tx, entries: entries.into_iter().map(Some).collect() }
    }

    pub fn is_fully_populated(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }

    pub fn total_input_value(&self) -> u64 {
        self.entries.iter().flatten().map(|entry| entry.amount).sum()
    }
}

impl VerifiableTransaction for SignableTransaction {
    fn tx(&self) -> &Transaction {
        &self.tx
    }

    fn utxo(&self, index: usize) -> Option<&UtxoEntry> {
        self.entries.get(index).and_then(Option::as_ref)
    }
}
