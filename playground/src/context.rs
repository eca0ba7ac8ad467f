use crate::error::{Error, Result};
use lockbox_consensus_core::{
    constants::{MAX_TX_IN_SEQUENCE_NUM, TX_VERSION},
    tx::{
        ScriptPublicKey, SignableTransaction, Transaction, TransactionId, TransactionInput, TransactionOutpoint, UtxoEntry,
        VerifiableTransaction,
    },
};
use lockbox_txscript::TxScriptError;

/// The transaction an input is evaluated in, with the UTXO entry of that input.
/// Signature opcodes hash this transaction, so only a real context lets them succeed.
#[derive(Debug, Clone)]
pub struct SpendContext {
    tx: SignableTransaction,
    input_index: usize,
}

impl SpendContext {
    /// A single input spending output 0 of the all-zero transaction id, worth 0,
    /// in a transaction without outputs. Good for scripts that check no signatures.
    pub fn synthetic() -> Self {
        let input = TransactionInput::new(TransactionOutpoint::new(TransactionId::default(), 0), vec![], MAX_TX_IN_SEQUENCE_NUM);
        let tx = Transaction::new(TX_VERSION, vec![input], vec![], 0);
        let entry = UtxoEntry::new(0, ScriptPublicKey::from_vec(vec![]));
        Self { tx: SignableTransaction::with_entries(tx, vec![entry]), input_index: 0 }
    }

    /// Wraps a transaction whose input `input_index` already carries its UTXO entry.
    pub fn new(tx: SignableTransaction, input_index: usize) -> Result<Self> {
        let count = tx.tx.inputs.len();
        match tx.entries.get(input_index) {
            Some(Some(_)) => Ok(Self { tx, input_index }),
            Some(None) => Err(Error::SpendContext(TxScriptError::MissingUtxoEntry(input_index))),
            None => Err(Error::InputIndexOutOfRange { index: input_index, count }),
        }
    }

    /// Parses the transaction that created an output and the one spending it.
    pub fn from_transactions(source: &[u8], spending: &[u8], input_index: usize, output_index: usize) -> Result<Self> {
        let source = Transaction::deserialize(source)?;
        let spending = Transaction::deserialize(spending)?;
        Self::from_parts(&source, spending, input_index, output_index)
    }

    /// Requires input `input_index` of `spending` to reference output `output_index` of `source`.
    pub fn from_parts(source: &Transaction, spending: Transaction, input_index: usize, output_index: usize) -> Result<Self> {
        let output = source
            .outputs
            .get(output_index)
            .ok_or(Error::OutputIndexOutOfRange { index: output_index, count: source.outputs.len() })?;
        let input = spending
            .inputs
            .get(input_index)
            .ok_or(Error::InputIndexOutOfRange { index: input_index, count: spending.inputs.len() })?;

        let expected = TransactionOutpoint::new(source.id(), output_index as u32);
        if input.previous_outpoint != expected {
            return Err(Error::OutpointMismatch {
                input_index,
                spent: input.previous_outpoint.to_string(),
                expected: expected.to_string(),
            });
        }

        let mut tx = SignableTransaction::new(spending);
        tx.entries[input_index] = Some(UtxoEntry::from(output));
        Ok(Self { tx, input_index })
    }

    pub fn transaction(&self) -> &SignableTransaction {
        &self.tx
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn amount(&self) -> u64 {
        self.tx.utxo(self.input_index).map_or(0, |entry| entry.amount)
    }

    /// Locking script of the output being spent.
    pub fn locking_script(&self) -> &[u8] {
        self.tx.utxo(self.input_index).map_or(&[][..], |entry| entry.script_public_key.script())
    }

    /// Unlocking script carried by the spending input.
    pub fn unlocking_script(&self) -> &[u8] {
        self.tx.inputs().get(self.input_index).map_or(&[][..], |input| input.signature_script.as_slice())
    }
}
