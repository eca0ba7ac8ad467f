use lockbox_hashes::{HASH_SIZE, Hash, HasherBase};
use thiserror::Error;

use super::{ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput};
use crate::hashing::{compact_size_len, tx::write_transaction};

/// Upper bound on declared item counts, far above anything a valid transaction can hold.
const MAX_DECLARED_ITEMS: u64 = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEnd { offset: usize, needed: usize },

    #[error("{0} trailing bytes after the transaction")]
    TrailingBytes(usize),

    #[error("declared {what} count {count} at offset {offset} is implausible")]
    ImplausibleCount { what: &'static str, count: u64, offset: usize },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[derive(Default)]
struct ByteWriter(Vec<u8>);

impl HasherBase for ByteWriter {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
        self.0.extend_from_slice(data.as_ref());
        self
    }
}

pub(super) fn serialize(tx: &Transaction) -> Vec<u8> {
    let mut writer = ByteWriter(Vec::with_capacity(serialized_size(tx)));
    write_transaction(&mut writer, tx);
    writer.0
}

pub(super) fn serialized_size(tx: &Transaction) -> usize {
    let inputs: usize = tx
        .inputs
        .iter()
        .map(|input| 36 + compact_size_len(input.signature_script.len()) + input.signature_script.len() + 4)
        .sum();
    let outputs: usize = tx
        .outputs
        .iter()
        .map(|output| {
            let script = output.script_public_key.script();
            8 + compact_size_len(script.len()) + script.len()
        })
        .sum();
    4 + compact_size_len(tx.inputs.len()) + inputs + compact_size_len(tx.outputs.len()) + outputs + 4
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.bytes.len() - self.offset;
        if remaining < len {
            return Err(DecodeError::UnexpectedEnd { offset: self.offset, needed: len - remaining });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn compact_size(&mut self) -> Result<u64, DecodeError> {
        Ok(match self.u8()? {
            0xfd => u16::from_le_bytes(self.array()?) as u64,
            0xfe => self.u32()? as u64,
            0xff => self.u64()?,
            n => n as u64,
        })
    }

    fn count(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        let offset = self.offset;
        let count = self.compact_size()?;
        if count > MAX_DECLARED_ITEMS {
            return Err(DecodeError::ImplausibleCount { what, count, offset });
        }
        Ok(count as usize)
    }

    fn var_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.count("script byte")?;
        Ok(self.take(len)?.to_vec())
    }
}

pub(super) fn deserialize(bytes: &[u8]) -> Result<Transaction, DecodeError> {
    let mut reader = Reader { bytes, offset: 0 };
    let version = reader.u32()?;

    let input_count = reader.count("input")?;
    let mut inputs = Vec::with_capacity(input_count.min(1024));
    for _ in 0..input_count {
        let transaction_id = Hash::from_bytes(reader.array::<HASH_SIZE>()?);
        let index = reader.u32()?;
        let signature_script = reader.var_bytes()?;
        let sequence = reader.u32()?;
        inputs.push(TransactionInput::new(TransactionOutpoint::new(transaction_id, index), signature_script, sequence));
    }

    let output_count = reader.count("output")?;
    let mut outputs = Vec::with_capacity(output_count.min(1024));
    for _ in 0..output_count {
        let value = reader.u64()?;
        let script = reader.var_bytes()?;
        outputs.push(TransactionOutput::new(value, ScriptPublicKey::from_vec(script)));
    }

    let lock_time = reader.u32()?;
    if reader.offset != bytes.len() {
        return Err(DecodeError::TrailingBytes(bytes.len() - reader.offset));
    }
    Ok(Transaction::new(version, inputs, outputs, lock_time))
}
