use lockbox_hashes::{DoubleSha256, Hash, Hasher, HasherBase, ZERO_HASH};
use std::cell::Cell;

use super::{
    HasherExtensions,
    sighash_type::SigHashType,
    tx::{write_outpoint, write_output},
};
use crate::tx::VerifiableTransaction;

/// Partial digests shared by all inputs of one transaction. A single instance
/// must only ever be used with the transaction it was first filled from.
#[derive(Default)]
pub struct SigHashReusedValues {
    previous_outputs_hash: Cell<Option<Hash>>,
    sequence_hash: Cell<Option<Hash>>,
    outputs_hash: Cell<Option<Hash>>,
}

impl SigHashReusedValues {
    pub fn new() -> Self {
        Self::default()
    }
}

fn previous_outputs_hash(tx: &impl VerifiableTransaction, hash_type: SigHashType, reused_values: &SigHashReusedValues) -> Hash {
    if hash_type.is_sighash_anyone_can_pay() {
        return ZERO_HASH;
    }

    if let Some(previous_outputs_hash) = reused_values.previous_outputs_hash.get() {
        previous_outputs_hash
    } else {
        let mut hasher = DoubleSha256::new();
        for input in tx.inputs() {
            write_outpoint(&mut hasher, &input.previous_outpoint);
        }
        let previous_outputs_hash = hasher.finalize();
        reused_values.previous_outputs_hash.set(Some(previous_outputs_hash));
        previous_outputs_hash
    }
}

fn sequence_hash(tx: &impl VerifiableTransaction, hash_type: SigHashType, reused_values: &SigHashReusedValues) -> Hash {
    if hash_type.is_sighash_single() || hash_type.is_sighash_anyone_can_pay() || hash_type.is_sighash_none() {
        return ZERO_HASH;
    }

    if let Some(sequence_hash) = reused_values.sequence_hash.get() {
        sequence_hash
    } else {
        let mut hasher = DoubleSha256::new();
        for input in tx.inputs() {
            hasher.write_u32(input.sequence);
        }
        let sequence_hash = hasher.finalize();
        reused_values.sequence_hash.set(Some(sequence_hash));
        sequence_hash
    }
}

fn outputs_hash(tx: &impl VerifiableTransaction, hash_type: SigHashType, reused_values: &SigHashReusedValues, input_index: usize) -> Hash {
    if hash_type.is_sighash_none() {
        return ZERO_HASH;
    }

    if hash_type.is_sighash_single() {
        // If the relevant output exists - return its hash, otherwise return zero-hash
        return match tx.outputs().get(input_index) {
            Some(output) => {
                let mut hasher = DoubleSha256::new();
                write_output(&mut hasher, output);
                hasher.finalize()
            }
            None => ZERO_HASH,
        };
    }

    // Otherwise, return hash of all outputs. Re-use hash if available.
    if let Some(outputs_hash) = reused_values.outputs_hash.get() {
        outputs_hash
    } else {
        let mut hasher = DoubleSha256::new();
        for output in tx.outputs() {
            write_output(&mut hasher, output);
        }
        let outputs_hash = hasher.finalize();
        reused_values.outputs_hash.set(Some(outputs_hash));
        outputs_hash
    }
}

/// Computes the replay-protected (fork id) signature digest of one input.
///
/// `script_code` is the script being satisfied, from the last executed
/// OP_CODESEPARATOR on, and `amount` the value of the output being spent.
///
/// # Panics
///
/// Panics if `input_index` is not an input of `tx`.
pub fn calc_signature_hash(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    script_code: &[u8],
    amount: u64,
    hash_type: SigHashType,
    reused_values: &SigHashReusedValues,
) -> Hash {
    let input = &tx.inputs()[input_index];
    let mut hasher = DoubleSha256::new();
    hasher.write_u32(tx.tx().version);
    hasher.update(previous_outputs_hash(tx, hash_type, reused_values));
    hasher.update(sequence_hash(tx, hash_type, reused_values));
    write_outpoint(&mut hasher, &input.previous_outpoint);
    hasher.write_var_bytes(script_code);
    hasher.write_u64(amount);
    hasher.write_u32(input.sequence);
    hasher.update(outputs_hash(tx, hash_type, reused_values, input_index));
    hasher.write_u32(tx.tx().lock_time);
    hasher.write_u32(hash_type.to_u8() as u32);
    hasher.finalize()
}
