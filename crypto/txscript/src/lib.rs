mod data_stack;
pub mod opcodes;
pub mod script_builder;
pub mod script_class;
pub mod standard;
pub mod viewer;

use crate::data_stack::DataStack;
use crate::opcodes::{OpCodeImplementation, OpCond, deserialize_next_opcode};
use itertools::Itertools;
use lockbox_consensus_core::hashing::sighash::{SigHashReusedValues, calc_signature_hash};
use lockbox_consensus_core::hashing::sighash_type::SigHashType;
use lockbox_consensus_core::tx::{TransactionInput, UtxoEntry, VerifiableTransaction};
use log::trace;
use secp256k1::{Message, PublicKey, SECP256K1, ecdsa::Signature};

pub use data_stack::{Stack, cast_to_bool};
pub use lockbox_txscript_errors::TxScriptError;
pub use standard::*;

pub const MAX_STACK_SIZE: usize = 1000;
pub const MAX_SCRIPTS_SIZE: usize = 10_000;
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
pub const MAX_OPS_PER_SCRIPT: usize = 500_000;
pub const MAX_SCRIPT_NUM_LEN: usize = 4;
pub const MAX_PUB_KEYS_PER_MULTISIG: i32 = 20;

// The last opcode that does not count toward operations.
// Note that this includes OP_RESERVED which counts as a push operation.
pub const NO_COST_OPCODE: u8 = 0x60;

type DynOpcodeImplementation<Tx> = Box<dyn OpCodeImplementation<Tx>>;

enum ScriptSource<'a, T: VerifiableTransaction> {
    TxInput { tx: &'a T, idx: usize, amount: u64 },
    StandAloneScripts,
}

/// The opcode most recently decoded by [`TxScriptEngine::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedOpcode {
    /// Index of the script the opcode belongs to (0 is the unlocking script when running an input)
    pub script_index: usize,
    /// Byte offset of the opcode within its script
    pub offset: usize,
    pub value: u8,
    pub data: Vec<u8>,
    /// False when the opcode sat in a branch that was not taken
    pub executed: bool,
}

pub struct TxScriptEngine<'a, T: VerifiableTransaction> {
    dstack: Stack,
    astack: Stack,

    script_source: ScriptSource<'a, T>,
    scripts: Vec<&'a [u8]>,
    script_index: usize,
    // Byte offset of the next opcode in the current script
    pc: usize,
    // Start of the signed script code, moved by OP_CODESEPARATOR
    code_separator: usize,

    // Outer caches for quicker calculation
    reused_values: &'a SigHashReusedValues,

    cond_stack: Vec<OpCond>, // Following if stacks, and whether it is running

    num_ops: usize,
    verify_only_push: bool,
    last_opcode: Option<ExecutedOpcode>,
}

pub fn parse_script<T: VerifiableTransaction>(
    script: &[u8],
) -> impl Iterator<Item = Result<DynOpcodeImplementation<T>, TxScriptError>> + '_ {
    script.iter().batching(|it| deserialize_next_opcode(it))
}

/// A script is provably unspendable when it cannot be parsed or starts with OP_RETURN.
pub fn is_unspendable<T: VerifiableTransaction>(script: &[u8]) -> bool {
    parse_script::<T>(script)
        .enumerate()
        .any(|(index, op)| op.map_or(true, |op| index == 0 && op.value() == opcodes::codes::OpReturn))
}

impl<'a, T: VerifiableTransaction> TxScriptEngine<'a, T> {
    pub fn new(reused_values: &'a SigHashReusedValues) -> Self {
        Self {
            dstack: vec![],
            astack: vec![],
            script_source: ScriptSource::StandAloneScripts,
            scripts: vec![],
            script_index: 0,
            pc: 0,
            code_separator: 0,
            reused_values,
            cond_stack: vec![],
            num_ops: 0,
            verify_only_push: false,
            last_opcode: None,
        }
    }

    /// Creates an engine running the unlocking script of input `input_idx` followed by the
    /// locking script of the UTXO it spends.
    ///
    /// With `verify_only_push` the unlocking script may only contain push opcodes, as the
    /// network requires for relayed transactions.
    pub fn from_transaction_input(
        tx: &'a T,
        input_idx: usize,
        reused_values: &'a SigHashReusedValues,
        verify_only_push: bool,
    ) -> Result<Self, TxScriptError> {
        let (input, utxo_entry) = Self::populated_input(tx, input_idx)?;
        Ok(Self {
            script_source: ScriptSource::TxInput { tx, idx: input_idx, amount: utxo_entry.amount },
            scripts: vec![input.signature_script.as_slice(), utxo_entry.script_public_key.script()],
            verify_only_push,
            ..Self::new(reused_values)
        })
    }

    /// Creates an engine running arbitrary unlocking and locking scripts, with signature
    /// checks computed as if they spent input `input_idx` of `tx`.
    pub fn from_scripts(
        tx: &'a T,
        input_idx: usize,
        unlocking: &'a [u8],
        locking: &'a [u8],
        reused_values: &'a SigHashReusedValues,
    ) -> Result<Self, TxScriptError> {
        let (_, utxo_entry) = Self::populated_input(tx, input_idx)?;
        Ok(Self {
            script_source: ScriptSource::TxInput { tx, idx: input_idx, amount: utxo_entry.amount },
            scripts: vec![unlocking, locking],
            ..Self::new(reused_values)
        })
    }

    pub fn from_script(script: &'a [u8], reused_values: &'a SigHashReusedValues) -> Self {
        Self { scripts: vec![script], ..Self::new(reused_values) }
    }

    fn populated_input(tx: &'a T, input_idx: usize) -> Result<(&'a TransactionInput, &'a UtxoEntry), TxScriptError> {
        let inputs = tx.inputs().len();
        if input_idx >= inputs {
            return Err(TxScriptError::InvalidIndex(input_idx, inputs));
        }
        tx.populated_input(input_idx).ok_or(TxScriptError::MissingUtxoEntry(input_idx))
    }

    #[inline]
    pub fn is_executing(&self) -> bool {
        matches!(self.cond_stack.last(), None | Some(OpCond::True))
    }

    pub fn stack(&self) -> &Stack {
        &self.dstack
    }

    pub fn alt_stack(&self) -> &Stack {
        &self.astack
    }

    /// Byte offset of the next opcode within the current script.
    pub fn program_counter(&self) -> usize {
        self.pc
    }

    /// Index of the script currently running. Equals the number of scripts once done.
    pub fn script_index(&self) -> usize {
        self.script_index
    }

    pub fn last_opcode(&self) -> Option<&ExecutedOpcode> {
        self.last_opcode.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.script_index >= self.scripts.len()
    }

    fn execute_opcode(&mut self, opcode: DynOpcodeImplementation<T>) -> Result<(), TxScriptError> {
        // Different from the reference client: illegal and disabled opcodes are checked by the caller
        if !opcode.is_push_opcode() {
            self.num_ops += 1;
            if self.num_ops > MAX_OPS_PER_SCRIPT {
                return Err(TxScriptError::TooManyOperations(MAX_OPS_PER_SCRIPT));
            }
        } else if opcode.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(TxScriptError::ElementTooBig(opcode.len(), MAX_SCRIPT_ELEMENT_SIZE));
        }

        if self.is_executing() || opcode.is_conditional() { opcode.execute(self) } else { Ok(()) }
    }

    // Moving between scripts - we can't be inside an if
    fn finish_script(&mut self) -> Result<(), TxScriptError> {
        if !self.cond_stack.is_empty() {
            return Err(TxScriptError::ErrUnbalancedConditional);
        }

        // Alt stack doesn't persist
        self.astack.clear();
        self.num_ops = 0; // number of ops is per script.
        self.script_index += 1;
        self.pc = 0;
        self.code_separator = 0;
        Ok(())
    }

    /// Executes the next opcode, crossing into the next script when the current one is
    /// exhausted. Opcodes in branches that are not taken still count as a step.
    ///
    /// Returns `Ok(false)` once every script has run.
    pub fn step(&mut self) -> Result<bool, TxScriptError> {
        self.last_opcode = None;

        let script = loop {
            let Some(&script) = self.scripts.get(self.script_index) else {
                return Ok(false);
            };
            if self.pc == 0 && script.len() > MAX_SCRIPTS_SIZE {
                return Err(TxScriptError::ScriptSize(script.len(), MAX_SCRIPTS_SIZE));
            }
            if self.pc < script.len() {
                break script;
            }
            self.finish_script()?;
        };

        let offset = self.pc;
        let mut it = script[offset..].iter();
        let Some(opcode) = deserialize_next_opcode(&mut it) else {
            return Ok(false);
        };
        let opcode = opcode?;
        self.pc = script.len() - it.len();
        self.last_opcode = Some(ExecutedOpcode {
            script_index: self.script_index,
            offset,
            value: opcode.value(),
            data: opcode.get_data().to_vec(),
            executed: self.is_executing(),
        });
        trace!("script {} offset {offset}: {:?}", self.script_index, opcode);

        if opcode.is_disabled() {
            return Err(TxScriptError::OpcodeDisabled(format!("{opcode:?}")));
        }

        if opcode.always_illegal() {
            return Err(TxScriptError::OpcodeReserved(format!("{opcode:?}")));
        }

        let unlocking = self.script_index == 0 && matches!(self.script_source, ScriptSource::TxInput { .. });
        if self.verify_only_push && unlocking && !opcode.is_push_opcode() {
            return Err(TxScriptError::SignatureScriptNotPushOnly);
        }

        self.execute_opcode(opcode)?;

        let combined_size = self.astack.len() + self.dstack.len();
        if combined_size > MAX_STACK_SIZE {
            return Err(TxScriptError::StackSizeExceeded(combined_size, MAX_STACK_SIZE));
        }
        Ok(true)
    }

    /// Runs every remaining opcode and applies the final stack rule.
    pub fn execute(&mut self) -> Result<(), TxScriptError> {
        if self.scripts.is_empty() {
            return Err(TxScriptError::NoScripts);
        }
        if let Some(s) = self.scripts.iter().find(|s| s.len() > MAX_SCRIPTS_SIZE) {
            return Err(TxScriptError::ScriptSize(s.len(), MAX_SCRIPTS_SIZE));
        }

        while self.step()? {}
        self.check_error_condition()
    }

    // Returns Ok(()) if the scripts ended leaving exactly one true item on the stack.
    #[inline]
    fn check_error_condition(&mut self) -> Result<(), TxScriptError> {
        if self.dstack.len() > 1 {
            return Err(TxScriptError::CleanStack(self.dstack.len() - 1));
        } else if self.dstack.is_empty() {
            return Err(TxScriptError::EmptyStack);
        }

        let [v]: [bool; 1] = self.dstack.pop_items()?;
        match v {
            true => Ok(()),
            false => Err(TxScriptError::EvalFalse),
        }
    }

    // *** SIGNATURE SPECIFIC CODE **

    /// Checks a DER signature with a trailing sighash byte against `key`, signing the current
    /// script from the last executed OP_CODESEPARATOR. Undecodable keys and signatures are
    /// reported as an invalid signature, unsupported sighash types as an error.
    pub(crate) fn check_signature(&self, key: &[u8], sig: &[u8]) -> Result<bool, TxScriptError> {
        let ScriptSource::TxInput { tx, idx, amount } = self.script_source else {
            return Err(TxScriptError::NotATransactionInput);
        };
        let Some((&typ, der)) = sig.split_last() else {
            return Ok(false);
        };
        let hash_type = SigHashType::from_u8(typ).map_err(|_| TxScriptError::InvalidSigHashType(typ))?;

        let Ok(public_key) = PublicKey::from_slice(key) else {
            return Ok(false);
        };
        let Ok(mut signature) = Signature::from_der(der) else {
            return Ok(false);
        };
        signature.normalize_s();

        let script = self.scripts.get(self.script_index).copied().unwrap_or_default();
        let script_code = script.get(self.code_separator..).unwrap_or_default();
        let sig_hash = calc_signature_hash(tx, idx, script_code, amount, hash_type, self.reused_values);
        let msg = Message::from_digest(sig_hash.as_bytes());
        Ok(SECP256K1.verify_ecdsa(&msg, &signature, &public_key).is_ok())
    }

    pub(crate) fn op_check_multisig(&mut self) -> Result<(), TxScriptError> {
        let [num_keys]: [i32; 1] = self.dstack.pop_items()?;
        if num_keys < 0 {
            return Err(TxScriptError::InvalidPubKeyCount(format!("number of pubkeys {num_keys} is negative")));
        } else if num_keys > MAX_PUB_KEYS_PER_MULTISIG {
            return Err(TxScriptError::InvalidPubKeyCount(format!("too many pubkeys {num_keys} > {MAX_PUB_KEYS_PER_MULTISIG}")));
        }
        let num_keys_usize = num_keys as usize;

        self.num_ops += num_keys_usize;
        if self.num_ops > MAX_OPS_PER_SCRIPT {
            return Err(TxScriptError::TooManyOperations(MAX_OPS_PER_SCRIPT));
        }

        let pub_keys = match self.dstack.len() >= num_keys_usize {
            true => self.dstack.split_off(self.dstack.len() - num_keys_usize),
            false => return Err(TxScriptError::InvalidStackOperation(num_keys_usize, self.dstack.len())),
        };

        let [num_sigs]: [i32; 1] = self.dstack.pop_items()?;
        if num_sigs < 0 {
            return Err(TxScriptError::InvalidSignatureCount(format!("number of signatures {num_sigs} is negative")));
        } else if num_sigs > num_keys {
            return Err(TxScriptError::InvalidSignatureCount(format!("more signatures than pubkeys {num_sigs} > {num_keys}")));
        }
        let num_sigs = num_sigs as usize;

        let signatures = match self.dstack.len() >= num_sigs {
            true => self.dstack.split_off(self.dstack.len() - num_sigs),
            false => return Err(TxScriptError::InvalidStackOperation(num_sigs, self.dstack.len())),
        };

        // The historical off-by-one: one more element is consumed and ignored
        let [_dummy] = self.dstack.pop_raw()?;

        let mut failed = false;
        let mut pub_key_iter = pub_keys.iter();
        'outer: for (sig_idx, signature) in signatures.iter().enumerate() {
            if signature.is_empty() {
                failed = true;
                break;
            }

            // Advance through the pub_keys iterator.
            // Note every check consumes the public key
            loop {
                if pub_key_iter.len() < num_sigs - sig_idx {
                    // When there are more signatures than public keys remaining,
                    // there is no way to succeed since too many signatures are
                    // invalid, so exit early.
                    failed = true;
                    break 'outer;
                }
                let Some(pub_key) = pub_key_iter.next() else {
                    failed = true;
                    break 'outer;
                };
                if self.check_signature(pub_key, signature)? {
                    // Current sig is valid, continue to next sig
                    break;
                }
            }
        }

        if failed && signatures.iter().any(|sig| !sig.is_empty()) {
            return Err(TxScriptError::NullFail);
        }

        self.dstack.push_item(!failed);
        Ok(())
    }
}
