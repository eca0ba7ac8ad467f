use std::iter::once;

use crate::{
    MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPTS_SIZE,
    opcodes::{OP_DATA_MAX_VAL, OP_DATA_MIN_VAL, codes::*},
};
use thiserror::Error;

/// DEFAULT_SCRIPT_ALLOC is the default size used for the backing array
/// for a script being built by the ScriptBuilder. The array will
/// dynamically grow as needed, but this figure is intended to provide
/// enough space for vast majority of scripts without needing to grow the
/// backing array multiple times.
const DEFAULT_SCRIPT_ALLOC: usize = 512;

#[derive(Error, PartialEq, Eq, Debug, Clone, Copy)]
pub enum ScriptBuilderError {
    #[error("adding opcode {0} would exceed the maximum allowed script length of {MAX_SCRIPTS_SIZE}")]
    OpCodeRejected(u8),

    #[error("adding {0} opcodes would exceed the maximum allowed script length of {MAX_SCRIPTS_SIZE}")]
    OpCodesRejected(usize),

    #[error("adding {0} bytes of data would exceed the maximum allowed script length of {MAX_SCRIPTS_SIZE}")]
    DataRejected(usize),

    #[error("adding a data element of {0} bytes exceed the maximum allowed script element size of {MAX_SCRIPT_ELEMENT_SIZE}")]
    ElementExceedsMaxSize(usize),
}
pub type ScriptBuilderResult<T> = std::result::Result<T, ScriptBuilderError>;

/// ScriptBuilder assembles a script from opcodes and data pushes. It does not
/// check that the script executes correctly, but it refuses pushes and opcodes
/// that would take the script past the engine's size limits.
///
/// For example, the following would build a bare 2-of-3 multisig script:
///
/// ```
/// use lockbox_txscript::opcodes::codes::*;
/// use lockbox_txscript::script_builder::{ScriptBuilderResult, ScriptBuilder};
/// fn build_multisig_script(pub_key1: &[u8], pub_key2: &[u8], pub_key3: &[u8]) -> ScriptBuilderResult<Vec<u8>> {
///     Ok(ScriptBuilder::new()
///         .add_op(Op2)?
///         .add_data(pub_key1)?.add_data(pub_key2)?.add_data(pub_key3)?
///         .add_op(Op3)?
///         .add_op(OpCheckMultiSig)?
///         .drain())
/// }
/// ```
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self { script: Vec::with_capacity(DEFAULT_SCRIPT_ALLOC) }
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    pub fn drain(&mut self) -> Vec<u8> {
        // The builder is not reused after drain, so the taken script leaves no capacity behind
        std::mem::take(&mut self.script)
    }

    /// Appends `opcode`, leaving the script untouched if it is already at the size limit.
    pub fn add_op(&mut self, opcode: u8) -> ScriptBuilderResult<&mut Self> {
        if self.script.len() >= MAX_SCRIPTS_SIZE {
            return Err(ScriptBuilderError::OpCodeRejected(opcode));
        }

        self.script.push(opcode);
        Ok(self)
    }

    pub fn add_ops(&mut self, opcodes: &[u8]) -> ScriptBuilderResult<&mut Self> {
        if self.script.len() + opcodes.len() > MAX_SCRIPTS_SIZE {
            return Err(ScriptBuilderError::OpCodesRejected(opcodes.len()));
        }

        self.script.extend_from_slice(opcodes);
        Ok(self)
    }

    /// Bytes taken by the push opcode and length prefix in front of `data_len` bytes.
    fn push_header_size(data_len: usize) -> usize {
        if data_len <= OP_DATA_MAX_VAL as usize {
            1 // length encoded as OpData#
        } else if data_len <= u8::MAX as usize {
            2 // length encoded as OpPushData1 + 1 byte for value
        } else {
            3 // length encoded as OpPushData2 + 2 bytes for value
        }
    }

    /// Pushes `data` exactly as given with the shortest push opcode for its length.
    /// A one byte element stays a one byte data push instead of becoming the
    /// equivalent small integer opcode, so a hex literal always decodes back to
    /// the same literal. An empty element is pushed as OP_0.
    ///
    /// Elements over [`MAX_SCRIPT_ELEMENT_SIZE`] bytes, or pushes that would take the
    /// script past [`MAX_SCRIPTS_SIZE`], are refused and leave the script unmodified.
    pub fn add_data(&mut self, data: &[u8]) -> ScriptBuilderResult<&mut Self> {
        let data_len = data.len();
        let data_size = data_len + Self::push_header_size(data_len);
        if self.script.len() + data_size > MAX_SCRIPTS_SIZE {
            return Err(ScriptBuilderError::DataRejected(data_size));
        }
        if data_len > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(ScriptBuilderError::ElementExceedsMaxSize(data_len));
        }

        if data_len == 0 {
            self.script.push(Op0);
        } else if data_len <= OP_DATA_MAX_VAL as usize {
            self.script.push((OP_DATA_MIN_VAL - 1) + data_len as u8);
        } else if data_len <= u8::MAX as usize {
            self.script.extend(once(OpPushData1).chain(once(data_len as u8)));
        } else {
            self.script.extend(once(OpPushData2).chain((data_len as u16).to_le_bytes()));
        }
        self.script.extend_from_slice(data);
        Ok(self)
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
