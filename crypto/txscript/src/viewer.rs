use crate::{
    TxScriptError,
    opcodes::{OpCodeImplementation, codes, opcode_name, to_small_int},
    parse_script,
};
use lockbox_consensus_core::tx::VerifiableTransaction;
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};

/// Renders a script one opcode per line, prefixed by its byte offset and
/// indented inside conditional blocks:
///
/// ```text
/// 0000: OP_IF
/// 0001:   OP_2
/// 0002: OP_ENDIF
/// ```
pub struct ScriptViewer<'a, T> {
    script: &'a [u8],
    _phantom: PhantomData<T>,
}

impl<'a, T: VerifiableTransaction> ScriptViewer<'a, T> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, _phantom: PhantomData }
    }

    fn render(&self) -> Result<String, TxScriptError> {
        let opcodes: Vec<_> = parse_script::<T>(self.script).collect::<Result<_, _>>()?;
        let mut s = String::new();
        let mut indent_level: usize = 0;
        let mut offset = 0;

        for (i, opcode) in opcodes.iter().enumerate() {
            let value = opcode.value();

            if value == codes::OpEndIf || value == codes::OpElse {
                indent_level = indent_level.saturating_sub(1);
            }

            s.push_str(&format!("{offset:04}: "));
            s.push_str(&"  ".repeat(indent_level));
            s.push_str(opcode_name(value));

            if (codes::OpData1..=codes::OpData75).contains(&value) {
                s.push(' ');
                s.push_str(&hex::encode(opcode.get_data()));
            } else if value == codes::OpPushData1 || value == codes::OpPushData2 || value == codes::OpPushData4 {
                let data = opcode.get_data();
                s.push_str(&format!(" {} {}", data.len(), hex::encode(data)));
            } else if (value == codes::OpCheckMultiSig || value == codes::OpCheckMultiSigVerify)
                && let Some((required, signers)) = multisig_counts(&opcodes[..i])
            {
                s.push_str(&format!(" // {required} of {signers}"));
            }

            s.push('\n');
            offset += opcode.serialize().len();

            if value == codes::OpIf || value == codes::OpNotIf || value == codes::OpElse {
                indent_level += 1;
            }
        }
        Ok(s)
    }
}

/// Reads the `m <keys...> n` prefix preceding a bare multisig check.
fn multisig_counts<T: VerifiableTransaction>(preceding: &[Box<dyn OpCodeImplementation<T>>]) -> Option<(u8, u8)> {
    let (last, rest) = preceding.split_last()?;
    let signers = to_small_int(last.as_ref())?;
    let required = rest.len().checked_sub(signers as usize + 1).map(|index| &rest[index])?;
    Some((to_small_int(required.as_ref())?, signers))
}

impl<T: VerifiableTransaction> Display for ScriptViewer<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.render() {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "Error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::codes::*;
    use lockbox_consensus_core::tx::PopulatedTransaction;

    type Viewer<'a> = ScriptViewer<'a, PopulatedTransaction<'a>>;

    #[test]
    fn test_conditional_indentation() {
        let script = [OpTrue, OpIf, Op2, OpElse, Op3, OpEndIf];
        let expected = "0000: OP_1\n0001: OP_IF\n0002:   OP_2\n0003: OP_ELSE\n0004:   OP_3\n0005: OP_ENDIF\n";
        assert_eq!(Viewer::new(&script).to_string(), expected);
    }

    #[test]
    fn test_pushes_and_offsets() {
        let mut script = vec![OpData2, 0xab, 0xcd, OpPushData1, 3, 1, 2, 3, OpDrop];
        let expected = "0000: OP_DATA_2 abcd\n0003: OP_PUSHDATA1 3 010203\n0008: OP_DROP\n";
        assert_eq!(Viewer::new(&script).to_string(), expected);

        script.truncate(6);
        assert!(Viewer::new(&script).to_string().starts_with("Error: "));
    }

    #[test]
    fn test_multisig_annotation() {
        let mut script = vec![OpTrue];
        for key in [[2u8; 33], [3u8; 33]] {
            script.push(OpData33);
            script.extend_from_slice(&key);
        }
        script.extend([Op2, OpCheckMultiSig]);
        let rendered = Viewer::new(&script).to_string();
        assert!(rendered.trim_end().ends_with("OP_CHECKMULTISIG // 1 of 2"), "{rendered}");
    }
}
