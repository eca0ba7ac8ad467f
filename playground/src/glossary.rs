//! One line descriptions of the opcodes that can be written in ASM. Pushes
//! are written as their data, so they have no entry.

use crate::codec;
use lockbox_txscript::opcodes::{OPCODE_TABLE, codes};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpcodeCategory {
    Constants,
    FlowControl,
    Stack,
    Splice,
    Bitwise,
    Arithmetic,
    Crypto,
    Locktime,
    Reserved,
}

impl Display for OpcodeCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpcodeCategory::Constants => "constants",
            OpcodeCategory::FlowControl => "flow control",
            OpcodeCategory::Stack => "stack",
            OpcodeCategory::Splice => "splice",
            OpcodeCategory::Bitwise => "bitwise logic",
            OpcodeCategory::Arithmetic => "arithmetic",
            OpcodeCategory::Crypto => "crypto",
            OpcodeCategory::Locktime => "locktime",
            OpcodeCategory::Reserved => "reserved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlossaryEntry {
    pub code: u8,
    pub name: &'static str,
    pub category: OpcodeCategory,
    pub description: &'static str,
}

impl Display for GlossaryEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x} {:<22} [{}] {}", self.code, self.name, self.category, self.description)
    }
}

fn describe(code: u8) -> Option<(OpcodeCategory, &'static str)> {
    use OpcodeCategory::*;
    let entry = match code {
        codes::OpFalse => (Constants, "Pushes an empty byte array, which counts as false."),
        codes::Op1Negate => (Constants, "Pushes the number -1."),
        codes::OpTrue..=codes::Op16 => (Constants, "Pushes the number in its name (1 to 16)."),
        codes::OpNop => (FlowControl, "Does nothing."),
        codes::OpIf => (FlowControl, "Pops a value and runs the following branch if it is true."),
        codes::OpNotIf => (FlowControl, "Pops a value and runs the following branch if it is false."),
        codes::OpElse => (FlowControl, "Switches to the other branch of the innermost OP_IF."),
        codes::OpEndIf => (FlowControl, "Closes the innermost OP_IF. Every OP_IF needs one."),
        codes::OpVerify => (FlowControl, "Pops a value and fails the script unless it is true."),
        codes::OpReturn => (FlowControl, "Fails the script. Used to mark outputs that carry data."),
        codes::OpToAltStack => (Stack, "Moves the top item to the alt stack."),
        codes::OpFromAltStack => (Stack, "Moves the top alt stack item back to the main stack."),
        codes::Op2Drop => (Stack, "Removes the top two items."),
        codes::Op2Dup => (Stack, "Duplicates the top two items."),
        codes::Op3Dup => (Stack, "Duplicates the top three items."),
        codes::Op2Over => (Stack, "Copies the pair of items two pairs down to the top."),
        codes::Op2Rot => (Stack, "Moves the fifth and sixth items to the top."),
        codes::Op2Swap => (Stack, "Swaps the top two pairs of items."),
        codes::OpIfDup => (Stack, "Duplicates the top item if it is true."),
        codes::OpDepth => (Stack, "Pushes the number of stack items."),
        codes::OpDrop => (Stack, "Removes the top item."),
        codes::OpDup => (Stack, "Duplicates the top item."),
        codes::OpNip => (Stack, "Removes the second item from the top."),
        codes::OpOver => (Stack, "Copies the second item to the top."),
        codes::OpPick => (Stack, "Pops n and copies the item n back to the top."),
        codes::OpRoll => (Stack, "Pops n and moves the item n back to the top."),
        codes::OpRot => (Stack, "Moves the third item to the top."),
        codes::OpSwap => (Stack, "Swaps the top two items."),
        codes::OpTuck => (Stack, "Copies the top item below the second one."),
        codes::OpCat => (Splice, "Concatenates the top two items."),
        codes::OpSplit => (Splice, "Pops a position and splits the next item in two at it."),
        codes::OpNum2Bin => (Splice, "Pops a size and pads the next number to that many bytes."),
        codes::OpBin2Num => (Splice, "Converts a byte array to its minimal number encoding."),
        codes::OpSize => (Splice, "Pushes the length of the top item without removing it."),
        codes::OpInvert => (Bitwise, "Flips every bit of the top item."),
        codes::OpAnd => (Bitwise, "Bitwise AND of two equally sized items."),
        codes::OpOr => (Bitwise, "Bitwise OR of two equally sized items."),
        codes::OpXor => (Bitwise, "Bitwise XOR of two equally sized items."),
        codes::OpEqual => (Bitwise, "Pushes 1 if the top two items are byte for byte equal, 0 otherwise."),
        codes::OpEqualVerify => (Bitwise, "OP_EQUAL followed by OP_VERIFY."),
        codes::Op1Add => (Arithmetic, "Adds 1 to the top number."),
        codes::Op1Sub => (Arithmetic, "Subtracts 1 from the top number."),
        codes::Op2Mul | codes::Op2Div => (Arithmetic, "Disabled. Fails the script even in an unexecuted branch."),
        codes::OpNegate => (Arithmetic, "Flips the sign of the top number."),
        codes::OpAbs => (Arithmetic, "Replaces the top number with its absolute value."),
        codes::OpNot => (Arithmetic, "Turns 0 into 1 and any other number into 0."),
        codes::Op0NotEqual => (Arithmetic, "Turns 0 into 0 and any other number into 1."),
        codes::OpAdd => (Arithmetic, "a + b"),
        codes::OpSub => (Arithmetic, "a - b, where b is the top item."),
        codes::OpMul => (Arithmetic, "a * b"),
        codes::OpDiv => (Arithmetic, "a / b, truncated. Fails when b is 0."),
        codes::OpMod => (Arithmetic, "Remainder of a / b. Fails when b is 0."),
        codes::OpLShift => (Bitwise, "Shifts a byte array left by n bits."),
        codes::OpRShift => (Bitwise, "Shifts a byte array right by n bits."),
        codes::OpBoolAnd => (Arithmetic, "1 if both numbers are nonzero, 0 otherwise."),
        codes::OpBoolOr => (Arithmetic, "1 if either number is nonzero, 0 otherwise."),
        codes::OpNumEqual => (Arithmetic, "1 if the numbers are equal, 0 otherwise."),
        codes::OpNumEqualVerify => (Arithmetic, "OP_NUMEQUAL followed by OP_VERIFY."),
        codes::OpNumNotEqual => (Arithmetic, "1 if the numbers differ, 0 otherwise."),
        codes::OpLessThan => (Arithmetic, "1 if a < b, 0 otherwise."),
        codes::OpGreaterThan => (Arithmetic, "1 if a > b, 0 otherwise."),
        codes::OpLessThanOrEqual => (Arithmetic, "1 if a <= b, 0 otherwise."),
        codes::OpGreaterThanOrEqual => (Arithmetic, "1 if a >= b, 0 otherwise."),
        codes::OpMin => (Arithmetic, "The smaller of a and b."),
        codes::OpMax => (Arithmetic, "The larger of a and b."),
        codes::OpWithin => (Arithmetic, "1 if min <= x < max, 0 otherwise."),
        codes::OpRipemd160 => (Crypto, "Replaces the top item with its RIPEMD-160 hash."),
        codes::OpSha1 => (Crypto, "Replaces the top item with its SHA-1 hash."),
        codes::OpSha256 => (Crypto, "Replaces the top item with its SHA-256 hash."),
        codes::OpHash160 => (Crypto, "Replaces the top item with RIPEMD-160 of its SHA-256 hash."),
        codes::OpHash256 => (Crypto, "Replaces the top item with its double SHA-256 hash."),
        codes::OpCodeSeparator => (Crypto, "Marks where the script signed by signature checks begins."),
        codes::OpCheckSig => (Crypto, "Pops a public key and a signature and pushes whether the signature covers this spend."),
        codes::OpCheckSigVerify => (Crypto, "OP_CHECKSIG followed by OP_VERIFY."),
        codes::OpCheckMultiSig => (Crypto, "Checks m signatures against n public keys. Pops one extra item."),
        codes::OpCheckMultiSigVerify => (Crypto, "OP_CHECKMULTISIG followed by OP_VERIFY."),
        codes::OpNop2 => (Locktime, "Formerly OP_CHECKLOCKTIMEVERIFY. Now does nothing."),
        codes::OpNop3 => (Locktime, "Formerly OP_CHECKSEQUENCEVERIFY. Now does nothing."),
        codes::OpNop1 | codes::OpNop4..=codes::OpNop10 => (FlowControl, "Does nothing. Reserved for upgrades."),
        codes::OpReserved | codes::OpReserved1 | codes::OpReserved2 | codes::OpVer => {
            (Reserved, "Reserved. Fails the script if executed.")
        }
        codes::OpVerIf | codes::OpVerNotIf => (Reserved, "Reserved. Fails the script even in an unexecuted branch."),
        codes::OpSmallInteger | codes::OpPubKeys | codes::OpPubKeyHash | codes::OpPubKey | codes::OpInvalidOpCode => {
            (Reserved, "Template matching pseudo opcode. Invalid in a script.")
        }
        _ => return None,
    };
    Some(entry)
}

static GLOSSARY: Lazy<Vec<GlossaryEntry>> = Lazy::new(|| {
    OPCODE_TABLE
        .iter()
        .filter_map(|&(code, name)| describe(code).map(|(category, description)| GlossaryEntry { code, name, category, description }))
        .collect()
});

pub fn entries() -> &'static [GlossaryEntry] {
    &GLOSSARY
}

pub fn by_code(code: u8) -> Option<&'static GlossaryEntry> {
    GLOSSARY.iter().find(|entry| entry.code == code)
}

/// Finds an entry by opcode name (case insensitive, `OP_` optional, retired names
/// accepted) or by code, written in decimal or as `0x..`.
pub fn lookup(query: &str) -> Option<&'static GlossaryEntry> {
    let query = query.trim();
    let code = match query.strip_prefix("0x").or_else(|| query.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => query.parse::<u8>().ok(),
    };
    if let Some(code) = code {
        return by_code(code);
    }

    let upper = query.to_ascii_uppercase();
    let name = if upper.starts_with("OP_") { upper } else { format!("OP_{upper}") };
    codec::opcode_by_name(&name).and_then(by_code)
}
