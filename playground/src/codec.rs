//! Conversion between ASM text and script bytes.
//!
//! ASM is a whitespace separated list of tokens. A token is either an opcode
//! name (`OP_ADD`), one of the numeric shorthands `0` and `-1`, or an even
//! length hex literal that becomes a push of exactly those bytes.

use crate::error::{Error, Result};
use itertools::Itertools;
use lockbox_consensus_core::tx::PopulatedTransaction;
use lockbox_txscript::{
    opcodes::{OPCODE_TABLE, codes},
    parse_script,
    script_builder::ScriptBuilder,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opcode names retired to no-ops, rewritten before parsing.
pub const ALIASES: [(&str, &str); 2] = [("OP_CHECKLOCKTIMEVERIFY", "OP_NOP2"), ("OP_CHECKSEQUENCEVERIFY", "OP_NOP3")];

/// Additional spellings accepted for opcodes with a canonical name in the table.
const SYNONYMS: [(&str, u8); 2] = [("OP_FALSE", codes::OpFalse), ("OP_TRUE", codes::OpTrue)];

/// Opcode value by name. Direct push opcodes are left out: in ASM a push is written as its data.
static OPCODE_BY_NAME: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    OPCODE_TABLE
        .iter()
        .filter(|(value, _)| !is_data_push(*value))
        .map(|&(value, name)| (name, value))
        .chain(SYNONYMS)
        .collect()
});

type Tx = PopulatedTransaction<'static>;

fn is_data_push(value: u8) -> bool {
    (codes::OpData1..=codes::OpPushData4).contains(&value)
}

/// Looks up an opcode by name, accepting aliases and the `OP_FALSE`/`OP_TRUE` spellings.
pub fn opcode_by_name(name: &str) -> Option<u8> {
    let name = ALIASES.iter().find(|(alias, _)| *alias == name).map_or(name, |(_, target)| *target);
    OPCODE_BY_NAME.get(name).copied()
}

/// Rewrites retired opcode names to the no-op they became.
pub fn normalize_aliases(asm: &str) -> String {
    asm.split_whitespace().map(|token| ALIASES.iter().find(|(alias, _)| *alias == token).map_or(token, |(_, target)| *target)).join(" ")
}

pub fn parse_asm(asm: &str) -> Result<Vec<u8>> {
    let mut builder = ScriptBuilder::new();
    for token in normalize_aliases(asm).split_whitespace() {
        match token {
            "0" => builder.add_op(codes::OpFalse)?,
            "-1" => builder.add_op(codes::Op1Negate)?,
            _ => match OPCODE_BY_NAME.get(token) {
                Some(&value) => builder.add_op(value)?,
                None => builder.add_data(&parse_hex_token(token)?)?,
            },
        };
    }
    Ok(builder.drain())
}

fn parse_hex_token(token: &str) -> Result<Vec<u8>> {
    if !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::UnknownToken(token.to_string()));
    }
    if token.len() % 2 != 0 {
        return Err(Error::OddLengthHex(token.to_string()));
    }
    Ok(hex::decode(token)?)
}

/// Renders one opcode as an ASM token.
pub fn opcode_token(value: u8, data: &[u8]) -> String {
    if is_data_push(value) {
        if data.is_empty() { "0".to_string() } else { hex::encode(data) }
    } else {
        lockbox_txscript::opcodes::opcode_name(value).to_string()
    }
}

pub fn to_asm(script: &[u8]) -> Result<String> {
    let tokens: Vec<String> =
        parse_script::<Tx>(script).map_ok(|opcode| opcode_token(opcode.value(), opcode.get_data())).try_collect()?;
    Ok(tokens.join(" "))
}

pub fn to_hex(script: &[u8]) -> String {
    hex::encode(script)
}

pub fn from_hex(script_hex: &str) -> Result<Vec<u8>> {
    let script_hex = script_hex.trim();
    if script_hex.len() % 2 != 0 {
        return Err(Error::OddLengthHex(script_hex.to_string()));
    }
    Ok(hex::decode(script_hex)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Converted {
    pub asm: String,
    pub was_hex: bool,
}

/// Accepts either script hex or ASM. Input that looks like hex and decodes to a
/// well formed script is rendered as ASM, anything else is returned as given.
pub fn detect_and_convert(input: &str) -> Converted {
    let trimmed = input.trim();
    let looks_like_hex = trimmed.len() >= 2 && trimmed.len() % 2 == 0 && trimmed.chars().all(|c| c.is_ascii_hexdigit());
    if looks_like_hex && let Ok(asm) = from_hex(trimmed).and_then(|script| to_asm(&script)) {
        return Converted { asm, was_hex: true };
    }
    Converted { asm: trimmed.to_string(), was_hex: false }
}
