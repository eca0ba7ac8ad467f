use lockbox_addresses::AddressError;
use lockbox_consensus_core::{keys::KeyError, sign, tx::DecodeError};
use lockbox_txscript::{TxScriptError, script_builder::ScriptBuilderError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Failure categories shared by errors and trace rejections.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed script text, script bytes, transaction bytes or keys
    Parse,
    /// An input or output index outside the transaction
    Range,
    /// The signing key does not control the output being spent
    Ownership,
    /// Not enough value to cover the fee, or a result below the dust floor
    Funds,
    /// An opcode failed while running
    Execution,
    /// The scripts ran to the end but the final stack was refused
    Acceptance,
    /// The built transaction does not carry the requested unlocking script
    Consistency,
    /// Missing or mismatched spend context for a signature dependent script
    Context,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unrecognized token `{0}`")]
    UnknownToken(String),

    #[error("odd-length hex literal `{0}`")]
    OddLengthHex(String),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("malformed script: {0}")]
    Script(#[from] TxScriptError),

    #[error("script too large: {0}")]
    ScriptBuilder(#[from] ScriptBuilderError),

    #[error("malformed transaction: {0}")]
    Transaction(#[from] DecodeError),

    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("secret must not be empty")]
    EmptySecret,

    #[error("invalid fee rate {0}")]
    FeeRate(f64),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("output index {index} out of range, the transaction has {count} outputs")]
    OutputIndexOutOfRange { index: usize, count: usize },

    #[error("input index {index} out of range, the transaction has {count} inputs")]
    InputIndexOutOfRange { index: usize, count: usize },

    #[error("source output is not a pay-to-pubkey-hash output")]
    NotPayToPubkeyHash,

    #[error("source output pays to pubkey hash {found}, but the key hashes to {expected}")]
    KeyMismatch { expected: String, found: String },

    #[error("insufficient funds: {available} available, {required} required")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("output value {value} is below the dust threshold of {threshold}")]
    Dust { value: u64, threshold: u64 },

    #[error("built unlocking script {found} does not match the requested {expected}")]
    ScriptMismatch { expected: String, found: String },

    #[error("input {input_index} spends {spent}, not {expected}")]
    OutpointMismatch { input_index: usize, spent: String, expected: String },

    #[error("invalid spend context: {0}")]
    SpendContext(TxScriptError),

    #[error("`{0}` placeholder requires a signing key")]
    MissingKey(&'static str),

    #[error("signing failed: {0}")]
    Sign(#[from] sign::Error),

    #[error("chain service error: {0}")]
    Api(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownToken(_)
            | Error::OddLengthHex(_)
            | Error::Hex(_)
            | Error::Script(_)
            | Error::ScriptBuilder(_)
            | Error::Transaction(_)
            | Error::Key(_)
            | Error::Address(_)
            | Error::EmptySecret
            | Error::FeeRate(_)
            | Error::Settings(_) => ErrorKind::Parse,
            Error::OutputIndexOutOfRange { .. } | Error::InputIndexOutOfRange { .. } => ErrorKind::Range,
            Error::NotPayToPubkeyHash | Error::KeyMismatch { .. } => ErrorKind::Ownership,
            Error::InsufficientFunds { .. } | Error::Dust { .. } => ErrorKind::Funds,
            Error::ScriptMismatch { .. } => ErrorKind::Consistency,
            Error::OutpointMismatch { .. } | Error::SpendContext(_) | Error::MissingKey(_) | Error::Sign(_) | Error::Api(_) => ErrorKind::Context,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a trace or validation did not accept the scripts. Rejections are
/// results, not errors: the run itself completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Rejection {
    /// An opcode raised an error; `step` is the index of the failing step.
    Execution { step: usize, message: String },
    /// The run reached the step ceiling.
    SafetyLimit { limit: usize },
    EmptyStack,
    NotTruthy,
    CleanStack { remaining: usize },
}

impl Rejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Rejection::Execution { .. } | Rejection::SafetyLimit { .. } => ErrorKind::Execution,
            Rejection::EmptyStack | Rejection::NotTruthy | Rejection::CleanStack { .. } => ErrorKind::Acceptance,
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Execution { message, .. } => f.write_str(message),
            Rejection::SafetyLimit { limit } => write!(f, "safety limit exceeded: execution did not finish within {limit} steps"),
            Rejection::EmptyStack => f.write_str("stack empty after execution"),
            Rejection::NotTruthy => f.write_str("top of stack is not truthy"),
            Rejection::CleanStack { remaining } => write!(f, "clean stack rule violated: {remaining} items remain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::UnknownToken("OP_FOO".into()).kind(), ErrorKind::Parse);
        assert_eq!(Error::OutputIndexOutOfRange { index: 3, count: 1 }.kind(), ErrorKind::Range);
        assert_eq!(Error::KeyMismatch { expected: "aa".into(), found: "bb".into() }.kind(), ErrorKind::Ownership);
        assert_eq!(Error::Dust { value: 10, threshold: 546 }.kind(), ErrorKind::Funds);
        assert_eq!(Error::ScriptMismatch { expected: "51".into(), found: "".into() }.kind(), ErrorKind::Consistency);
        assert_eq!(Error::MissingKey("<sig>").kind(), ErrorKind::Context);
        assert_eq!(Error::from(TxScriptError::MalformedPush(2, 1)).kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(Rejection::EmptyStack.to_string(), "stack empty after execution");
        assert_eq!(Rejection::NotTruthy.to_string(), "top of stack is not truthy");
        assert_eq!(Rejection::CleanStack { remaining: 2 }.to_string(), "clean stack rule violated: 2 items remain");
        assert!(Rejection::SafetyLimit { limit: 10_000 }.to_string().starts_with("safety limit exceeded"));
        assert_eq!(Rejection::SafetyLimit { limit: 1 }.kind(), ErrorKind::Execution);
        assert_eq!(Rejection::CleanStack { remaining: 2 }.kind(), ErrorKind::Acceptance);
    }
}
