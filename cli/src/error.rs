use lockbox_addresses::Prefix;
use lockbox_core::log::LogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Playground(#[from] lockbox_playground::Error),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("{what} belongs to {found} but the configured network is {expected}")]
    Network { what: &'static str, expected: Prefix, found: Prefix },

    #[error("no template named `{0}`")]
    UnknownTemplate(String),

    #[error("no opcode matches `{0}`")]
    UnknownOpcode(String),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Prefix shown before the message, naming the failure category when there is one.
    pub fn label(&self) -> String {
        match self {
            CliError::Playground(err) => format!("error [{}]", err.kind()),
            _ => "error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
