/// Errors raised by the chain command layer
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("{flag} required")]
    MissingFlag { flag: &'static str },

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("cannot parse signature: {0}")]
    SignatureSyntax(String),

    #[error("Address \"{0}\" is invalid.")]
    AddressFormat(String),

    #[error("invalid {kind} argument: {value}")]
    InvalidArgument { kind: String, value: String },

    #[error("abi error: {0}")]
    Abi(String),

    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected rpc response for {method}: {detail}")]
    Response { method: String, detail: String },

    #[error("{0} could not be found")]
    NotFound(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("transaction {0} not mined before timeout")]
    ReceiptTimeout(String),
}

impl ChainError {
    pub fn invalid(kind: impl Into<String>, value: impl Into<String>) -> Self {
        ChainError::InvalidArgument {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl From<alloy_dyn_abi::Error> for ChainError {
    fn from(e: alloy_dyn_abi::Error) -> Self {
        ChainError::Abi(e.to_string())
    }
}

pub type ChainResult<T> = std::result::Result<T, ChainError>;
