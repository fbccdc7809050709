//! Chain-specific types and error definitions.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding chain data carried in call params.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Payload is not valid hex.
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    /// Bytes do not decode as a signed transaction envelope.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Block parameter is neither a tag nor a block number.
    #[error("invalid block parameter: {0}")]
    InvalidBlockParameter(String),
}

/// Result type for chain decoding.
pub type ChainResult<T> = Result<T, ChainError>;

/// Symbolic block parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
}

impl BlockTag {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "latest" => Some(Self::Latest),
            "earliest" => Some(Self::Earliest),
            "pending" => Some(Self::Pending),
            "safe" => Some(Self::Safe),
            "finalized" => Some(Self::Finalized),
            _ => None,
        }
    }
}

/// One end of a block range as requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockBound {
    /// Concrete height.
    Number(u64),
    /// Tag resolved by the node, unknown to the proxy.
    Tag(BlockTag),
    /// Bound omitted or null.
    Unspecified,
}

impl BlockBound {
    /// Parse a `fromBlock`/`toBlock` value.
    ///
    /// Accepts `0x` quantities, decimal strings, JSON integers and block tags.
    pub fn from_json(value: Option<&Value>) -> ChainResult<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::Unspecified),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Self::Number)
                .ok_or_else(|| ChainError::InvalidBlockParameter(n.to_string())),
            Some(Value::String(s)) => Self::parse_str(s),
            Some(other) => Err(ChainError::InvalidBlockParameter(other.to_string())),
        }
    }

    fn parse_str(s: &str) -> ChainResult<Self> {
        if let Some(tag) = BlockTag::parse(s) {
            return Ok(Self::Tag(tag));
        }
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse(),
        };
        parsed
            .map(Self::Number)
            .map_err(|_| ChainError::InvalidBlockParameter(s.to_string()))
    }

    /// Concrete height, if known without asking the node.
    pub fn height(self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Tag(_) | Self::Unspecified => None,
        }
    }
}
