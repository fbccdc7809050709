//! Rejection reasons and their JSON-RPC error encoding.
//!
//! Codes are stable and part of the public contract:
//!
//! | Reason              | Code     |
//! |---------------------|----------|
//! | `MalformedRequest`  | `-32600` |
//! | `MethodNotAllowed`  | `-32601` |
//! | `BlockRangeTooWide` | `-32602` |
//! | `GasPriceTooLow`    | `-32003` |
//! | `RateLimited`       | `-32005` |

use serde::Serialize;
use serde_json::Value;

use crate::rpc::call::RequestPayload;

/// Why the proxy refused to forward a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MethodNotAllowed,
    RateLimited,
    GasPriceTooLow,
    BlockRangeTooWide,
    MalformedRequest,
}

impl RejectionReason {
    /// JSON-RPC error code sent to the client.
    pub fn code(self) -> i64 {
        match self {
            Self::MalformedRequest => -32600,
            Self::MethodNotAllowed => -32601,
            Self::BlockRangeTooWide => -32602,
            Self::GasPriceTooLow => -32003,
            Self::RateLimited => -32005,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::MalformedRequest => "invalid request",
            // Same text for every unlisted method, known to the node or not.
            Self::MethodNotAllowed => "method does not exist or is not available",
            Self::BlockRangeTooWide => "block range exceeds the allowed span",
            Self::GasPriceTooLow => "transaction gas price below the accepted minimum",
            Self::RateLimited => "request rate limit exceeded",
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRequest => "malformed_request",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::BlockRangeTooWide => "block_range_too_wide",
            Self::GasPriceTooLow => "gas_price_too_low",
            Self::RateLimited => "rate_limited",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

/// One JSON-RPC error response object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub error: ErrorObject,
}

impl ErrorResponse {
    fn new(id: Value, reason: RejectionReason) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: ErrorObject {
                code: reason.code(),
                message: reason.message().to_string(),
            },
        }
    }

    fn collateral(id: Value, reason: RejectionReason) -> Self {
        let mut response = Self::new(id, reason);
        response.error.message = format!("batch rejected: {}", reason.message());
        response
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RejectionBody {
    Single(ErrorResponse),
    Batch(Vec<ErrorResponse>),
}

/// A synthesized rejection, shaped like the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    reason: RejectionReason,
    body: RejectionBody,
}

impl Rejection {
    /// Rejection issued before any call id could be read.
    pub fn without_id(reason: RejectionReason) -> Self {
        Self {
            reason,
            body: RejectionBody::Single(ErrorResponse::new(Value::Null, reason)),
        }
    }

    /// Build the rejection for a payload given per-call verdicts.
    ///
    /// Returns `None` when every verdict is `None`. In a batch the calls that
    /// passed are answered with the first offending reason so that every id
    /// gets a response.
    pub fn for_payload(
        payload: &RequestPayload,
        verdicts: &[Option<RejectionReason>],
    ) -> Option<Self> {
        let first = verdicts.iter().flatten().next().copied()?;
        let body = match payload {
            RequestPayload::Single(entry) => {
                RejectionBody::Single(ErrorResponse::new(entry.id().clone(), first))
            }
            RequestPayload::Batch(entries) => RejectionBody::Batch(
                entries
                    .iter()
                    .zip(verdicts)
                    .map(|(entry, verdict)| match verdict {
                        Some(reason) => ErrorResponse::new(entry.id().clone(), *reason),
                        None => ErrorResponse::collateral(entry.id().clone(), first),
                    })
                    .collect(),
            ),
        };
        Some(Self { reason: first, body })
    }

    /// Reason of the first offending call.
    pub fn reason(&self) -> RejectionReason {
        self.reason
    }

    pub fn to_json(&self) -> Vec<u8> {
        // Plain structs of strings and numbers always serialize.
        serde_json::to_vec(&self.body).unwrap_or_default()
    }
}
