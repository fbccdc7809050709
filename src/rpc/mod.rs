//! JSON-RPC wire types.
//!
//! # Data Flow
//! ```text
//! request body bytes
//!     → call.rs (single call or batch, params kept raw)
//!     → [policy checks]
//!     → rejection.rs (JSON-RPC shaped error objects)
//! ```
//!
//! # Design Decisions
//! - Params stay as raw JSON; only the validators that need a field decode it
//! - Rejections mirror the request shape (object for a call, array for a batch)

pub mod call;
pub mod rejection;

pub use call::{Call, Entry, ParseError, RequestPayload};
pub use rejection::{Rejection, RejectionBody, RejectionReason};
