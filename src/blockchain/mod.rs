//! Chain data decoding.
//!
//! # Data Flow
//! ```text
//! raw call params (hex strings, filter objects)
//!     → transaction.rs (EIP-2718 envelope → fee cap)
//!     → types.rs (block bounds, tags)
//!     → consumed by security::validators
//! ```
//!
//! # Constraints
//! - Decoding only; the proxy never talks to the chain itself
//! - No signature recovery

pub mod transaction;
pub mod types;

pub use transaction::fee_cap_per_gas;
pub use types::{BlockBound, BlockTag, ChainError, ChainResult};
