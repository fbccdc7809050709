//! Request policy subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, exempt list)
//!     → [body parsed into calls]
//!     → matcher.rs (method allow-list)
//!     → validators.rs (gas floor, block range ceiling)
//!     → Forward or reject
//! ```
//!
//! # Design Decisions
//! - Fail closed: an undecodable checked call is rejected, not forwarded
//! - No trust in client input
//! - All policy is fixed at startup

pub mod matcher;
pub mod rate_limit;
pub mod validators;

pub use matcher::{MatcherError, MethodMatcher};
pub use rate_limit::RateLimiterRegistry;
pub use validators::CallValidators;
