//! Method-specific call validation.
//!
//! # Responsibilities
//! - Minimum fee for `eth_sendRawTransaction`
//! - Maximum block span for log/filter range queries
//!
//! # Design Decisions
//! - Only these methods have their params decoded; everything else passes unexamined
//! - Undecodable params on a checked method are a malformed request, never a pass
//! - A zero threshold switches the check off

use serde::Deserialize;
use serde_json::Value;

use crate::blockchain::{fee_cap_per_gas, BlockBound};
use crate::rpc::{Call, RejectionReason};

pub const SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

/// Methods taking a `{fromBlock, toBlock}` filter as first param.
pub const RANGE_METHODS: &[&str] = &["eth_getLogs", "eth_newFilter"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeFilter {
    #[serde(default)]
    from_block: Option<Value>,
    #[serde(default)]
    to_block: Option<Value>,
}

/// The call validators, configured once at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallValidators {
    /// Minimum fee per gas in wei; 0 disables.
    pub min_gas_price: u64,
    /// Maximum `toBlock - fromBlock`; 0 disables.
    pub max_block_range: u64,
}

impl CallValidators {
    pub fn new(min_gas_price: u64, max_block_range: u64) -> Self {
        Self {
            min_gas_price,
            max_block_range,
        }
    }

    /// Run every validator that applies to `call`.
    pub fn validate(&self, call: &Call) -> Result<(), RejectionReason> {
        if call.method == SEND_RAW_TRANSACTION {
            self.check_gas_price(call)?;
        }
        if RANGE_METHODS.contains(&call.method.as_str()) {
            self.check_block_range(call)?;
        }
        Ok(())
    }

    fn check_gas_price(&self, call: &Call) -> Result<(), RejectionReason> {
        if self.min_gas_price == 0 {
            return Ok(());
        }

        let raw: String = call
            .param(0)
            .ok()
            .flatten()
            .and_then(|p| serde_json::from_str(p.get()).ok())
            .ok_or(RejectionReason::MalformedRequest)?;

        let fee = fee_cap_per_gas(&raw).map_err(|e| {
            tracing::debug!(error = %e, "Undecodable raw transaction");
            RejectionReason::MalformedRequest
        })?;

        if fee < u128::from(self.min_gas_price) {
            tracing::debug!(fee, min = self.min_gas_price, "Gas price below floor");
            return Err(RejectionReason::GasPriceTooLow);
        }
        Ok(())
    }

    fn check_block_range(&self, call: &Call) -> Result<(), RejectionReason> {
        if self.max_block_range == 0 {
            return Ok(());
        }

        let filter: RangeFilter = match call.param(0) {
            Ok(Some(p)) => serde_json::from_str(p.get()).map_err(|_| RejectionReason::MalformedRequest)?,
            Ok(None) => return Ok(()),
            Err(_) => return Err(RejectionReason::MalformedRequest),
        };

        let from = BlockBound::from_json(filter.from_block.as_ref())
            .map_err(|_| RejectionReason::MalformedRequest)?;
        let to = BlockBound::from_json(filter.to_block.as_ref())
            .map_err(|_| RejectionReason::MalformedRequest)?;

        if let (Some(from), Some(to)) = (from.height(), to.height()) {
            let span = to.saturating_sub(from);
            if span > self.max_block_range {
                tracing::debug!(from, to, max = self.max_block_range, "Block range too wide");
                return Err(RejectionReason::BlockRangeTooWide);
            }
        }
        Ok(())
    }
}
