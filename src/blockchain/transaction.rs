//! Decoding of raw signed transactions submitted through `eth_sendRawTransaction`.
//!
//! Only the fee field is read; signatures are not recovered.

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::hex;

use crate::blockchain::types::{ChainError, ChainResult};

/// Fee cap per gas, in wei, of a raw EIP-2718 transaction.
///
/// This is `gasPrice` for legacy and EIP-2930 transactions and `maxFeePerGas`
/// for every dynamic-fee type.
pub fn fee_cap_per_gas(raw: &str) -> ChainResult<u128> {
    let bytes = hex::decode(raw).map_err(|e| ChainError::InvalidHex(e.to_string()))?;

    let mut buf = bytes.as_slice();
    let envelope = TxEnvelope::decode_2718(&mut buf)
        .map_err(|e| ChainError::InvalidTransaction(e.to_string()))?;
    if !buf.is_empty() {
        return Err(ChainError::InvalidTransaction(format!(
            "{} trailing bytes after envelope",
            buf.len()
        )));
    }

    Ok(envelope.max_fee_per_gas())
}
