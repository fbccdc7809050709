//! Decoding of JSON-RPC calls and batches.

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;
use thiserror::Error;

/// A single decoded JSON-RPC call.
///
/// `params` is left undecoded; use [`Call::param`] to pull out a positional argument.
#[derive(Debug, Deserialize)]
pub struct Call {
    pub method: String,
    #[serde(default)]
    pub params: Option<Box<RawValue>>,
    #[serde(default)]
    pub id: Value,
}

impl Call {
    /// Positional parameter at `index`, or `None` when absent.
    ///
    /// Fails when `params` is present but not a JSON array.
    pub fn param(&self, index: usize) -> Result<Option<&RawValue>, serde_json::Error> {
        let Some(raw) = &self.params else {
            return Ok(None);
        };
        let list: Vec<&RawValue> = serde_json::from_str(raw.get())?;
        Ok(list.get(index).copied())
    }
}

/// Errors produced while decoding a request body.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON-RPC payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty batch")]
    EmptyBatch,
}

/// One element of a request body.
#[derive(Debug)]
pub enum Entry {
    Call(Call),
    /// Valid JSON that is not a call; `id` is whatever could be read from it.
    Malformed { id: Value },
}

/// Just the `id` of an element that failed to decode as a call.
#[derive(Deserialize)]
struct IdOnly {
    #[serde(default)]
    id: Value,
}

impl Entry {
    fn decode(raw: &RawValue) -> Self {
        match serde_json::from_str::<Call>(raw.get()) {
            Ok(call) => Self::Call(call),
            Err(_) => Self::Malformed {
                id: serde_json::from_str::<IdOnly>(raw.get())
                    .map(|only| only.id)
                    .unwrap_or_default(),
            },
        }
    }

    pub fn id(&self) -> &Value {
        match self {
            Self::Call(call) => &call.id,
            Self::Malformed { id } => id,
        }
    }

    pub fn call(&self) -> Option<&Call> {
        match self {
            Self::Call(call) => Some(call),
            Self::Malformed { .. } => None,
        }
    }
}

/// A request body: one entry or an ordered batch of entries.
#[derive(Debug)]
pub enum RequestPayload {
    Single(Entry),
    Batch(Vec<Entry>),
}

impl RequestPayload {
    /// Decode a request body.
    ///
    /// Fails only when the body is not JSON or is an empty batch. Elements
    /// that are JSON but not calls become [`Entry::Malformed`] so their ids
    /// survive into the response.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let is_batch = body
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'[');

        if is_batch {
            let items: Vec<Box<RawValue>> = serde_json::from_slice(body)?;
            if items.is_empty() {
                return Err(ParseError::EmptyBatch);
            }
            Ok(Self::Batch(items.iter().map(|raw| Entry::decode(raw)).collect()))
        } else {
            let raw: Box<RawValue> = serde_json::from_slice(body)?;
            Ok(Self::Single(Entry::decode(&raw)))
        }
    }

    /// All entries in request order.
    pub fn entries(&self) -> &[Entry] {
        match self {
            Self::Single(entry) => std::slice::from_ref(entry),
            Self::Batch(entries) => entries,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }
}
