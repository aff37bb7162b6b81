//! Block records as returned by the ledger RPC.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Length of a block hash in hex characters.
pub const HASH_HEX_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("decode block: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid block_num: {0}")]
    InvalidNumber(String),
    #[error("block has neither block_num nor number")]
    MissingNumber,
}

/// Selector accepted by the `block_num_or_id` request field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockSelector {
    Number(u64),
    Id(String),
}

impl BlockSelector {
    pub fn to_json(&self) -> Value {
        match self {
            BlockSelector::Number(n) => Value::from(*n),
            BlockSelector::Id(id) => Value::from(id.as_str()),
        }
    }
}

impl fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSelector::Number(n) => write!(f, "#{}", n),
            BlockSelector::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<u64> for BlockSelector {
    fn from(n: u64) -> Self {
        BlockSelector::Number(n)
    }
}

/// Some nodes serialize `block_num` as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Int(u64),
    Text(String),
}

impl WireNumber {
    fn into_u64(self) -> Result<u64, RecordError> {
        match self {
            WireNumber::Int(n) => Ok(n),
            WireNumber::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| RecordError::InvalidNumber(s)),
        }
    }
}

/// `block_num` wins when a node sends both keys.
#[derive(Deserialize)]
struct WireBlock {
    #[serde(default)]
    block_num: Option<WireNumber>,
    #[serde(default)]
    number: Option<WireNumber>,
    id: String,
    previous: String,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    producer: Value,
    #[serde(default)]
    transaction_mroot: Value,
    #[serde(default)]
    action_mroot: Value,
    #[serde(default)]
    schedule_version: Value,
}

/// One block. Comparison fields are kept as raw JSON values so equality is exact
/// to what the node reported; `raw` is the full object for persistence.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockRecord {
    pub number: u64,
    pub id: String,
    pub previous: String,
    pub timestamp: Value,
    pub producer: Value,
    pub transaction_root: Value,
    pub action_root: Value,
    pub schedule_version: Value,
    pub raw: Value,
}

impl BlockRecord {
    /// Decode from a JSON object. Requires `block_num` (or `number`), `id` and `previous`.
    pub fn from_value(raw: Value) -> Result<Self, RecordError> {
        let wire = WireBlock::deserialize(&raw)?;
        let number = wire
            .block_num
            .or(wire.number)
            .ok_or(RecordError::MissingNumber)?
            .into_u64()?;
        Ok(Self {
            number,
            id: wire.id,
            previous: wire.previous,
            timestamp: wire.timestamp,
            producer: wire.producer,
            transaction_root: wire.transaction_mroot,
            action_root: wire.action_mroot,
            schedule_version: wire.schedule_version,
            raw,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self, RecordError> {
        Self::from_value(serde_json::from_str(s)?)
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 1
    }
}

/// True for the reserved predecessor hash of the genesis block.
pub fn is_zero_hash(hash: &str) -> bool {
    hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| b == b'0')
}
