//! Ledger RPC access and block record decoding.

mod client;
mod record;

pub use client::{validate_endpoint, BlockSource, ClientConfig, ClientError, RemoteLedgerClient};
pub use record::{is_zero_hash, BlockRecord, BlockSelector, RecordError, HASH_HEX_LEN};
