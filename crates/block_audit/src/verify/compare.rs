//! Continuity rules and field comparison between a saved block and its live copy.

use crate::chain::{is_zero_hash, BlockRecord};
use crate::verify::result::FieldDiff;
use serde_json::Value;
use std::borrow::Cow;
use tracing::error;

/// Compared fields, in reporting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareField {
    BlockNum,
    Timestamp,
    Producer,
    Previous,
    TransactionRoot,
    ActionRoot,
    ScheduleVersion,
}

impl CompareField {
    pub const ALL: [CompareField; 7] = [
        CompareField::BlockNum,
        CompareField::Timestamp,
        CompareField::Producer,
        CompareField::Previous,
        CompareField::TransactionRoot,
        CompareField::ActionRoot,
        CompareField::ScheduleVersion,
    ];

    /// Wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            CompareField::BlockNum => "block_num",
            CompareField::Timestamp => "timestamp",
            CompareField::Producer => "producer",
            CompareField::Previous => "previous",
            CompareField::TransactionRoot => "transaction_mroot",
            CompareField::ActionRoot => "action_mroot",
            CompareField::ScheduleVersion => "schedule_version",
        }
    }

    /// Borrowed where the record already holds JSON.
    fn value_of(self, block: &BlockRecord) -> Cow<'_, Value> {
        match self {
            CompareField::BlockNum => Cow::Owned(Value::from(block.number)),
            CompareField::Timestamp => Cow::Borrowed(&block.timestamp),
            CompareField::Producer => Cow::Borrowed(&block.producer),
            CompareField::Previous => Cow::Owned(Value::from(block.previous.as_str())),
            CompareField::TransactionRoot => Cow::Borrowed(&block.transaction_root),
            CompareField::ActionRoot => Cow::Borrowed(&block.action_root),
            CompareField::ScheduleVersion => Cow::Borrowed(&block.schedule_version),
        }
    }

    fn matches(self, local: &BlockRecord, live: &BlockRecord) -> bool {
        match self {
            CompareField::BlockNum => local.number == live.number,
            CompareField::Previous => local.previous == live.previous,
            _ => self.value_of(local) == self.value_of(live),
        }
    }
}

/// Continuity of `blocks[index]` against whatever precedes it in the file.
/// The first entry is continuous only if it is the genesis block with a zero predecessor.
pub fn local_continuity(blocks: &[BlockRecord], index: usize) -> bool {
    let Some(current) = blocks.get(index) else {
        return false;
    };
    if index == 0 {
        if !current.is_genesis() {
            error!(block = current.number, "first block in batch is not block 1");
            return false;
        }
        let ok = is_zero_hash(&current.previous);
        if !ok {
            error!(previous = %current.previous, "genesis block previous is not the zero hash");
        }
        return ok;
    }
    let prior = &blocks[index - 1];
    if prior.number.checked_add(1) != Some(current.number) {
        error!(
            block = current.number,
            prior = prior.number,
            "local block numbers are not consecutive"
        );
        return false;
    }
    if current.previous != prior.id {
        error!(
            block = current.number,
            previous = %current.previous,
            prior = prior.number,
            prior_id = %prior.id,
            "local previous does not match prior block id"
        );
        return false;
    }
    true
}

/// On-chain continuity of `live` given its fetched predecessor. Without a
/// predecessor only the genesis block can be continuous.
pub fn chain_continuity(live: &BlockRecord, predecessor: Option<&BlockRecord>) -> bool {
    let Some(prior) = predecessor else {
        return live.is_genesis() && is_zero_hash(&live.previous);
    };
    let number_ok = prior.number.checked_add(1) == Some(live.number);
    let hash_ok = live.previous == prior.id;
    if !number_ok {
        error!(
            block = live.number,
            prior = prior.number,
            "chain block numbers are not consecutive"
        );
    }
    if !hash_ok {
        error!(
            block = live.number,
            previous = %live.previous,
            prior_id = %prior.id,
            "chain previous does not match prior block id"
        );
    }
    number_ok && hash_ok
}

/// Every field whose local and live values differ, in [`CompareField::ALL`] order.
pub fn compare_fields(local: &BlockRecord, live: &BlockRecord) -> Vec<FieldDiff> {
    let diffs: Vec<FieldDiff> = CompareField::ALL
        .iter()
        .filter(|field| !field.matches(local, live))
        .map(|&field| FieldDiff {
            field: field.as_str().to_string(),
            local: field.value_of(local).into_owned(),
            chain: field.value_of(live).into_owned(),
        })
        .collect();
    for d in &diffs {
        error!(
            block = local.number,
            field = %d.field,
            local = %d.local,
            chain = %d.chain,
            "field mismatch"
        );
    }
    diffs
}

pub fn verification_message(data_match: bool, hash_match: bool, fields: &[String]) -> String {
    match (data_match, hash_match) {
        (true, true) => "verified".to_string(),
        (false, false) => format!("data and hash mismatch, fields: {}", fields.join(", ")),
        (false, true) => format!("data mismatch, fields: {}", fields.join(", ")),
        (true, false) => "hash mismatch".to_string(),
    }
}
