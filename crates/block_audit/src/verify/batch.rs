//! Saved batch parsing. Accepts `[block, ...]`, `{"blocks": [...]}` or a single block.

use crate::chain::BlockRecord;
use crate::verify::VerifyError;
use serde_json::Value;

pub fn parse_batch(content: &str) -> Result<Vec<BlockRecord>, VerifyError> {
    let root: Value = serde_json::from_str(content)
        .map_err(|e| VerifyError::InvalidBatchFormat(format!("not JSON: {}", e)))?;
    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut obj) if obj.contains_key("blocks") => match obj.remove("blocks") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(VerifyError::InvalidBatchFormat(
                    "\"blocks\" is not an array".to_string(),
                ))
            }
        },
        Value::Object(obj) if obj.contains_key("block_num") || obj.contains_key("number") => {
            vec![Value::Object(obj)]
        }
        _ => {
            return Err(VerifyError::InvalidBatchFormat(
                "expected an array of blocks, an object with \"blocks\", or a single block"
                    .to_string(),
            ))
        }
    };
    if items.is_empty() {
        return Err(VerifyError::EmptyBatch);
    }
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            BlockRecord::from_value(v)
                .map_err(|e| VerifyError::InvalidBatchFormat(format!("block at index {}: {}", i, e)))
        })
        .collect()
}
