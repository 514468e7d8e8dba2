//! RESP shapes shared by the stream commands.

use crate::resp::RespValue;
use crate::stream::StreamEntry;

/// `[id, [field1, value1, field2, value2, ...]]`
pub fn encode_entry(entry: &StreamEntry) -> RespValue {
    let mut fields = Vec::with_capacity(entry.fields.len() * 2);
    for (name, value) in &entry.fields {
        fields.push(RespValue::BulkString(name.clone()));
        fields.push(RespValue::BulkString(value.clone()));
    }

    RespValue::Array(vec![
        RespValue::BulkString(entry.id.to_string()),
        RespValue::Array(fields),
    ])
}

/// `[key, [entry, entry, ...]]`, one element of an XREAD reply.
pub fn encode_key_entries(key: &str, entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(vec![
        RespValue::BulkString(key.to_string()),
        RespValue::Array(entries.iter().map(encode_entry).collect()),
    ])
}
