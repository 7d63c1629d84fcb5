//! Turns the node's event JSON into [`Publication`]s.
//!
//! The node serialises 64-bit integers as decimal strings, so every numeric
//! field is accepted either as a JSON number or as a string.

use crate::error::{DecodeError, ResponseError};
use aptwatch_types::{
    tx_hash_from_sequence, ChainId, EmitterAddress, Publication, Sequence, ZERO_EMITTER_ADDRESS,
};
use chrono::DateTime;
use serde_json::Value;

/// Parses an event-list body into its records.
pub fn parse_events(body: &[u8]) -> Result<Vec<Value>, ResponseError> {
    match serde_json::from_slice(body)? {
        Value::Array(records) => Ok(records),
        _ => Err(ResponseError::NotAnArray),
    }
}

/// Parses a body that must be a JSON object, such as the health payload.
pub fn parse_object(body: &[u8]) -> Result<Value, ResponseError> {
    let value: Value = serde_json::from_slice(body)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(ResponseError::NotAnObject)
    }
}

pub fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Reads the envelope's `sequence_number`, if present and numeric.
pub fn envelope_sequence(record: &Value) -> Option<Sequence> {
    record.get("sequence_number").and_then(json_u64)
}

/// Decodes one event's `data` object.
///
/// `envelope_sequence` is the record's `sequence_number`; it only feeds the
/// derived transaction hash; the publication's own sequence is read from
/// `data.sequence`.
pub fn decode_event(
    emitter_chain: ChainId,
    envelope_sequence: Sequence,
    data: &Value,
) -> Result<Publication, DecodeError> {
    let sender = decode_hex(data, "sender")?;
    if sender.len() > ZERO_EMITTER_ADDRESS.len() {
        return Err(DecodeError::EmitterTooLong(sender.len()));
    }
    let mut emitter_address: EmitterAddress = ZERO_EMITTER_ADDRESS;
    emitter_address[..sender.len()].copy_from_slice(&sender);

    let payload = decode_hex(data, "payload")?;

    let ts = decode_u64(data, "ts")?;
    let timestamp = i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(DecodeError::InvalidTimestamp(ts))?;

    let nonce = u32::try_from(decode_u64(data, "nonce")?)
        .map_err(|_| DecodeError::OutOfRange("nonce"))?;
    let sequence = decode_u64(data, "sequence")?;
    let consistency_level = u8::try_from(decode_u64(data, "consistency_level")?)
        .map_err(|_| DecodeError::OutOfRange("consistency_level"))?;

    Ok(Publication {
        tx_hash: tx_hash_from_sequence(envelope_sequence),
        timestamp,
        nonce,
        sequence,
        emitter_chain,
        emitter_address,
        payload,
        consistency_level,
    })
}

fn decode_hex(data: &Value, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    let raw = data
        .get(field)
        .ok_or(DecodeError::MissingField(field))?
        .as_str()
        .ok_or(DecodeError::NotAString(field))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|source| DecodeError::InvalidHex { field, source })
}

fn decode_u64(data: &Value, field: &'static str) -> Result<u64, DecodeError> {
    let value = data.get(field).ok_or(DecodeError::MissingField(field))?;
    json_u64(value).ok_or(DecodeError::InvalidNumber(field))
}
