//! Reflog entries and their on-disk encoding.
//!
//! A tag file is a sequence of records, each `cbor([timestamp, reason])`
//! followed by the raw 32-byte target id. The id always sits at the end of
//! the record, so the current target is the last 32 bytes of the file.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use lineage_codec::{decode_value, encode_value, Canonical, CodecError, CodecResult, Value};
use lineage_types::NodeId;

/// One update of a tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReflogEntry {
    /// The node the tag pointed to after this update.
    pub node_id: NodeId,
    /// Local wall-clock time of the update, with microsecond precision.
    pub timestamp: NaiveDateTime,
    /// Free-form reason given by the caller.
    pub reason: Option<String>,
}

impl ReflogEntry {
    /// An entry stamped with the current local time.
    pub fn now(node_id: NodeId, reason: Option<&str>) -> Self {
        Self {
            node_id,
            timestamp: truncate_to_micros(Local::now().naive_local()),
            reason: reason.map(str::to_string),
        }
    }

    /// Encode as one tag-file record.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let header = Value::Array(vec![
            timestamp_to_value(&self.timestamp),
            self.reason.to_value(),
        ]);
        let mut out = encode_value(&header)?;
        out.extend_from_slice(self.node_id.as_bytes());
        Ok(out)
    }

    /// Decode one record from the front of `input`, advancing past it.
    pub fn decode(input: &mut &[u8]) -> CodecResult<Self> {
        let (timestamp, reason) = <(Value, Option<String>)>::from_value(decode_value(input)?)?;
        let timestamp = timestamp_from_value(timestamp)?;
        if input.len() < NodeId::LENGTH {
            return Err(CodecError::Invalid {
                what: "reflog record",
                reason: format!("truncated node id ({} bytes left)", input.len()),
            });
        }
        let (raw, rest) = input.split_at(NodeId::LENGTH);
        let node_id = NodeId::from_slice(raw)?;
        *input = rest;
        Ok(Self {
            node_id,
            timestamp,
            reason,
        })
    }
}

fn truncate_to_micros(t: NaiveDateTime) -> NaiveDateTime {
    let nanos = t.nanosecond() / 1_000 * 1_000;
    t.with_nanosecond(nanos).unwrap_or(t)
}

/// `[year, month, day, hour, minute, second, microsecond]`
fn timestamp_to_value(t: &NaiveDateTime) -> Value {
    vec![
        i64::from(t.year()),
        i64::from(t.month()),
        i64::from(t.day()),
        i64::from(t.hour()),
        i64::from(t.minute()),
        i64::from(t.second()),
        i64::from(t.nanosecond() / 1_000),
    ]
    .to_value()
}

fn timestamp_from_value(value: Value) -> CodecResult<NaiveDateTime> {
    let parts = Vec::<u32>::from_value(value)?;
    let &[year, month, day, hour, minute, second, micro] = parts.as_slice() else {
        return Err(CodecError::WrongArity {
            expected: 7,
            found: parts.len(),
        });
    };
    let invalid = || CodecError::Invalid {
        what: "timestamp",
        reason: format!("{parts:?} is not a valid date and time"),
    };
    let year = i32::try_from(year).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_micro_opt(hour, minute, second, micro))
        .ok_or_else(invalid)
}
