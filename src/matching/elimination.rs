// src/matching/elimination.rs
use crate::models::record::{Record, RecordId};

/// Pick which record of a confirmed duplicate pair to retire.
///
/// An identifiable poster's record is kept over an anonymous one. When both
/// or neither are anonymous the second record, as encountered, is retired.
pub fn choose_record_to_retire<'a>(first: &'a Record, second: &'a Record) -> &'a RecordId {
    match (first.is_anonymous(), second.is_anonymous()) {
        (true, false) => &first.id,
        _ => &second.id,
    }
}
