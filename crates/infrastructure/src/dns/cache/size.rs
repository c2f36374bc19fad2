//! Heap-usage estimation for cached responses.
//!
//! The counter feeds a gauge, not the eviction policy, so the goal is
//! tracking within a few percent rather than byte-exact accounting.
//! Every figure here mirrors what the message actually allocates:
//! struct sizes via `size_of`, plus the variable-length name and
//! rdata strings that `size_of` cannot see.

use std::mem;

use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{RData, Record};

/// Fixed overhead charged per resource record: the record struct's
/// header bookkeeping plus the boxed-rdata indirection.
const RECORD_OVERHEAD: usize = 24;

/// Hash-bucket cost of one map slot: stored key pointer + entry
/// pointer (8) + bucket metadata (16).
fn map_overhead(key_len: usize) -> usize {
    key_len + 8 + 16
}

/// Total accounted size of one cache entry.
pub fn entry_size(key_len: usize, entry_struct_size: usize, response: &Message) -> usize {
    key_len + entry_struct_size + map_overhead(key_len) + message_size(response)
}

/// Estimated memory footprint of a decoded DNS message.
pub fn message_size(message: &Message) -> usize {
    let mut size = mem::size_of::<Message>();

    for query in message.queries() {
        size += mem::size_of::<Query>() + query.name().len();
    }

    for record in message
        .answers()
        .iter()
        .chain(message.name_servers())
        .chain(message.additionals())
    {
        size += record_size(record);
    }

    size
}

/// Per-record estimate: fixed overhead, owner name, then the
/// variant-specific payload.
fn record_size(record: &Record) -> usize {
    let mut size = RECORD_OVERHEAD + record.name().len();

    size += match record.data() {
        Some(RData::A(_)) => 4,
        Some(RData::AAAA(_)) => 16,
        Some(RData::CNAME(name)) => name.len(),
        Some(RData::NS(name)) => name.len(),
        Some(RData::PTR(name)) => name.len(),
        Some(RData::MX(mx)) => 2 + mx.exchange().len(),
        Some(RData::SOA(soa)) => 20 + soa.mname().len() + soa.rname().len(),
        Some(RData::SRV(srv)) => 6 + srv.target().len(),
        Some(RData::TXT(txt)) => txt.txt_data().iter().map(|part| part.len()).sum(),
        Some(other) => other.to_string().len(),
        None => 0,
    };

    size
}
