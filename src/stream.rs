//! Stream values: entry identifiers, entries, and the append-only log itself.
//!
//! Entry IDs are `(ms, seq)` pairs rendered as `"{ms}-{seq}"` on the wire.
//! Within one stream IDs are strictly increasing; `0-0` is never a valid
//! entry ID.

use std::fmt;

use thiserror::Error;

/// Errors surfaced by stream ID validation. The display strings are the exact
/// texts clients see behind an `ERR ` prefix.
#[derive(Error, Debug, PartialEq)]
pub enum StreamIdError {
    #[error("The ID specified in XADD must be greater than 0-0")]
    MustBeGreaterThanZero,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    SmallerThanTop,
    #[error("The ID specified in XADD already exists in the target stream")]
    AlreadyExists,
    #[error("Invalid stream ID specified as stream command argument")]
    Invalid,
}

/// A stream entry identifier: millisecond timestamp plus a per-millisecond
/// sequence number. Ordering is lexicographic over `(ms, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Parses a fully explicit `"ms-seq"` ID.
    pub fn parse(input: &str) -> Result<Self, StreamIdError> {
        let (ms_part, seq_part) = input.split_once('-').ok_or(StreamIdError::Invalid)?;

        let ms = ms_part.parse::<u64>().map_err(|_| StreamIdError::Invalid)?;
        let seq = seq_part.parse::<u64>().map_err(|_| StreamIdError::Invalid)?;

        Ok(Self { ms, seq })
    }

    /// Parses a range bound for XRANGE: `-` and `+` are the minimum and maximum,
    /// and a bare `ms` fills in seq 0 at the start of a range or the maximum seq
    /// at the end.
    pub fn parse_range_bound(input: &str, is_end: bool) -> Result<Self, StreamIdError> {
        match input {
            "-" => Ok(Self::ZERO),
            "+" => Ok(Self::MAX),
            _ if input.contains('-') => Self::parse(input),
            _ => {
                let ms = input.parse::<u64>().map_err(|_| StreamIdError::Invalid)?;
                let seq = if is_end { u64::MAX } else { 0 };
                Ok(Self { ms, seq })
            }
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// The ID argument of XADD before the stream assigns a concrete ID.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestedId {
    /// `*`: both parts chosen by the server from the current clock.
    Auto,
    /// `ms-*`: explicit milliseconds, sequence chosen by the server.
    AutoSeq(u64),
    /// `ms-seq`: fully explicit.
    Explicit(StreamId),
}

impl RequestedId {
    pub fn parse(input: &str) -> Result<Self, StreamIdError> {
        if input == "*" {
            return Ok(RequestedId::Auto);
        }

        if let Some(ms_part) = input.strip_suffix("-*") {
            let ms = ms_part.parse::<u64>().map_err(|_| StreamIdError::Invalid)?;
            return Ok(RequestedId::AutoSeq(ms));
        }

        StreamId::parse(input).map(RequestedId::Explicit)
    }
}

/// One entry: an ID plus its field/value pairs in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(String, String)>,
}

/// An append-only log of entries with strictly increasing IDs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stream {
    pub entries: Vec<StreamEntry>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// ID of the newest entry, or `0-0` for an empty stream. This is also the
    /// resolution of the `$` placeholder in blocking reads.
    pub fn last_id(&self) -> StreamId {
        self.entries.last().map(|e| e.id).unwrap_or(StreamId::ZERO)
    }

    /// Resolves a requested ID against the current tail and validates the
    /// strict-monotonicity rules. Does not append.
    pub fn resolve_id(&self, requested: RequestedId, now_ms: u64) -> Result<StreamId, StreamIdError> {
        let candidate = match requested {
            RequestedId::Auto => {
                let tail = self.last_id();
                if tail.ms >= now_ms {
                    // Clock is at or behind the tail; stay monotonic by
                    // extending the tail's millisecond.
                    StreamId::new(tail.ms, tail.seq + 1)
                } else {
                    StreamId::new(now_ms, 0)
                }
            }
            RequestedId::AutoSeq(ms) => StreamId::new(ms, self.next_seq_for(ms)),
            RequestedId::Explicit(id) => id,
        };

        if candidate == StreamId::ZERO {
            return Err(StreamIdError::MustBeGreaterThanZero);
        }

        if candidate <= self.last_id() && !self.entries.is_empty() {
            return Err(StreamIdError::SmallerThanTop);
        }

        if self.entries.iter().any(|e| e.id == candidate) {
            return Err(StreamIdError::AlreadyExists);
        }

        Ok(candidate)
    }

    /// Next sequence number for an explicit millisecond part: one past the
    /// largest existing seq for that millisecond, or the floor for a fresh one
    /// (1 when ms is 0, since 0-0 is forbidden).
    fn next_seq_for(&self, ms: u64) -> u64 {
        let max_seq = self
            .entries
            .iter()
            .filter(|e| e.id.ms == ms)
            .map(|e| e.id.seq)
            .max();

        match max_seq {
            Some(seq) => seq + 1,
            None if ms == 0 => 1,
            None => 0,
        }
    }

    /// Entries with `start <= id <= end` (both bounds inclusive, XRANGE).
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<&StreamEntry> {
        self.entries
            .iter()
            .filter(|e| start <= e.id && e.id <= end)
            .collect()
    }

    /// Entries strictly newer than `after` (XREAD).
    pub fn entries_after(&self, after: StreamId) -> Vec<StreamEntry> {
        self.entries
            .iter()
            .filter(|e| e.id > after)
            .cloned()
            .collect()
    }
}
