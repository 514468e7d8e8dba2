//! RESP (Redis Serialization Protocol) framing.
//!
//! The codec is stateless: [`RespValue::decode`] consumes exactly one complete
//! frame from the front of a [`BytesMut`] buffer, or leaves the buffer untouched
//! when more bytes are needed. Encoding is total and only allocates proportionally
//! to the size of the frame.

use bytes::BytesMut;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unknown RESP type byte '{0}'")]
    UnknownTypeByte(char),
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
    #[error("missing CRLF terminator")]
    MissingTerminator,
}

/// One RESP frame. Bulk strings and arrays have dedicated null forms because
/// `$-1\r\n` and `*-1\r\n` are distinct on the wire from empty values.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
    NullArray,
}

/// Result of attempting to take a frame from a buffer: either a parsed value and
/// the number of bytes it occupied, or a signal that the buffer ends mid-frame.
enum Parsed {
    Complete(RespValue, usize),
    Incomplete,
}

impl RespValue {
    /// Serializes the frame into its wire representation.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(s) => format!("-{}\r\n", s),
            RespValue::Integer(n) => format!(":{}\r\n", n),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(items) => {
                let mut out = format!("*{}\r\n", items.len());
                for item in items {
                    out.push_str(&item.encode());
                }
                out
            }
            RespValue::NullArray => "*-1\r\n".to_string(),
        }
    }

    /// Byte length of the wire representation. Replication offsets advance by
    /// the canonical encoded size of every propagated frame.
    pub fn encoded_len(&self) -> u64 {
        self.encode().len() as u64
    }

    /// Removes and returns the first complete frame in `buf`.
    ///
    /// Returns `Ok(None)` when the buffer holds only a prefix of a frame; the
    /// caller should read more bytes and retry. Malformed input is a
    /// [`RespError`] and the connection should be closed.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match parse_at(buf, 0)? {
            Parsed::Complete(value, consumed) => {
                let _ = buf.split_to(consumed);
                Ok(Some(value))
            }
            Parsed::Incomplete => Ok(None),
        }
    }

    /// Convenience constructor for a command frame: an array of bulk strings.
    pub fn command<I, S>(parts: I) -> RespValue
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|p| RespValue::BulkString(p.into()))
                .collect(),
        )
    }

    /// Interprets the frame as a command: a non-empty array of bulk strings.
    /// Returns the uppercased name and the remaining arguments.
    pub fn as_command(&self) -> Option<(String, Vec<String>)> {
        let RespValue::Array(items) = self else {
            return None;
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let RespValue::BulkString(s) = item else {
                return None;
            };
            parts.push(s.clone());
        }

        let name = parts.first()?.to_uppercase();
        Some((name, parts[1..].to_vec()))
    }
}

/// Parses one frame starting at `pos`, returning the value and the cursor just
/// past it. Purely additive: never reads beyond what the buffer holds.
fn parse_at(buf: &[u8], pos: usize) -> Result<Parsed, RespError> {
    let Some(&type_byte) = buf.get(pos) else {
        return Ok(Parsed::Incomplete);
    };

    match type_byte {
        b'+' => parse_line(buf, pos + 1, |line| Ok(RespValue::SimpleString(line.to_string()))),
        b'-' => parse_line(buf, pos + 1, |line| Ok(RespValue::Error(line.to_string()))),
        b':' => parse_line(buf, pos + 1, |line| {
            line.parse::<i64>()
                .map(RespValue::Integer)
                .map_err(|_| RespError::FailedToParseInteger)
        }),
        b'$' => parse_bulk_string(buf, pos),
        b'*' => parse_array(buf, pos),
        other => Err(RespError::UnknownTypeByte(other as char)),
    }
}

/// Reads a CRLF-terminated line beginning at `pos` and maps it through `build`.
fn parse_line(
    buf: &[u8],
    pos: usize,
    build: impl FnOnce(&str) -> Result<RespValue, RespError>,
) -> Result<Parsed, RespError> {
    let Some((line, end)) = take_line(buf, pos)? else {
        return Ok(Parsed::Incomplete);
    };

    Ok(Parsed::Complete(build(line)?, end))
}

fn parse_bulk_string(buf: &[u8], pos: usize) -> Result<Parsed, RespError> {
    let Some((header, body_start)) = take_line(buf, pos + 1)? else {
        return Ok(Parsed::Incomplete);
    };

    let declared = header
        .parse::<i64>()
        .map_err(|_| RespError::InvalidBulkString)?;

    if declared == -1 {
        return Ok(Parsed::Complete(RespValue::NullBulkString, body_start));
    }

    let length = usize::try_from(declared).map_err(|_| RespError::InvalidBulkString)?;
    let body_end = body_start + length;

    if buf.len() < body_end + 2 {
        return Ok(Parsed::Incomplete);
    }

    if &buf[body_end..body_end + 2] != b"\r\n" {
        return Err(RespError::MissingTerminator);
    }

    let content = str::from_utf8(&buf[body_start..body_end]).map_err(|_| RespError::InvalidUtf8)?;

    Ok(Parsed::Complete(
        RespValue::BulkString(content.to_string()),
        body_end + 2,
    ))
}

fn parse_array(buf: &[u8], pos: usize) -> Result<Parsed, RespError> {
    let Some((header, mut cursor)) = take_line(buf, pos + 1)? else {
        return Ok(Parsed::Incomplete);
    };

    let declared = header.parse::<i64>().map_err(|_| RespError::InvalidArray)?;

    if declared == -1 {
        return Ok(Parsed::Complete(RespValue::NullArray, cursor));
    }

    let count = usize::try_from(declared).map_err(|_| RespError::InvalidArray)?;
    let mut items = Vec::with_capacity(count);

    for _ in 0..count {
        match parse_at(buf, cursor)? {
            Parsed::Complete(item, next) => {
                items.push(item);
                cursor = next;
            }
            Parsed::Incomplete => return Ok(Parsed::Incomplete),
        }
    }

    Ok(Parsed::Complete(RespValue::Array(items), cursor))
}

/// Locates the next CRLF at or after `pos` and returns the line before it plus
/// the index just past the terminator. `None` while the terminator has not
/// arrived yet.
fn take_line(buf: &[u8], pos: usize) -> Result<Option<(&str, usize)>, RespError> {
    let Some(rel) = buf[pos.min(buf.len())..]
        .windows(2)
        .position(|window| window == b"\r\n")
    else {
        return Ok(None);
    };

    let end = pos + rel;
    let line = str::from_utf8(&buf[pos..end]).map_err(|_| RespError::InvalidUtf8)?;

    Ok(Some((line, end + 2)))
}

/// Removes a bulk-string-framed RDB payload (`$<len>\r\n<bytes>`, no trailing
/// CRLF) from the front of `buf`. This is the one place the protocol deviates
/// from bulk-string framing: the snapshot a primary sends after `FULLRESYNC`
/// omits the terminator.
pub fn decode_rdb_payload(buf: &mut BytesMut) -> Result<Option<Vec<u8>>, RespError> {
    match buf.first() {
        None => return Ok(None),
        Some(&b'$') => {}
        Some(&other) => return Err(RespError::UnknownTypeByte(other as char)),
    }

    let Some((header, body_start)) = take_line(buf, 1)? else {
        return Ok(None);
    };

    let length = header
        .parse::<usize>()
        .map_err(|_| RespError::InvalidBulkString)?;

    if buf.len() < body_start + length {
        return Ok(None);
    }

    let _ = buf.split_to(body_start);
    let payload = buf.split_to(length);

    Ok(Some(payload.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let test_cases = vec![
            (RespValue::SimpleString("OK".to_string()), "+OK\r\n"),
            (RespValue::Error("ERR syntax error".to_string()), "-ERR syntax error\r\n"),
            (RespValue::Integer(42), ":42\r\n"),
            (RespValue::Integer(-3), ":-3\r\n"),
            (RespValue::BulkString("hello".to_string()), "$5\r\nhello\r\n"),
            (RespValue::BulkString(String::new()), "$0\r\n\r\n"),
            (RespValue::NullBulkString, "$-1\r\n"),
            (RespValue::NullArray, "*-1\r\n"),
            (
                RespValue::Array(vec![
                    RespValue::BulkString("GET".to_string()),
                    RespValue::BulkString("foo".to_string()),
                ]),
                "*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n",
            ),
            (RespValue::Array(vec![]), "*0\r\n"),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.encode(), expected, "encoding {:?}", value);
        }
    }

    #[test]
    fn test_decode_round_trip() {
        let test_cases = vec![
            RespValue::SimpleString("PONG".to_string()),
            RespValue::Error("ERR unknown command 'FOO'".to_string()),
            RespValue::Integer(0),
            RespValue::Integer(i64::MIN),
            RespValue::BulkString("plain".to_string()),
            RespValue::NullBulkString,
            RespValue::NullArray,
            RespValue::Array(vec![
                RespValue::Array(vec![RespValue::Integer(1), RespValue::NullBulkString]),
                RespValue::SimpleString("nested".to_string()),
            ]),
        ];

        for value in test_cases {
            let mut buf = BytesMut::from(value.encode().as_bytes());
            let decoded = RespValue::decode(&mut buf).unwrap();
            assert_eq!(decoded, Some(value));
            assert!(buf.is_empty(), "decode should consume the whole frame");
        }
    }

    #[test]
    fn test_decode_incomplete_frames() {
        let test_cases: Vec<&[u8]> = vec![
            b"",
            b"*2\r\n$3\r\nGET\r\n",
            b"$5\r\nhel",
            b"$5\r\nhello",
            b"+PON",
            b"*1\r\n",
        ];

        for input in test_cases {
            let mut buf = BytesMut::from(input);
            let before = buf.len();
            assert_eq!(RespValue::decode(&mut buf), Ok(None), "input {:?}", input);
            assert_eq!(buf.len(), before, "incomplete decode must not consume");
        }
    }

    #[test]
    fn test_decode_pipelined_frames() {
        let mut buf = BytesMut::from(&b"+OK\r\n:7\r\n$3\r\nfoo\r\n"[..]);

        assert_eq!(
            RespValue::decode(&mut buf).unwrap(),
            Some(RespValue::SimpleString("OK".to_string()))
        );
        assert_eq!(
            RespValue::decode(&mut buf).unwrap(),
            Some(RespValue::Integer(7))
        );
        assert_eq!(
            RespValue::decode(&mut buf).unwrap(),
            Some(RespValue::BulkString("foo".to_string()))
        );
        assert_eq!(RespValue::decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_errors() {
        let test_cases: Vec<(&[u8], RespError)> = vec![
            (b"?what\r\n", RespError::UnknownTypeByte('?')),
            (b":abc\r\n", RespError::FailedToParseInteger),
            (b"$x\r\nhi\r\n", RespError::InvalidBulkString),
            (b"$2\r\nhiXX", RespError::MissingTerminator),
            (b"*x\r\n", RespError::InvalidArray),
        ];

        for (input, expected) in test_cases {
            let mut buf = BytesMut::from(input);
            assert_eq!(
                RespValue::decode(&mut buf),
                Err(expected),
                "input {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_as_command() {
        let frame = RespValue::command(["set", "foo", "bar"]);
        assert_eq!(
            frame.as_command(),
            Some(("SET".to_string(), vec!["foo".to_string(), "bar".to_string()]))
        );

        assert_eq!(RespValue::Array(vec![]).as_command(), None);
        assert_eq!(RespValue::SimpleString("PING".to_string()).as_command(), None);
        assert_eq!(
            RespValue::Array(vec![RespValue::Integer(1)]).as_command(),
            None
        );
    }

    #[test]
    fn test_decode_rdb_payload() {
        let mut buf = BytesMut::from(&b"$5\r\nREDIS+OK\r\n"[..]);

        let payload = decode_rdb_payload(&mut buf).unwrap();
        assert_eq!(payload, Some(b"REDIS".to_vec()));
        // The next frame on the wire is untouched by the payload read.
        assert_eq!(
            RespValue::decode(&mut buf).unwrap(),
            Some(RespValue::SimpleString("OK".to_string()))
        );

        let mut partial = BytesMut::from(&b"$10\r\nshort"[..]);
        assert_eq!(decode_rdb_payload(&mut partial).unwrap(), None);
    }
}
