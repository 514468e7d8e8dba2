//! RDB snapshot parsing and cold-start loading.

use std::path::Path;

use jiff::Timestamp;
use thiserror::Error;
use tracing::{debug, warn};

use super::encoding::{Input, read_length, read_string};
use crate::store::{Store, Value};

const HEADER: &[u8; 9] = b"REDIS0011";

const OPCODE_AUX: u8 = 0xFA;
const OPCODE_RESIZEDB: u8 = 0xFB;
const OPCODE_EXPIRETIME_MS: u8 = 0xFC;
const OPCODE_EXPIRETIME: u8 = 0xFD;
const OPCODE_SELECTDB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;

const TYPE_STRING: u8 = 0x00;

#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("invalid RDB header")]
    BadHeader,
    #[error("unexpected end of RDB data")]
    UnexpectedEof,
    #[error("unsupported value type {0:#04x}")]
    UnsupportedValueType(u8),
    #[error("unsupported encoding byte {0:#04x}")]
    UnsupportedEncoding(u8),
    #[error("invalid length encoding")]
    InvalidLength,
    #[error("invalid UTF-8 in RDB string")]
    InvalidUtf8,
    #[error("invalid expiry timestamp")]
    InvalidExpiry,
    #[error("failed to read RDB file: {0}")]
    Io(String),
}

/// One key/value pair replayed from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RdbEntry {
    pub key: String,
    pub value: String,
    pub expires_at: Option<Timestamp>,
}

/// Parses a complete snapshot held in memory. Only string values are
/// supported; any other value type fails the load.
pub fn parse(bytes: &[u8]) -> Result<Vec<RdbEntry>, RdbError> {
    let mut input = Input::new(bytes);

    if input.take(HEADER.len()).map_err(|_| RdbError::BadHeader)? != HEADER {
        return Err(RdbError::BadHeader);
    }

    let mut entries = Vec::new();
    let mut pending_expiry: Option<Timestamp> = None;

    while !input.is_at_end() {
        let opcode = input.u8()?;

        match opcode {
            OPCODE_EOF => {
                // Trailing CRC64 checksum, present unless the writer truncated.
                if input.remaining() >= 8 {
                    let _ = input.take(8)?;
                }
                break;
            }
            OPCODE_AUX => {
                let name = read_string(&mut input)?;
                let value = read_string(&mut input)?;
                debug!(name = %name, value = %value, "rdb aux field");
            }
            OPCODE_SELECTDB => {
                let _db_number = read_length(&mut input)?;
            }
            OPCODE_RESIZEDB => {
                let _hash_table_size = read_length(&mut input)?;
                let _expiry_table_size = read_length(&mut input)?;
            }
            OPCODE_EXPIRETIME => {
                let raw: [u8; 4] = input.take(4)?.try_into().map_err(|_| RdbError::UnexpectedEof)?;
                let seconds = u32::from_le_bytes(raw);
                pending_expiry = Some(
                    Timestamp::from_second(seconds as i64).map_err(|_| RdbError::InvalidExpiry)?,
                );
            }
            OPCODE_EXPIRETIME_MS => {
                let raw: [u8; 8] = input.take(8)?.try_into().map_err(|_| RdbError::UnexpectedEof)?;
                let millis = u64::from_le_bytes(raw);
                pending_expiry = Some(
                    Timestamp::from_millisecond(millis as i64)
                        .map_err(|_| RdbError::InvalidExpiry)?,
                );
            }
            value_type => {
                if value_type != TYPE_STRING {
                    return Err(RdbError::UnsupportedValueType(value_type));
                }

                let key = read_string(&mut input)?;
                let value = read_string(&mut input)?;

                entries.push(RdbEntry {
                    key,
                    value,
                    expires_at: pending_expiry.take(),
                });
            }
        }
    }

    Ok(entries)
}

/// Loads the snapshot at `path` into the store. A missing file is an empty
/// database; entries whose expiry has already passed are skipped.
pub async fn load_rdb_file(path: &Path, store: &Store) -> Result<usize, RdbError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no snapshot file, starting empty");
            return Ok(0);
        }
        Err(error) => return Err(RdbError::Io(error.to_string())),
    };

    let entries = parse(&bytes)?;
    let mut loaded = 0;

    for entry in entries {
        if entry
            .expires_at
            .is_some_and(|deadline| Timestamp::now() > deadline)
        {
            warn!(key = %entry.key, "skipping expired snapshot entry");
            continue;
        }

        store
            .load(entry.key, Value::String(entry.value), entry.expires_at)
            .await;
        loaded += 1;
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::rdb::EMPTY_RDB;

    /// Minimal snapshot builder mirroring the writer side of the format.
    struct SnapshotBuilder {
        bytes: Vec<u8>,
    }

    impl SnapshotBuilder {
        fn new() -> Self {
            Self {
                bytes: HEADER.to_vec(),
            }
        }

        fn raw_string(mut self, value: &str) -> Self {
            self.bytes.push(value.len() as u8);
            self.bytes.extend_from_slice(value.as_bytes());
            self
        }

        fn string_kv(self, key: &str, value: &str) -> Self {
            let mut builder = self;
            builder.bytes.push(TYPE_STRING);
            builder.raw_string(key).raw_string(value)
        }

        fn expiry_ms(mut self, millis: u64) -> Self {
            self.bytes.push(OPCODE_EXPIRETIME_MS);
            self.bytes.extend_from_slice(&millis.to_le_bytes());
            self
        }

        fn expiry_seconds(mut self, seconds: u32) -> Self {
            self.bytes.push(OPCODE_EXPIRETIME);
            self.bytes.extend_from_slice(&seconds.to_le_bytes());
            self
        }

        fn metadata(mut self, name: &str, value: &str) -> Self {
            self.bytes.push(OPCODE_AUX);
            self.raw_string(name).raw_string(value)
        }

        fn select_db(mut self, db: u8) -> Self {
            self.bytes.extend_from_slice(&[OPCODE_SELECTDB, db]);
            self
        }

        fn resize_db(mut self, main: u8, expires: u8) -> Self {
            self.bytes.extend_from_slice(&[OPCODE_RESIZEDB, main, expires]);
            self
        }

        fn finish(mut self) -> Vec<u8> {
            self.bytes.push(OPCODE_EOF);
            self.bytes.extend_from_slice(&[0u8; 8]);
            self.bytes
        }
    }

    #[test]
    fn test_parse_empty_snapshot() {
        assert_eq!(parse(&EMPTY_RDB).unwrap(), vec![]);
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        assert_eq!(parse(b"REDIS0009"), Err(RdbError::BadHeader));
        assert_eq!(parse(b"RED"), Err(RdbError::BadHeader));
    }

    #[test]
    fn test_parse_string_entries() {
        let bytes = SnapshotBuilder::new()
            .metadata("redis-ver", "7.2.0")
            .select_db(0)
            .resize_db(2, 1)
            .string_kv("foo", "bar")
            .expiry_ms(33_057_392_000_000)
            .string_kv("later", "v")
            .finish();

        let entries = parse(&bytes).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].key, "foo");
        assert_eq!(entries[0].value, "bar");
        assert_eq!(entries[0].expires_at, None);

        assert_eq!(entries[1].key, "later");
        assert_eq!(
            entries[1].expires_at,
            Some(Timestamp::from_millisecond(33_057_392_000_000).unwrap())
        );
    }

    #[test]
    fn test_parse_seconds_expiry() {
        let bytes = SnapshotBuilder::new()
            .expiry_seconds(1_000_000_000)
            .string_kv("k", "v")
            .finish();

        let entries = parse(&bytes).unwrap();
        assert_eq!(
            entries[0].expires_at,
            Some(Timestamp::from_second(1_000_000_000).unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_unsupported_value_type() {
        let mut bytes = HEADER.to_vec();
        bytes.push(0x04);

        assert_eq!(parse(&bytes), Err(RdbError::UnsupportedValueType(0x04)));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let store = Store::new();
        let loaded = load_rdb_file(Path::new("/definitely/not/here.rdb"), &store)
            .await
            .unwrap();

        assert_eq!(loaded, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_skips_expired_entries() {
        let dir = std::env::temp_dir().join(format!("rdb-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dump.rdb");

        let bytes = SnapshotBuilder::new()
            .string_kv("alive", "1")
            .expiry_ms(1)
            .string_kv("dead", "2")
            .finish();
        std::fs::write(&path, bytes).unwrap();

        let store = Store::new();
        let loaded = load_rdb_file(&path, &store).await.unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(store.get("alive").await, Some("1".to_string()));
        assert_eq!(store.get("dead").await, None);

        std::fs::remove_dir_all(&dir).ok();
    }
}
