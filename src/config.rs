//! Command-line configuration.
//!
//! Flags: `--port N`, `--dir PATH`, `--dbfilename NAME`, `--replicaof "HOST PORT"`.
//! Invalid values exit the process with a non-zero status from `main`.

use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("unknown command line flag")]
    UnknownFlag,
    #[error("missing value for command line flag")]
    MissingFlagValue,
    #[error("invalid port value")]
    InvalidPort,
    #[error("invalid primary address")]
    InvalidPrimaryAddress,
    #[error("invalid primary port")]
    InvalidPrimaryPort,
}

/// Static server configuration derived from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// TCP port the server listens on.
    pub port: u16,
    /// Directory holding the snapshot file.
    pub dir: String,
    /// Snapshot file name inside `dir`.
    pub dbfilename: String,
    /// `(host, port)` of the primary when running as a replica.
    pub replicaof: Option<(String, u16)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6379,
            dir: "./".to_string(),
            dbfilename: "dump.rdb".to_string(),
            replicaof: None,
        }
    }
}

impl ServerConfig {
    /// Parses configuration from command-line arguments (the first element is
    /// the program name and is skipped).
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut iter = args.into_iter().skip(1);
        let mut config = ServerConfig::default();

        while let Some(flag) = iter.next() {
            let mut value = || iter.next().ok_or(CliError::MissingFlagValue);

            match flag.as_str() {
                "--port" => {
                    config.port = parse_port(&value()?, CliError::InvalidPort)?;
                }
                "--dir" => {
                    config.dir = value()?;
                }
                "--dbfilename" => {
                    config.dbfilename = value()?;
                }
                "--replicaof" => {
                    config.replicaof = Some(parse_primary_address(&value()?)?);
                }
                _ => return Err(CliError::UnknownFlag),
            }
        }

        Ok(config)
    }

    pub fn is_replica(&self) -> bool {
        self.replicaof.is_some()
    }

    /// Path of the snapshot file, `dir` joined with `dbfilename`.
    pub fn rdb_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }
}

fn parse_port(input: &str, error: CliError) -> Result<u16, CliError> {
    let port = input.parse::<u16>().map_err(|_| error.clone())?;

    if port == 0 {
        return Err(error);
    }

    Ok(port)
}

/// Validates the `--replicaof` value: `"HOST PORT"` where HOST is an IPv4
/// address with in-range octets or a plain hostname.
fn parse_primary_address(input: &str) -> Result<(String, u16), CliError> {
    let ipv4 = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap();
    let hostname = Regex::new(r"^[a-zA-Z0-9\-\.]+$").unwrap();

    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(CliError::InvalidPrimaryAddress);
    }

    let host = parts[0];
    let host_ok = if let Some(caps) = ipv4.captures(host) {
        caps.iter().skip(1).all(|octet| {
            octet
                .and_then(|m| m.as_str().parse::<u16>().ok())
                .is_some_and(|v| v <= 255)
        })
    } else {
        hostname.is_match(host)
    };

    if !host_ok {
        return Err(CliError::InvalidPrimaryAddress);
    }

    let port = parse_port(parts[1], CliError::InvalidPrimaryPort)?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        std::iter::once("rudis")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_args(args(&[])).unwrap();
        assert_eq!(config.port, 6379);
        assert_eq!(config.dir, "./");
        assert_eq!(config.dbfilename, "dump.rdb");
        assert_eq!(config.replicaof, None);
        assert!(!config.is_replica());
    }

    #[test]
    fn test_flag_parsing() {
        let config = ServerConfig::from_args(args(&[
            "--port",
            "7001",
            "--dir",
            "/tmp/data",
            "--dbfilename",
            "snapshot.rdb",
            "--replicaof",
            "127.0.0.1 6379",
        ]))
        .unwrap();

        assert_eq!(config.port, 7001);
        assert_eq!(config.dir, "/tmp/data");
        assert_eq!(config.dbfilename, "snapshot.rdb");
        assert_eq!(config.replicaof, Some(("127.0.0.1".to_string(), 6379)));
        assert_eq!(config.rdb_path(), PathBuf::from("/tmp/data/snapshot.rdb"));
    }

    #[test]
    fn test_invalid_arguments() {
        let test_cases = vec![
            (args(&["--bogus"]), CliError::UnknownFlag),
            (args(&["--port"]), CliError::MissingFlagValue),
            (args(&["--port", "0"]), CliError::InvalidPort),
            (args(&["--port", "65536"]), CliError::InvalidPort),
            (args(&["--port", "nope"]), CliError::InvalidPort),
            (args(&["--replicaof"]), CliError::MissingFlagValue),
            (
                args(&["--replicaof", "localhost"]),
                CliError::InvalidPrimaryAddress,
            ),
            (
                args(&["--replicaof", "localhost 6379 extra"]),
                CliError::InvalidPrimaryAddress,
            ),
            (
                args(&["--replicaof", "256.0.0.1 6379"]),
                CliError::InvalidPrimaryAddress,
            ),
            (
                args(&["--replicaof", "bad_host! 6379"]),
                CliError::InvalidPrimaryAddress,
            ),
            (
                args(&["--replicaof", "localhost 0"]),
                CliError::InvalidPrimaryPort,
            ),
            (
                args(&["--replicaof", "localhost 70000"]),
                CliError::InvalidPrimaryPort,
            ),
        ];

        for (input, expected) in test_cases {
            assert_eq!(
                ServerConfig::from_args(input.clone()),
                Err(expected),
                "args {:?}",
                input
            );
        }
    }

    #[test]
    fn test_valid_primary_addresses() {
        let test_cases = vec![
            ("127.0.0.1 6379", ("127.0.0.1", 6379)),
            ("localhost 6380", ("localhost", 6380)),
            ("some-host.example.com 65535", ("some-host.example.com", 65535)),
        ];

        for (input, (host, port)) in test_cases {
            assert_eq!(
                parse_primary_address(input),
                Ok((host.to_string(), port)),
                "address {:?}",
                input
            );
        }
    }
}
