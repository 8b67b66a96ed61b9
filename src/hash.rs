// src/hash.rs

//! SHA-256 hashing for source archives and staged recipe payloads
//!
//! Checksums may be written bare (`abc123...`) or prefixed (`sha256:abc123...`);
//! both forms compare equal after [`normalize`].

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;

/// Length of a SHA-256 digest as a hex string
pub const SHA256_HEX_LEN: usize = 64;

/// Compute the SHA-256 of a byte slice as lowercase hex
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the SHA-256 of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 of a file, streaming its content
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    sha256_reader(&mut file)
}

/// Strip an optional `sha256:` prefix and lowercase the digest
pub fn normalize(expected: &str) -> String {
    expected
        .strip_prefix("sha256:")
        .unwrap_or(expected)
        .trim()
        .to_lowercase()
}

/// Check that a string looks like a SHA-256 digest (optionally prefixed)
pub fn is_valid_sha256(value: &str) -> bool {
    let digest = normalize(value);
    digest.len() == SHA256_HEX_LEN && digest.chars().all(|c| c.is_ascii_hexdigit())
}

/// Verification failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sha256 mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for VerifyError {}

/// Verify a file against an expected SHA-256
pub fn verify_file_sha256(path: &Path, expected: &str) -> Result<(), VerifyError> {
    let expected = normalize(expected);
    let actual = sha256_file(path).unwrap_or_else(|_| "<file read error>".to_string());

    if actual == expected {
        Ok(())
    } else {
        Err(VerifyError { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256(b"Hello, World!"),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_reader_matches_bytes() {
        let data = vec![7u8; 20_000];
        let mut cursor = io::Cursor::new(data.clone());
        assert_eq!(sha256_reader(&mut cursor).unwrap(), sha256(&data));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize("sha256:ABCDEF"), "abcdef");
        assert_eq!(normalize("abcdef"), "abcdef");
    }

    #[test]
    fn test_is_valid_sha256() {
        let digest = sha256(b"x");
        assert!(is_valid_sha256(&digest));
        assert!(is_valid_sha256(&format!("sha256:{digest}")));
        assert!(!is_valid_sha256("abc"));
        assert!(!is_valid_sha256(&"z".repeat(64)));
    }

    #[test]
    fn test_verify_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Hello, World!").unwrap();

        let good = "sha256:dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";
        assert!(verify_file_sha256(file.path(), good).is_ok());

        let err = verify_file_sha256(file.path(), &"0".repeat(64)).unwrap_err();
        assert_eq!(err.expected, "0".repeat(64));
    }
}
