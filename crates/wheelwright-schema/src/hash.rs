//! Content digests for manifest records.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::record::RecordParseError;

/// Name of the hash algorithm wheelwright writes into every record.
pub const SHA256: &str = "sha256";

/// The `<algorithm>=<digest>` column of a `RECORD` line.
///
/// Digests written by this crate are URL-safe base64 with the padding
/// stripped, which is the encoding the wheel format mandates. Digests read
/// from disk are kept verbatim so that a manifest round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordHash {
    algorithm: String,
    digest: String,
}

impl RecordHash {
    /// Create a hash from an algorithm name and an already-encoded digest.
    pub fn new(algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            digest: digest.into(),
        }
    }

    /// Wrap a raw SHA-256 output.
    pub fn from_sha256(raw: &[u8]) -> Self {
        Self::new(SHA256, URL_SAFE_NO_PAD.encode(raw))
    }

    /// Hash an in-memory buffer.
    pub fn sha256_bytes(data: &[u8]) -> Self {
        Self::from_sha256(&Sha256::digest(data))
    }

    /// Hash everything a reader yields, returning the digest and the byte count.
    ///
    /// The reader is consumed in fixed-size chunks, so arbitrarily large inputs
    /// are hashed in constant memory.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by the reader.
    pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<(Self, u64)> {
        let mut hasher = Sha256::new();
        let size = io::copy(reader, &mut hasher)?;
        Ok((Self::from_sha256(&hasher.finalize()), size))
    }

    /// Hash a file on disk, returning the digest and the file size.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or read.
    pub fn sha256_file(path: &Path) -> io::Result<(Self, u64)> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::sha256_reader(&mut reader)
    }

    /// Algorithm name, e.g. `sha256`.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Encoded digest exactly as it appears in the manifest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Decode the digest into raw bytes.
    ///
    /// Accepts URL-safe base64 (padded or not). Hex digests of SHA-256 or
    /// SHA-512 length are also accepted, since older tooling wrote those.
    pub fn digest_bytes(&self) -> Option<Vec<u8>> {
        let d = self.digest.as_str();
        if matches!(d.len(), 64 | 128) && d.chars().all(|c| c.is_ascii_hexdigit()) {
            return hex::decode(d).ok();
        }
        URL_SAFE_NO_PAD.decode(d.trim_end_matches('=')).ok()
    }

    /// Whether two hashes describe the same content, regardless of encoding.
    pub fn same_content(&self, other: &Self) -> bool {
        if !self.algorithm.eq_ignore_ascii_case(&other.algorithm) {
            return false;
        }
        match (self.digest_bytes(), other.digest_bytes()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for RecordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.algorithm, self.digest)
    }
}

impl std::str::FromStr for RecordHash {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((algorithm, digest)) if !algorithm.is_empty() && !digest.is_empty() => {
                Ok(Self::new(algorithm, digest))
            }
            _ => Err(RecordParseError::InvalidHash(s.to_string())),
        }
    }
}
