//! Hash accumulators whose internal state can be exported and restored.
//!
//! Every built-in accumulator can serialize its running state to bytes and
//! load it back, so a digest over a long stream can be suspended and resumed
//! in another process. [`MultiHasher`] fans one byte stream out to several
//! accumulators and is itself an [`AsyncWrite`](tokio::io::AsyncWrite) sink.

mod block;
mod crc;
mod multi;

pub use block::{Md5, Sha1, Sha224, Sha256, Sha384, Sha512};
pub use crc::Crc32;
pub use multi::MultiHasher;

pub const CRC32: &str = "CRC-32";
pub const MD5: &str = "MD5";
pub const SHA1: &str = "SHA-1";
pub const SHA224: &str = "SHA-224";
pub const SHA256: &str = "SHA-256";
pub const SHA384: &str = "SHA-384";
pub const SHA512: &str = "SHA-512";

/// Supported algorithm names, sorted.
const ALGORITHMS: [&str; 7] = [CRC32, MD5, SHA1, SHA224, SHA256, SHA384, SHA512];

/// Errors produced by the hash crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("unsupported hash algorithm: {0}")]
    Unsupported(String),

    #[error("{0}: state export not supported")]
    NotExportable(String),

    #[error("{0}: state import not supported")]
    NotImportable(String),

    #[error("{alg}: invalid state: {reason}")]
    InvalidState { alg: String, reason: String },
}

impl HashError {
    pub(crate) fn invalid(alg: &str, reason: impl Into<String>) -> Self {
        HashError::InvalidState {
            alg: alg.to_string(),
            reason: reason.into(),
        }
    }
}

/// A running digest computation.
///
/// Export and import are optional capabilities: the default implementations
/// fail, and an accumulator that overrides them should also return `true`
/// from [`is_resumable`](Self::is_resumable).
pub trait Accumulator: Send {
    /// Algorithm name, e.g. `"SHA-256"`.
    fn name(&self) -> &str;

    /// Feeds more bytes.
    fn update(&mut self, data: &[u8]);

    /// Digest of everything fed so far. Does not reset or consume the state.
    fn digest(&self) -> Vec<u8>;

    /// Serializes the running state.
    fn export_state(&self) -> Result<Vec<u8>, HashError> {
        Err(HashError::NotExportable(self.name().to_string()))
    }

    /// Replaces the running state with one produced by [`export_state`](Self::export_state).
    fn import_state(&mut self, state: &[u8]) -> Result<(), HashError> {
        let _ = state;
        Err(HashError::NotImportable(self.name().to_string()))
    }

    fn is_resumable(&self) -> bool {
        false
    }
}

/// Returns the supported algorithm names, sorted.
pub fn supported_algorithms() -> Vec<&'static str> {
    ALGORITHMS.to_vec()
}

pub fn is_supported(name: &str) -> bool {
    ALGORITHMS.contains(&name)
}

/// Creates a fresh accumulator for `name`.
pub fn new_accumulator(name: &str) -> Result<Box<dyn Accumulator>, HashError> {
    let acc: Box<dyn Accumulator> = match name {
        CRC32 => Box::new(Crc32::new()),
        MD5 => Box::new(Md5::new()),
        SHA1 => Box::new(Sha1::new()),
        SHA224 => Box::new(Sha224::new()),
        SHA256 => Box::new(Sha256::new()),
        SHA384 => Box::new(Sha384::new()),
        SHA512 => Box::new(Sha512::new()),
        other => return Err(HashError::Unsupported(other.to_string())),
    };
    Ok(acc)
}
