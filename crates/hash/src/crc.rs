//! CRC-32 accumulator backed by `crc32fast`.

use crate::{Accumulator, CRC32, HashError};

const MAGIC: [u8; 4] = *b"crc\x01";
const EXPORTED_LEN: usize = 16;

/// CRC-32 (IEEE) accumulator.
///
/// Exported state: `magic (4) | crc (4, BE) | length (8, BE)`.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
    len: u64,
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32")
            .field("crc", &self.current())
            .field("len", &self.len)
            .finish()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl Accumulator for Crc32 {
    fn name(&self) -> &str {
        CRC32
    }

    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len = self.len.wrapping_add(data.len() as u64);
    }

    fn digest(&self) -> Vec<u8> {
        self.current().to_be_bytes().to_vec()
    }

    fn export_state(&self) -> Result<Vec<u8>, HashError> {
        let mut out = Vec::with_capacity(EXPORTED_LEN);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.current().to_be_bytes());
        out.extend_from_slice(&self.len.to_be_bytes());
        Ok(out)
    }

    fn import_state(&mut self, state: &[u8]) -> Result<(), HashError> {
        if state.len() != EXPORTED_LEN {
            return Err(HashError::invalid(
                CRC32,
                format!("expected {EXPORTED_LEN} bytes, got {}", state.len()),
            ));
        }
        if state[..4] != MAGIC {
            return Err(HashError::invalid(CRC32, "identifier mismatch"));
        }

        let crc = u32::from_be_bytes([state[4], state[5], state[6], state[7]]);
        let mut len = [0u8; 8];
        len.copy_from_slice(&state[8..]);
        let len = u64::from_be_bytes(len);

        self.hasher = crc32fast::Hasher::new_with_initial_len(crc, len);
        self.len = len;
        Ok(())
    }

    fn is_resumable(&self) -> bool {
        true
    }
}
