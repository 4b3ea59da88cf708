//! Block-hash accumulators: MD5 and the SHA family.
//!
//! The high-level hashers keep their state private, so padding and buffering
//! live here. SHA block compression is delegated to the RustCrypto crates;
//! the MD5 crates expose no compression entry point, so MD5's lives here too.
//!
//! Exported state layout (all integers big-endian):
//!
//! ```text
//! magic (4) | chaining words | block buffer (BLOCK_LEN, zero padded) | length (8)
//! ```

use std::fmt;
use std::marker::PhantomData;

use sha2::digest::generic_array::GenericArray;

use crate::{Accumulator, HashError};

const MAX_BLOCK_LEN: usize = 128;

/// One SHA variant: its constants and compression function.
pub(crate) trait Core: Clone + fmt::Debug + Default + Send {
    const NAME: &'static str;
    const MAGIC: [u8; 4];
    const BLOCK_LEN: usize;
    const DIGEST_LEN: usize;
    /// Serialized size of the chaining state.
    const STATE_LEN: usize;

    type State: Copy + fmt::Debug + Send;

    /// MD5 encodes the message length little-endian, SHA big-endian.
    const LITTLE_ENDIAN: bool = false;

    fn initial() -> Self::State;
    fn compress(state: &mut Self::State, block: &[u8]);
    fn put_state(state: &Self::State, out: &mut Vec<u8>);
    fn get_state(bytes: &[u8]) -> Self::State;
}

fn put_u32s(words: &[u32], out: &mut Vec<u8>) {
    for w in words {
        out.extend_from_slice(&w.to_be_bytes());
    }
}

fn put_u64s(words: &[u64], out: &mut Vec<u8>) {
    for w in words {
        out.extend_from_slice(&w.to_be_bytes());
    }
}

fn get_u32s<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (w, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *w = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

fn get_u64s<const N: usize>(bytes: &[u8]) -> [u64; N] {
    let mut words = [0u64; N];
    for (w, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut b = [0u8; 8];
        b.copy_from_slice(chunk);
        *w = u64::from_be_bytes(b);
    }
    words
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Md5Core;

const MD5_SHIFTS: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
    14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15,
    21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

const MD5_K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

impl Core for Md5Core {
    const NAME: &'static str = crate::MD5;
    const MAGIC: [u8; 4] = *b"md5\x01";
    const BLOCK_LEN: usize = 64;
    const DIGEST_LEN: usize = 16;
    const STATE_LEN: usize = 16;
    const LITTLE_ENDIAN: bool = true;

    type State = [u32; 4];

    fn initial() -> Self::State {
        [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476]
    }

    fn compress(state: &mut Self::State, block: &[u8]) {
        let mut m = [0u32; 16];
        for (w, c) in m.iter_mut().zip(block.chunks_exact(4)) {
            *w = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        }

        let [mut a, mut b, mut c, mut d] = *state;
        for i in 0..64 {
            let (f, g) = match i / 16 {
                0 => ((b & c) | (!b & d), i),
                1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                2 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let f = f.wrapping_add(a).wrapping_add(MD5_K[i]).wrapping_add(m[g]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(f.rotate_left(MD5_SHIFTS[i]));
        }

        for (s, v) in state.iter_mut().zip([a, b, c, d]) {
            *s = s.wrapping_add(v);
        }
    }

    fn put_state(state: &Self::State, out: &mut Vec<u8>) {
        for w in state {
            out.extend_from_slice(&w.to_le_bytes());
        }
    }

    fn get_state(bytes: &[u8]) -> Self::State {
        let mut words = [0u32; 4];
        for (w, c) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *w = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        }
        words
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Sha1Core;

impl Core for Sha1Core {
    const NAME: &'static str = crate::SHA1;
    const MAGIC: [u8; 4] = *b"sha\x01";
    const BLOCK_LEN: usize = 64;
    const DIGEST_LEN: usize = 20;
    const STATE_LEN: usize = 20;

    type State = [u32; 5];

    fn initial() -> Self::State {
        [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0]
    }

    fn compress(state: &mut Self::State, block: &[u8]) {
        let mut b = [0u8; 64];
        b.copy_from_slice(block);
        sha1::compress(state, &[b.into()]);
    }

    fn put_state(state: &Self::State, out: &mut Vec<u8>) {
        put_u32s(state, out);
    }

    fn get_state(bytes: &[u8]) -> Self::State {
        get_u32s(bytes)
    }
}

macro_rules! sha256_core {
    ($core:ident, $name:expr, $magic:expr, $digest_len:expr, $iv:expr) => {
        #[derive(Clone, Debug, Default)]
        pub(crate) struct $core;

        impl Core for $core {
            const NAME: &'static str = $name;
            const MAGIC: [u8; 4] = *$magic;
            const BLOCK_LEN: usize = 64;
            const DIGEST_LEN: usize = $digest_len;
            const STATE_LEN: usize = 32;

            type State = [u32; 8];

            fn initial() -> Self::State {
                $iv
            }

            fn compress(state: &mut Self::State, block: &[u8]) {
                let block = GenericArray::clone_from_slice(block);
                sha2::compress256(state, std::slice::from_ref(&block));
            }

            fn put_state(state: &Self::State, out: &mut Vec<u8>) {
                put_u32s(state, out);
            }

            fn get_state(bytes: &[u8]) -> Self::State {
                get_u32s(bytes)
            }
        }
    };
}

macro_rules! sha512_core {
    ($core:ident, $name:expr, $magic:expr, $digest_len:expr, $iv:expr) => {
        #[derive(Clone, Debug, Default)]
        pub(crate) struct $core;

        impl Core for $core {
            const NAME: &'static str = $name;
            const MAGIC: [u8; 4] = *$magic;
            const BLOCK_LEN: usize = 128;
            const DIGEST_LEN: usize = $digest_len;
            const STATE_LEN: usize = 64;

            type State = [u64; 8];

            fn initial() -> Self::State {
                $iv
            }

            fn compress(state: &mut Self::State, block: &[u8]) {
                let block = GenericArray::clone_from_slice(block);
                sha2::compress512(state, std::slice::from_ref(&block));
            }

            fn put_state(state: &Self::State, out: &mut Vec<u8>) {
                put_u64s(state, out);
            }

            fn get_state(bytes: &[u8]) -> Self::State {
                get_u64s(bytes)
            }
        }
    };
}

sha256_core!(
    Sha224Core,
    crate::SHA224,
    b"sha\x02",
    28,
    [
        0xc1059ed8, 0x367cd507, 0x3070dd17, 0xf70e5939, 0xffc00b31, 0x68581511, 0x64f98fa7,
        0xbefa4fa4,
    ]
);

sha256_core!(
    Sha256Core,
    crate::SHA256,
    b"sha\x03",
    32,
    [
        0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab,
        0x5be0cd19,
    ]
);

sha512_core!(
    Sha384Core,
    crate::SHA384,
    b"sha\x04",
    48,
    [
        0xcbbb9d5dc1059ed8,
        0x629a292a367cd507,
        0x9159015a3070dd17,
        0x152fecd8f70e5939,
        0x67332667ffc00b31,
        0x8eb44a8768581511,
        0xdb0c2e0d64f98fa7,
        0x47b5481dbefa4fa4,
    ]
);

sha512_core!(
    Sha512Core,
    crate::SHA512,
    b"sha\x07",
    64,
    [
        0x6a09e667f3bcc908,
        0xbb67ae8584caa73b,
        0x3c6ef372fe94f82b,
        0xa54ff53a5f1d36f1,
        0x510e527fade682d1,
        0x9b05688c2b3e6c1f,
        0x1f83d9abfb41bd6b,
        0x5be0cd19137e2179,
    ]
);

/// Buffering and padding shared by all SHA variants.
#[derive(Clone, Debug)]
pub(crate) struct BlockHash<C: Core> {
    state: C::State,
    buf: [u8; MAX_BLOCK_LEN],
    buf_len: usize,
    len: u64,
    _core: PhantomData<C>,
}

impl<C: Core> Default for BlockHash<C> {
    fn default() -> Self {
        Self {
            state: C::initial(),
            buf: [0u8; MAX_BLOCK_LEN],
            buf_len: 0,
            len: 0,
            _core: PhantomData,
        }
    }
}

impl<C: Core> BlockHash<C> {
    fn exported_len() -> usize {
        C::MAGIC.len() + C::STATE_LEN + C::BLOCK_LEN + 8
    }

    fn update(&mut self, mut data: &[u8]) {
        let bl = C::BLOCK_LEN;
        self.len = self.len.wrapping_add(data.len() as u64);

        if self.buf_len > 0 {
            let take = (bl - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
            if self.buf_len < bl {
                return;
            }
            C::compress(&mut self.state, &self.buf[..bl]);
            self.buf_len = 0;
        }

        while data.len() >= bl {
            C::compress(&mut self.state, &data[..bl]);
            data = &data[bl..];
        }

        if !data.is_empty() {
            self.buf[..data.len()].copy_from_slice(data);
            self.buf_len = data.len();
        }
    }

    fn digest(&self) -> Vec<u8> {
        let bl = C::BLOCK_LEN;
        // Length field is 64 bits for 64-byte blocks, 128 bits for 128-byte blocks.
        let len_field = bl / 8;
        let mut state = self.state;
        let mut block = [0u8; MAX_BLOCK_LEN];

        block[..self.buf_len].copy_from_slice(&self.buf[..self.buf_len]);
        block[self.buf_len] = 0x80;
        if self.buf_len >= bl - len_field {
            C::compress(&mut state, &block[..bl]);
            block = [0u8; MAX_BLOCK_LEN];
        }

        let bits = u128::from(self.len) * 8;
        if C::LITTLE_ENDIAN {
            block[bl - 8..bl].copy_from_slice(&(bits as u64).to_le_bytes());
        } else if len_field == 8 {
            block[bl - 8..bl].copy_from_slice(&(bits as u64).to_be_bytes());
        } else {
            block[bl - 16..bl].copy_from_slice(&bits.to_be_bytes());
        }
        C::compress(&mut state, &block[..bl]);

        let mut out = Vec::with_capacity(C::STATE_LEN);
        C::put_state(&state, &mut out);
        out.truncate(C::DIGEST_LEN);
        out
    }

    fn export_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::exported_len());
        out.extend_from_slice(&C::MAGIC);
        C::put_state(&self.state, &mut out);
        out.extend_from_slice(&self.buf[..C::BLOCK_LEN]);
        out.extend_from_slice(&self.len.to_be_bytes());
        out
    }

    fn import_state(&mut self, state: &[u8]) -> Result<(), HashError> {
        if state.len() != Self::exported_len() {
            return Err(HashError::invalid(
                C::NAME,
                format!("expected {} bytes, got {}", Self::exported_len(), state.len()),
            ));
        }
        let (magic, rest) = state.split_at(C::MAGIC.len());
        if magic != C::MAGIC {
            return Err(HashError::invalid(C::NAME, "identifier mismatch"));
        }
        let (words, rest) = rest.split_at(C::STATE_LEN);
        let (buf, len) = rest.split_at(C::BLOCK_LEN);

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(len);
        let len = u64::from_be_bytes(len_bytes);

        self.state = C::get_state(words);
        self.buf = [0u8; MAX_BLOCK_LEN];
        self.buf[..C::BLOCK_LEN].copy_from_slice(buf);
        self.buf_len = (len % C::BLOCK_LEN as u64) as usize;
        self.len = len;
        Ok(())
    }
}

macro_rules! sha_accumulator {
    ($(#[$doc:meta])* $name:ident, $core:ty) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name(BlockHash<$core>);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl Accumulator for $name {
            fn name(&self) -> &str {
                <$core as Core>::NAME
            }

            fn update(&mut self, data: &[u8]) {
                self.0.update(data);
            }

            fn digest(&self) -> Vec<u8> {
                self.0.digest()
            }

            fn export_state(&self) -> Result<Vec<u8>, HashError> {
                Ok(self.0.export_state())
            }

            fn import_state(&mut self, state: &[u8]) -> Result<(), HashError> {
                self.0.import_state(state)
            }

            fn is_resumable(&self) -> bool {
                true
            }
        }
    };
}

sha_accumulator!(
    /// MD5 accumulator.
    Md5,
    Md5Core
);
sha_accumulator!(
    /// SHA-1 accumulator.
    Sha1,
    Sha1Core
);
sha_accumulator!(Sha224, Sha224Core);
sha_accumulator!(
    /// SHA-256 accumulator.
    Sha256,
    Sha256Core
);
sha_accumulator!(Sha384, Sha384Core);
sha_accumulator!(Sha512, Sha512Core);

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn reference(name: &str, input: &[u8]) -> Vec<u8> {
        match name {
            crate::MD5 => md5::compute(input).0.to_vec(),
            crate::SHA1 => sha1::Sha1::digest(input).to_vec(),
            crate::SHA224 => sha2::Sha224::digest(input).to_vec(),
            crate::SHA256 => sha2::Sha256::digest(input).to_vec(),
            crate::SHA384 => sha2::Sha384::digest(input).to_vec(),
            crate::SHA512 => sha2::Sha512::digest(input).to_vec(),
            other => panic!("no reference for {other}"),
        }
    }

    fn fresh(name: &str) -> Box<dyn Accumulator> {
        crate::new_accumulator(name).unwrap()
    }

    const NAMES: [&str; 6] = [
        crate::MD5,
        crate::SHA1,
        crate::SHA224,
        crate::SHA256,
        crate::SHA384,
        crate::SHA512,
    ];

    #[test]
    fn sha256_abc() {
        let mut acc = Sha256::new();
        acc.update(b"abc");
        assert_eq!(
            hex::encode(acc.digest()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn md5_vectors() {
        let mut acc = Md5::new();
        assert_eq!(hex::encode(acc.digest()), "d41d8cd98f00b204e9800998ecf8427e");
        acc.update(b"abc");
        assert_eq!(hex::encode(acc.digest()), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn empty_input_matches_reference() {
        for name in NAMES {
            assert_eq!(fresh(name).digest(), reference(name, b""), "{name}");
        }
    }

    #[test]
    fn padding_boundaries_match_reference() {
        // Lengths around the point where the length field no longer fits.
        for len in [55, 56, 63, 64, 65, 111, 112, 127, 128, 129, 1000] {
            let input = data(len);
            for name in NAMES {
                let mut acc = fresh(name);
                acc.update(&input);
                assert_eq!(acc.digest(), reference(name, &input), "{name} len={len}");
            }
        }
    }

    #[test]
    fn uneven_updates_match_one_shot() {
        let input = data(3_333);
        for name in NAMES {
            let mut acc = fresh(name);
            for chunk in input.chunks(97) {
                acc.update(chunk);
            }
            assert_eq!(acc.digest(), reference(name, &input), "{name}");
        }
    }

    #[test]
    fn digest_does_not_reset() {
        let mut acc = Sha512::new();
        acc.update(b"hello ");
        let _ = acc.digest();
        acc.update(b"world");
        assert_eq!(acc.digest(), reference(crate::SHA512, b"hello world"));
    }

    #[test]
    fn export_import_resumes_at_any_split() {
        let input = data(700);
        for name in NAMES {
            for split in [0, 1, 63, 64, 100, 128, 699, 700] {
                let mut first = fresh(name);
                first.update(&input[..split]);
                let state = first.export_state().unwrap();

                let mut second = fresh(name);
                second.import_state(&state).unwrap();
                second.update(&input[split..]);
                assert_eq!(second.digest(), reference(name, &input), "{name} split={split}");
            }
        }
    }

    #[test]
    fn import_rejects_wrong_length() {
        let mut acc = Sha256::new();
        let err = acc.import_state(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, HashError::InvalidState { ref alg, .. } if alg == "SHA-256"));
    }

    #[test]
    fn import_rejects_state_of_another_algorithm() {
        // SHA-224 and SHA-256 share a layout; only the identifier differs.
        let state = Sha224::new().export_state().unwrap();
        let err = Sha256::new().import_state(&state).unwrap_err();
        assert_eq!(err, HashError::invalid("SHA-256", "identifier mismatch"));
    }
}
