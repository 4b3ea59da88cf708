//! Fan-out of one byte stream to several accumulators.

use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::{Accumulator, HashError, new_accumulator, supported_algorithms};

/// Named accumulators fed with the same bytes, in a fixed order.
pub struct MultiHasher {
    accumulators: Vec<Box<dyn Accumulator>>,
}

impl std::fmt::Debug for MultiHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiHasher")
            .field("algorithms", &self.algorithms())
            .finish()
    }
}

impl MultiHasher {
    /// Builds one accumulator per name. An empty list selects every supported
    /// algorithm; repeated names are collapsed.
    pub fn new<S: AsRef<str>>(algs: &[S]) -> Result<Self, HashError> {
        let names: Vec<String> = if algs.is_empty() {
            supported_algorithms().into_iter().map(String::from).collect()
        } else {
            let mut names: Vec<String> = Vec::with_capacity(algs.len());
            for alg in algs {
                let alg = alg.as_ref();
                if !names.iter().any(|n| n == alg) {
                    names.push(alg.to_string());
                }
            }
            names
        };

        let accumulators = names
            .iter()
            .map(|name| new_accumulator(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { accumulators })
    }

    pub fn from_accumulators(accumulators: Vec<Box<dyn Accumulator>>) -> Self {
        Self { accumulators }
    }

    /// Algorithm names in feed order.
    pub fn algorithms(&self) -> Vec<&str> {
        self.accumulators.iter().map(|a| a.name()).collect()
    }

    /// Checks that every accumulator can both export and import its state,
    /// by round-tripping the current state through each one.
    pub fn ensure_resumable(&mut self) -> Result<(), HashError> {
        for acc in &mut self.accumulators {
            let state = acc.export_state()?;
            acc.import_state(&state)?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: &[u8]) {
        for acc in &mut self.accumulators {
            acc.update(data);
        }
    }

    /// Exported state of every accumulator, keyed by name.
    pub fn states(&self) -> Result<BTreeMap<String, Vec<u8>>, HashError> {
        self.accumulators
            .iter()
            .map(|acc| Ok::<_, HashError>((acc.name().to_string(), acc.export_state()?)))
            .collect()
    }

    /// Restores every accumulator from `states`. Extra entries are ignored.
    pub fn restore(&mut self, states: &BTreeMap<String, Vec<u8>>) -> Result<(), HashError> {
        for acc in &mut self.accumulators {
            let name = acc.name().to_string();
            let state = states
                .get(&name)
                .ok_or_else(|| HashError::invalid(&name, "no saved state"))?;
            acc.import_state(state)?;
            debug!(alg = %name, len = state.len(), "restored accumulator state");
        }
        Ok(())
    }

    /// Digest of every accumulator, keyed by name.
    pub fn checksums(&self) -> BTreeMap<String, Vec<u8>> {
        self.accumulators
            .iter()
            .map(|acc| (acc.name().to_string(), acc.digest()))
            .collect()
    }

    /// Same as [`checksums`](Self::checksums), as uppercase hex.
    pub fn hex_checksums(&self) -> BTreeMap<String, String> {
        self.accumulators
            .iter()
            .map(|acc| (acc.name().to_string(), hex::encode_upper(acc.digest())))
            .collect()
    }
}

impl AsyncWrite for MultiHasher {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().update(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
