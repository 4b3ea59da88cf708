//! Hashing a stream with several algorithms at once, resumable via exported state.

use std::collections::BTreeMap;

use iocopy_hash::{Accumulator, MultiHasher};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::serde_ext::{base64_map, u64_string};
use crate::{Task, TaskError, TaskIo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MultiHashState {
    pub algs: Vec<String>,
    #[serde(with = "u64_string")]
    pub computed: u64,
    #[serde(with = "base64_map")]
    pub states: BTreeMap<String, Vec<u8>>,
}

/// Result document reported when hashing completes.
#[derive(Debug, Serialize)]
struct ChecksumReport {
    checksums: BTreeMap<String, String>,
}

/// Feeds a reader into one accumulator per algorithm.
///
/// The total is unknown: the reader is an arbitrary stream.
#[derive(Debug)]
pub struct MultiHashTask<R> {
    state: MultiHashState,
    io: TaskIo<R, MultiHasher>,
}

impl<R> MultiHashTask<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Hashes `reader` with `algs`. An empty list selects every supported algorithm.
    pub fn new<S: AsRef<str>>(algs: &[S], reader: R) -> Result<Self, TaskError> {
        Self::with_hasher(MultiHasher::new(algs)?, reader)
    }

    /// Hashes `reader` with caller-provided accumulators, which must all be
    /// able to export and import their state.
    pub fn with_accumulators(
        accumulators: Vec<Box<dyn Accumulator>>,
        reader: R,
    ) -> Result<Self, TaskError> {
        Self::with_hasher(MultiHasher::from_accumulators(accumulators), reader)
    }

    fn with_hasher(mut hasher: MultiHasher, reader: R) -> Result<Self, TaskError> {
        hasher.ensure_resumable()?;
        let algs: Vec<String> = hasher.algorithms().into_iter().map(String::from).collect();
        info!(?algs, "hash task created");

        Ok(Self {
            state: MultiHashState {
                algs,
                computed: 0,
                states: BTreeMap::new(),
            },
            io: TaskIo::new(reader, hasher),
        })
    }

    /// Rebuilds a task from a snapshot. `reader` must already be positioned
    /// at the snapshot's `computed` offset.
    pub fn load(snapshot: &[u8], reader: R) -> Result<Self, TaskError> {
        let state: MultiHashState = serde_json::from_slice(snapshot)?;
        Self::from_state(state, reader)
    }

    pub(crate) fn from_state(state: MultiHashState, reader: R) -> Result<Self, TaskError> {
        if let Some(alg) = state.algs.iter().find(|a| !state.states.contains_key(*a)) {
            return Err(TaskError::MissingState(alg.clone()));
        }

        let mut hasher = MultiHasher::new(state.algs.as_slice())?;
        hasher.restore(&state.states)?;
        debug!(algs = ?state.algs, computed = state.computed, "hash task loaded");

        Ok(Self {
            state,
            io: TaskIo::new(reader, hasher),
        })
    }
}

impl<R> MultiHashTask<R> {
    pub fn algorithms(&self) -> &[String] {
        &self.state.algs
    }

    fn hasher(&self) -> Result<&MultiHasher, TaskError> {
        self.io.writer().ok_or(TaskError::IoInUse)
    }

    /// Digests of everything hashed so far, keyed by algorithm name.
    pub fn checksums(&self) -> Result<BTreeMap<String, Vec<u8>>, TaskError> {
        Ok(self.hasher()?.checksums())
    }

    pub(crate) fn snapshot_state(&self) -> Result<MultiHashState, TaskError> {
        let states = self.hasher()?.states()?;
        Ok(MultiHashState {
            states,
            ..self.state.clone()
        })
    }

    pub(crate) fn report(&self) -> Result<Vec<u8>, TaskError> {
        let report = ChecksumReport {
            checksums: self.hasher()?.hex_checksums(),
        };
        Ok(serde_json::to_vec_pretty(&report)?)
    }
}

impl<R> Task for MultiHashTask<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    type Reader = R;
    type Writer = MultiHasher;

    fn total(&self) -> Option<u64> {
        None
    }

    fn copied(&self) -> u64 {
        self.state.computed
    }

    fn set_copied(&mut self, copied: u64) {
        self.state.computed = copied;
    }

    fn take_io(&mut self) -> Option<(R, MultiHasher)> {
        self.io.take()
    }

    fn restore_writer(&mut self, writer: MultiHasher) {
        self.io.restore_writer(writer);
    }

    fn snapshot(&self) -> Result<Vec<u8>, TaskError> {
        Ok(serde_json::to_vec_pretty(&self.snapshot_state()?)?)
    }

    fn result(&self) -> Result<Option<Vec<u8>>, TaskError> {
        self.report().map(Some)
    }
}
