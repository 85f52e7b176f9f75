//! Year partitioner and buffer manager.
//!
//! Observations are routed into one [`PartitionBuffer`] per year. A buffer is
//! spilled to its staging file once its size estimate passes the flush
//! threshold, which bounds peak memory to roughly
//! `live partitions * threshold` instead of the whole dataset.
//!
//! The manager is driven from a single consumer thread, so nothing here is
//! locked.

use crate::observation::Observation;
use crate::staging::{self, StagingLayout};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Pending observations for one partition.
#[derive(Debug)]
pub struct PartitionBuffer {
    partition: i32,
    pending: Vec<Observation>,
    byte_size: usize,
    routed: u64,
    flushes: u64,
}

impl PartitionBuffer {
    fn new(partition: i32) -> Self {
        Self { partition, pending: Vec::new(), byte_size: 0, routed: 0, flushes: 0 }
    }

    #[must_use]
    pub fn partition(&self) -> i32 {
        self.partition
    }

    #[must_use]
    pub fn pending(&self) -> &[Observation] {
        &self.pending
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    fn push(&mut self, obs: Observation) {
        self.byte_size += obs.approx_size();
        self.routed += 1;
        self.pending.push(obs);
    }

    /// Take every pending observation and reset the size estimate.
    fn drain(&mut self) -> Vec<Observation> {
        self.byte_size = 0;
        std::mem::take(&mut self.pending)
    }
}

/// Owner of every live partition buffer.
#[derive(Debug, Default)]
pub struct PartitionStore {
    buffers: BTreeMap<i32, PartitionBuffer>,
}

impl PartitionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, partition: i32) -> Option<&PartitionBuffer> {
        self.buffers.get(&partition)
    }

    #[must_use]
    pub fn contains(&self, partition: i32) -> bool {
        self.buffers.contains_key(&partition)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Partitions seen so far, ascending.
    pub fn partitions(&self) -> impl Iterator<Item = i32> + '_ {
        self.buffers.keys().copied()
    }

    fn insert(&mut self, partition: i32) -> &mut PartitionBuffer {
        self.buffers
            .entry(partition)
            .or_insert_with(|| PartitionBuffer::new(partition))
    }

    fn get_mut(&mut self, partition: i32) -> Option<&mut PartitionBuffer> {
        self.buffers.get_mut(&partition)
    }
}

/// Per-partition totals once the manager has finished.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferReport {
    /// Observations routed per partition.
    pub routed: BTreeMap<i32, u64>,
    /// Total flushes, including the final one.
    pub flushes: u64,
}

impl BufferReport {
    #[must_use]
    pub fn total_routed(&self) -> u64 {
        self.routed.values().sum()
    }
}

/// Routes observations to partition buffers and spills them to staging files.
#[derive(Debug)]
pub struct BufferManager {
    layout: StagingLayout,
    store: PartitionStore,
    flush_threshold: usize,
    scratch: Vec<u8>,
}

impl BufferManager {
    pub fn new(layout: StagingLayout, flush_threshold: usize) -> Self {
        Self { layout, store: PartitionStore::new(), flush_threshold, scratch: Vec::new() }
    }

    #[must_use]
    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    #[must_use]
    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    /// Append `obs` to its partition, creating the partition and flushing it
    /// as needed.
    ///
    /// # Errors
    /// Returns an error if the staging file cannot be created or written.
    pub fn route(&mut self, obs: Observation) -> Result<()> {
        let partition = obs.partition();
        if !self.store.contains(partition) {
            self.layout
                .create(partition)
                .with_context(|| format!("set up partition {partition}"))?;
            debug!(partition, "new partition");
        }
        let buffer = self.store.insert(partition);
        buffer.push(obs);
        if buffer.byte_size > self.flush_threshold {
            self.flush(partition)?;
        }
        Ok(())
    }

    /// Route every observation in `batch`.
    ///
    /// # Errors
    /// Stops at the first observation that fails to route.
    pub fn route_all(&mut self, batch: impl IntoIterator<Item = Observation>) -> Result<()> {
        batch.into_iter().try_for_each(|o| self.route(o))
    }

    /// Spill a partition's pending observations to its staging file.
    ///
    /// Flushing an unknown or empty partition is a no-op.
    ///
    /// # Errors
    /// Returns an error if encoding or the append fails.
    pub fn flush(&mut self, partition: i32) -> Result<()> {
        let Some(buffer) = self.store.get_mut(partition) else {
            return Ok(());
        };
        if buffer.pending.is_empty() {
            return Ok(());
        }
        let pending = buffer.drain();
        buffer.flushes += 1;

        info!(partition, observations = pending.len(), "flushing");
        self.scratch.clear();
        staging::encode_into(&pending, &mut self.scratch)?;
        staging::append(&self.layout.staging_path(partition), &self.scratch)
            .with_context(|| format!("flush partition {partition}"))
    }

    /// Flush every non-empty buffer and consume the manager.
    ///
    /// Skipping this would silently drop the tail of every partition.
    ///
    /// # Errors
    /// Returns the first flush error.
    pub fn finish(mut self) -> Result<BufferReport> {
        let partitions: Vec<i32> = self.store.partitions().collect();
        for p in &partitions {
            self.flush(*p)?;
        }
        let mut report = BufferReport::default();
        for buffer in self.store.buffers.values() {
            report.routed.insert(buffer.partition, buffer.routed);
            report.flushes += buffer.flushes;
        }
        info!(partitions = partitions.len(), flushes = report.flushes, "buffers flushed");
        Ok(report)
    }
}
