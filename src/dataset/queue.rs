use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::core::episode::Episode;
use crate::core::error::{RecorderError, Result};
use crate::dataset::writer::DatasetWriter;

/// Ordered background write queue.
///
/// Finalized episodes are handed over a channel to a dedicated writer
/// thread (parquet IO is blocking), which processes them strictly in the
/// order they were finalized. This lets capture throughput outrun write
/// throughput without reordering the append-only episode index log.
///
/// The queue also proxies episode index allocation for the writer it owns,
/// so the recorder never assigns indices itself.
pub struct WriteQueue {
    tx: Option<crossbeam_channel::Sender<Episode>>,
    next_index: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    handle: Option<JoinHandle<DatasetWriter>>,
}

impl WriteQueue {
    pub fn spawn(writer: DatasetWriter) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Episode>();
        let next_index = Arc::new(AtomicU64::new(writer.next_episode_index()));
        let failed = Arc::new(AtomicU64::new(0));

        let failed_counter = failed.clone();
        let handle = std::thread::spawn(move || {
            let mut writer = writer;
            for episode in rx {
                let index = episode.episode_index;
                if let Err(e) = writer.write_episode(&episode) {
                    // A failed episode is reported and excluded; prior
                    // episodes' files and metadata remain valid.
                    eprintln!("Failed to write episode {index}: {e}");
                    failed_counter.fetch_add(1, Ordering::Relaxed);
                }
            }
            writer
        });

        Self {
            tx: Some(tx),
            next_index,
            failed,
            handle: Some(handle),
        }
    }

    /// Next unused episode index. Monotonic; never reused.
    pub fn allocate_episode_index(&self) -> u64 {
        self.next_index.fetch_add(1, Ordering::SeqCst)
    }

    /// Hand a finalized episode to the writer thread.
    pub fn enqueue(&self, episode: Episode) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| RecorderError::State("Write queue is closed".to_string()))?;
        tx.send(episode)
            .map_err(|_| RecorderError::State("Writer thread is gone".to_string()))
    }

    /// Episodes whose serialization failed so far
    pub fn episodes_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Drain the queue and return the writer with its final counters plus
    /// the number of episodes whose serialization failed.
    pub fn close(mut self) -> Result<(DatasetWriter, u64)> {
        drop(self.tx.take());
        let handle = self
            .handle
            .take()
            .ok_or_else(|| RecorderError::State("Write queue is already closed".to_string()))?;
        let writer = handle
            .join()
            .map_err(|_| RecorderError::State("Writer thread panicked".to_string()))?;
        Ok((writer, self.failed.load(Ordering::Relaxed)))
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        // Closing the channel lets the writer thread drain and exit.
        drop(self.tx.take());
    }
}
